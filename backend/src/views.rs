//! Page-level controllers
//!
//! Each page loads its primary resource as a blocking dependency and
//! everything else best-effort, so a secondary outage degrades the page
//! instead of blanking it.

use crate::{
    aggregator::{AggregatedResult, DependencyAggregator, FetchPolicy, FetchRequest},
    amount::{derived_amount, OrderDraft},
    error::{ConsoleError, Result},
    gateway_client::Gateway,
    types::{CatalogItem, DependencyStatus, LegacyOrder, Order, ServiceLabel},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ORDERS: &str = "orders";
pub const CATALOG: &str = "catalog";
pub const LEGACY_ALL: &str = "all";
pub const LEGACY_RECENT: &str = "recent";

/// Per-label status as shown on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyView {
    pub label: ServiceLabel,
    pub policy: FetchPolicy,
    pub status: DependencyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

fn dependency_views<T>(result: &AggregatedResult<T>) -> Vec<DependencyView> {
    result
        .entries()
        .iter()
        .map(|entry| DependencyView {
            label: entry.label.clone(),
            policy: entry.policy,
            status: entry.status,
            failure: entry.failure().map(str::to_string),
        })
        .collect()
}

// ============================================================================
// ORDERS (V2)
// ============================================================================

enum OrdersPageData {
    Orders(Vec<Order>),
    Catalog(Vec<CatalogItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersPage {
    pub orders: Vec<Order>,
    pub catalog: Vec<CatalogItem>,
    pub catalog_status: DependencyStatus,
    pub dependencies: Vec<DependencyView>,
    /// False while no catalog item can be selected
    pub can_create: bool,
}

/// Load orders (blocking) and catalog (best-effort) together
pub async fn load_orders_page(gateway: &dyn Gateway) -> Result<OrdersPage> {
    let requests = vec![
        FetchRequest::blocking(ORDERS, async move {
            gateway.list_orders().await.map(OrdersPageData::Orders)
        }),
        FetchRequest::best_effort(
            CATALOG,
            async move { gateway.list_products().await.map(OrdersPageData::Catalog) },
            OrdersPageData::Catalog(Vec::new()),
        ),
    ];

    let mut result = DependencyAggregator::new("orders-page").run(requests).await?;
    let dependencies = dependency_views(&result);
    let catalog_status = result.status(CATALOG);

    let orders = match result.take(ORDERS) {
        Some(OrdersPageData::Orders(orders)) => orders,
        _ => Vec::new(),
    };
    let catalog = match result.take(CATALOG) {
        Some(OrdersPageData::Catalog(catalog)) => catalog,
        _ => Vec::new(),
    };

    let can_create = catalog_status.is_up() && !catalog.is_empty();
    debug!(
        "Orders page: {} orders, {} catalog items, can_create={}",
        orders.len(),
        catalog.len(),
        can_create
    );

    Ok(OrdersPage {
        orders,
        catalog,
        catalog_status,
        dependencies,
        can_create,
    })
}

/// Create/update form as submitted by the user
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    pub description: String,

    #[serde(rename = "idProduit", default)]
    pub catalog_item_id: Option<i64>,

    #[serde(rename = "quantite", default = "default_quantity")]
    pub quantity: i64,

    #[serde(default)]
    pub date: Option<NaiveDate>,
}

fn default_quantity() -> i64 {
    1
}

/// Build a validated draft against the current catalog
///
/// # Errors
/// * `BlockingDependency` - The catalog could not be read
/// * `InvalidInput` - Empty description, quantity < 1, or no known item selected
async fn prepare_draft(gateway: &dyn Gateway, input: &OrderInput) -> Result<OrderDraft> {
    if input.description.trim().is_empty() {
        return Err(ConsoleError::InvalidInput("description is required".to_string()));
    }
    if input.quantity < 1 {
        return Err(ConsoleError::InvalidInput(format!(
            "quantity must be at least 1, got {}",
            input.quantity
        )));
    }

    let catalog = gateway
        .list_products()
        .await
        .map_err(|e| ConsoleError::blocking(ServiceLabel::new(CATALOG), e))?;

    let date = input
        .date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let mut draft = OrderDraft::new(&input.description, date);
    draft.select_item(input.catalog_item_id, &catalog);
    draft.set_quantity(input.quantity, &catalog);

    if draft.selected_item(&catalog).is_none() {
        return Err(ConsoleError::InvalidInput(match input.catalog_item_id {
            Some(id) => format!("unknown catalog item {}", id),
            None => "a catalog item must be selected".to_string(),
        }));
    }

    Ok(draft)
}

/// Create an order with its client-computed amount
pub async fn submit_order(gateway: &dyn Gateway, input: &OrderInput) -> Result<Order> {
    let draft = prepare_draft(gateway, input).await?;
    let order = gateway.create_order(&draft.to_payload()).await?;

    info!("Created order {} (amount {})", order.id, draft.derived_amount);
    Ok(order)
}

pub async fn update_order(gateway: &dyn Gateway, id: i64, input: &OrderInput) -> Result<Order> {
    let draft = prepare_draft(gateway, input).await?;
    let order = gateway.update_order(id, &draft.to_payload()).await?;

    info!("Updated order {} (amount {})", id, draft.derived_amount);
    Ok(order)
}

pub async fn delete_order(gateway: &dyn Gateway, id: i64) -> Result<()> {
    gateway.delete_order(id).await?;
    info!("Deleted order {}", id);
    Ok(())
}

/// Amount preview for a selection, before anything is submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountQuote {
    pub catalog_item_id: Option<i64>,
    pub quantity: i64,
    pub amount: Decimal,
    pub catalog_status: DependencyStatus,
}

pub async fn quote_amount(
    gateway: &dyn Gateway,
    catalog_item_id: Option<i64>,
    quantity: i64,
) -> AmountQuote {
    let (catalog, catalog_status) = match gateway.list_products().await {
        Ok(catalog) => (catalog, DependencyStatus::Up),
        Err(e) => {
            debug!("Catalog unavailable for quote: {}", e);
            (Vec::new(), DependencyStatus::Down)
        }
    };

    let item = catalog_item_id.and_then(|id| catalog.iter().find(|item| item.id == id));
    AmountQuote {
        catalog_item_id,
        quantity,
        amount: derived_amount(item, quantity),
        catalog_status,
    }
}

// ============================================================================
// LEGACY ORDERS (V1)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOrdersPage {
    pub all: Vec<LegacyOrder>,
    pub recent: Vec<LegacyOrder>,
    pub recent_status: DependencyStatus,
    pub dependencies: Vec<DependencyView>,
}

/// Load the full list (blocking) and the recent list (best-effort)
pub async fn load_legacy_orders_page(gateway: &dyn Gateway) -> Result<LegacyOrdersPage> {
    let requests = vec![
        FetchRequest::blocking(LEGACY_ALL, async move { gateway.list_legacy_orders().await }),
        FetchRequest::best_effort(
            LEGACY_RECENT,
            async move { gateway.list_recent_legacy_orders().await },
            Vec::new(),
        ),
    ];

    let mut result = DependencyAggregator::new("legacy-orders-page")
        .run(requests)
        .await?;
    let dependencies = dependency_views(&result);
    let recent_status = result.status(LEGACY_RECENT);

    Ok(LegacyOrdersPage {
        all: result.take(LEGACY_ALL).unwrap_or_default(),
        recent: result.take(LEGACY_RECENT).unwrap_or_default(),
        recent_status,
        dependencies,
    })
}
