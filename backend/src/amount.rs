//! Derived Amount
//!
//! Client-side order amount shown before (and submitted without) server
//! confirmation. The order service stores what it is sent; it never
//! recomputes, so the two values may diverge if catalog prices change.

use crate::types::{CatalogItem, OrderPayload};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Minor-unit precision of the currency (cents)
pub const MINOR_UNIT_DP: u32 = 2;

/// `unit_price * quantity`, or zero when no item is known or quantity ≤ 0.
/// Midpoints round away from zero.
///
/// # Example
/// ```text
/// unit price 19.99, quantity 3 → 59.97
/// no item,          quantity 3 → 0
/// ```
pub fn derived_amount(item: Option<&CatalogItem>, quantity: i64) -> Decimal {
    match item {
        Some(item) if quantity > 0 => {
            (item.unit_price * Decimal::from(quantity))
                .round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
        }
        _ => Decimal::ZERO,
    }
}

/// Order being edited. `derived_amount` follows every change of item or
/// quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDraft {
    pub description: String,

    /// `None` until an item is picked, and always when the catalog is down
    pub catalog_item_id: Option<i64>,

    pub quantity: i64,

    pub date: NaiveDate,

    pub derived_amount: Decimal,
}

impl OrderDraft {
    pub fn new(description: &str, date: NaiveDate) -> Self {
        Self {
            description: description.to_string(),
            catalog_item_id: None,
            quantity: 1,
            date,
            derived_amount: Decimal::ZERO,
        }
    }

    pub fn select_item(&mut self, catalog_item_id: Option<i64>, catalog: &[CatalogItem]) {
        self.catalog_item_id = catalog_item_id;
        self.recompute(catalog);
    }

    pub fn set_quantity(&mut self, quantity: i64, catalog: &[CatalogItem]) {
        self.quantity = quantity;
        self.recompute(catalog);
    }

    /// Catalog entry matching the selection, if the catalog knows it
    pub fn selected_item<'c>(&self, catalog: &'c [CatalogItem]) -> Option<&'c CatalogItem> {
        let id = self.catalog_item_id?;
        catalog.iter().find(|item| item.id == id)
    }

    fn recompute(&mut self, catalog: &[CatalogItem]) {
        self.derived_amount = derived_amount(self.selected_item(catalog), self.quantity);
    }

    /// Wire body for create/update, carrying the client-computed amount
    pub fn to_payload(&self) -> OrderPayload {
        OrderPayload {
            description: self.description.clone(),
            catalog_item_id: self.catalog_item_id,
            quantity: self.quantity,
            amount: self.derived_amount,
            date: self.date,
        }
    }
}
