//! REST API
//!
//! JSON endpoints backing the console's order, probe and health views.

use crate::{
    error::{ConsoleError, Result},
    gateway_client::Gateway,
    health::{HealthMonitor, HealthPoller, HealthReport},
    probe::{FallbackProbe, ProbeResult, ProbeSession, ProbeState},
    types::Order,
    views::{self, AmountQuote, LegacyOrdersPage, OrderInput, OrdersPage},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub probe: Arc<FallbackProbe>,
    pub probe_session: Arc<Mutex<ProbeSession>>,
    pub health: Arc<HealthPoller>,
    pub monitor: Option<Arc<HealthMonitor>>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn Gateway>, probe: FallbackProbe, health: HealthPoller) -> Self {
        Self {
            gateway,
            probe: Arc::new(probe),
            probe_session: Arc::new(Mutex::new(ProbeSession::new())),
            health: Arc::new(health),
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: HealthMonitor) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Order endpoints
        .route("/api/orders", get(orders_page).post(create_order))
        .route("/api/orders/amount", get(quote_amount))
        .route("/api/orders/:id", axum::routing::put(update_order).delete(delete_order))
        .route("/api/legacy-orders", get(legacy_orders_page))

        // Probe endpoints
        .route("/api/probe", get(probe_state))
        .route("/api/probe/:id", post(run_probe))

        // Health endpoints
        .route("/api/health", get(health_check))
        .route("/api/health/latest", get(latest_health))

        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// ORDER ENDPOINTS
// ============================================================================

/// GET /api/orders
///
/// Orders with the catalog needed by the creation form. Renders even when
/// the catalog is down; `canCreate` is then false.
async fn orders_page(State(state): State<AppState>) -> Result<Json<ApiResponse<OrdersPage>>> {
    let page = views::load_orders_page(state.gateway.as_ref()).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/orders
async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let order = views::submit_order(state.gateway.as_ref(), &input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
}

/// PUT /api/orders/:id
async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<OrderInput>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = views::update_order(state.gateway.as_ref(), id, &input).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// DELETE /api/orders/:id
async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    views::delete_order(state.gateway.as_ref(), id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Order {} deleted", id),
    }))
}

/// GET /api/orders/amount
///
/// Query params: ?idProduit=3&quantite=2
async fn quote_amount(
    State(state): State<AppState>,
    Query(params): Query<QuoteQuery>,
) -> Json<ApiResponse<AmountQuote>> {
    let quote = views::quote_amount(state.gateway.as_ref(), params.catalog_item_id, params.quantity).await;
    Json(ApiResponse::ok(quote))
}

/// GET /api/legacy-orders
async fn legacy_orders_page(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<LegacyOrdersPage>>> {
    let page = views::load_legacy_orders_page(state.gateway.as_ref()).await?;
    Ok(Json(ApiResponse::ok(page)))
}

// ============================================================================
// PROBE ENDPOINTS
// ============================================================================

/// POST /api/probe/:id
///
/// Probe one order. `live` is false when another probe started while this
/// one was in flight; its result is returned but not displayed.
async fn run_probe(State(state): State<AppState>, Path(id): Path<i64>) -> Json<ProbeResponse> {
    let ticket = state.probe_session.lock().await.begin(id);

    let result = state.probe.probe(state.gateway.as_ref(), id).await;

    let live = state
        .probe_session
        .lock()
        .await
        .complete(ticket, result.clone());

    info!("Probe #{} on order {} finished (live: {})", ticket.sequence, id, live);
    Json(ProbeResponse {
        success: true,
        data: result,
        live,
    })
}

/// GET /api/probe
async fn probe_state(State(state): State<AppState>) -> Json<ProbeState> {
    Json(state.probe_session.lock().await.state().clone())
}

// ============================================================================
// HEALTH ENDPOINTS
// ============================================================================

/// GET /api/health
///
/// One poll of every registered service; each request is a fresh activation.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.health.poll_all(state.gateway.as_ref()).await;

    Json(HealthResponse {
        success: report.all_up(),
        data: report,
    })
}

/// GET /api/health/latest
///
/// Last report of the background monitor, when enabled
async fn latest_health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let monitor = state
        .monitor
        .as_ref()
        .ok_or_else(|| ConsoleError::NotFound("background health monitor is disabled".to_string()))?;
    let report = monitor.latest().await;

    Ok(Json(HealthResponse {
        success: report.all_up(),
        data: report,
    }))
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    #[serde(rename = "idProduit")]
    pub catalog_item_id: Option<i64>,
    #[serde(rename = "quantite", default)]
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub success: bool,
    pub data: ProbeResult,
    pub live: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub data: HealthReport,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConsoleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ConsoleError::NotFound(_) => StatusCode::NOT_FOUND,
            ConsoleError::Upstream { status: 404, .. } => StatusCode::NOT_FOUND,
            ConsoleError::Transport(_)
            | ConsoleError::Upstream { .. }
            | ConsoleError::Decode(_)
            | ConsoleError::BlockingDependency { .. } => StatusCode::BAD_GATEWAY,
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
