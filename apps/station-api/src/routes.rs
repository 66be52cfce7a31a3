//! HTTP routes.
//!
//! ```text
//! POST /stations/{id}/retrieval/start         start_retrieval
//! POST /stations/{id}/retrieval/first-scan    scan_first          { cell_id }
//! POST /stations/{id}/retrieval/quantities    confirm_quantities  { items }
//! POST /stations/{id}/retrieval/second-scan   scan_second         { cell_id }
//! POST /stations/{id}/putaway/start           start_putaway
//! POST /stations/{id}/putaway/item-scan       scan_item_code      { item_code }
//! POST /stations/{id}/putaway/target-scan     scan_target_cell    { cell_id }
//! POST /stations/{id}/keys                    key_press           { key }
//! POST /stations/{id}/abandon                 abandon
//! POST /stations/{id}/advance                 advance
//! GET  /stations/{id}                         status
//! GET  /orders                                list_orders
//! POST /orders                                add_order           { order_no, lines }
//! DELETE /orders/{order_no}                   delete_order
//! GET  /orders/retrievable                    retrievable list
//! GET  /health                                database check
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use beacon_core::allocation::{PutawayPlan, RetrievalPlan};
use beacon_core::input::Key;
use beacon_core::session::{FirstScanResolution, SessionState};
use beacon_core::{Order, OrderLine, PickItem, Zone};
use beacon_station::{
    CommitReceipt, KeyOutcome, PutawayStarted, RetrievalStarted, StationStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

type AppStateRef = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stations/{id}", get(status))
        .route("/stations/{id}/retrieval/start", post(start_retrieval))
        .route("/stations/{id}/retrieval/first-scan", post(scan_first))
        .route("/stations/{id}/retrieval/quantities", post(confirm_quantities))
        .route("/stations/{id}/retrieval/second-scan", post(scan_second))
        .route("/stations/{id}/putaway/start", post(start_putaway))
        .route("/stations/{id}/putaway/item-scan", post(scan_item_code))
        .route("/stations/{id}/putaway/target-scan", post(scan_target_cell))
        .route("/stations/{id}/keys", post(key_press))
        .route("/stations/{id}/abandon", post(abandon))
        .route("/stations/{id}/advance", post(advance))
        .route("/orders", get(list_orders).post(add_order))
        .route("/orders/{order_no}", delete(delete_order))
        .route("/orders/retrievable", get(retrievable))
        .route("/health", get(health))
        .with_state(state)
}

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CellScan {
    pub cell_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemScan {
    pub item_code: String,
}

#[derive(Debug, Deserialize)]
pub struct Quantities {
    pub items: Vec<PickItem>,
}

/// A browser `KeyboardEvent.key` value: `"A"`, `"Enter"`, `"Shift"`, ...
#[derive(Debug, Deserialize)]
pub struct KeyInput {
    pub key: String,
}

/// A new retrieval order as entered at the office terminal.
#[derive(Debug, Deserialize)]
pub struct NewOrder {
    pub order_no: String,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct NewOrderLine {
    pub item_code: String,
    pub quantity: i64,
}

impl From<NewOrder> for Order {
    fn from(body: NewOrder) -> Self {
        let lines = body
            .lines
            .into_iter()
            .map(|l| OrderLine::new(l.item_code, l.quantity))
            .collect();
        Order::new(body.order_no, lines)
    }
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub order_no: String,
}

#[derive(Debug, Serialize)]
pub struct Abandoned {
    pub abandoned_from: SessionState,
}

#[derive(Debug, Serialize)]
pub struct Advanced {
    pub returned_zone: Option<Zone>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

// =============================================================================
// Retrieval
// =============================================================================

async fn start_retrieval(State(state): AppStateRef, Path(id): Path<String>) -> ApiResult<RetrievalStarted> {
    Ok(Json(state.engine.start_retrieval(&id).await?))
}

async fn scan_first(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<CellScan>,
) -> ApiResult<FirstScanResolution> {
    Ok(Json(state.engine.scan_first(&id, &body.cell_id).await?))
}

async fn confirm_quantities(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<Quantities>,
) -> ApiResult<Vec<PickItem>> {
    Ok(Json(state.engine.confirm_quantities(&id, body.items).await?))
}

async fn scan_second(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<CellScan>,
) -> ApiResult<CommitReceipt> {
    Ok(Json(state.engine.scan_second(&id, &body.cell_id).await?))
}

// =============================================================================
// Put-away
// =============================================================================

async fn start_putaway(State(state): AppStateRef, Path(id): Path<String>) -> ApiResult<PutawayStarted> {
    Ok(Json(state.engine.start_putaway(&id).await?))
}

async fn scan_item_code(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<ItemScan>,
) -> ApiResult<PutawayPlan> {
    Ok(Json(state.engine.scan_item_code(&id, &body.item_code).await?))
}

async fn scan_target_cell(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<CellScan>,
) -> ApiResult<CommitReceipt> {
    Ok(Json(state.engine.scan_target_cell(&id, &body.cell_id).await?))
}

// =============================================================================
// Session
// =============================================================================

async fn key_press(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(body): Json<KeyInput>,
) -> ApiResult<KeyOutcome> {
    let key: Key = body
        .key
        .parse()
        .map_err(|e: beacon_core::ValidationError| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.engine.key_press(&id, key).await?))
}

async fn abandon(State(state): AppStateRef, Path(id): Path<String>) -> ApiResult<Abandoned> {
    let abandoned_from = state.engine.abandon(&id).await?;
    Ok(Json(Abandoned { abandoned_from }))
}

async fn advance(State(state): AppStateRef, Path(id): Path<String>) -> ApiResult<Advanced> {
    let returned_zone = state.engine.advance(&id).await?;
    Ok(Json(Advanced { returned_zone }))
}

async fn status(State(state): AppStateRef, Path(id): Path<String>) -> ApiResult<StationStatus> {
    Ok(Json(state.engine.status(&id).await?))
}

// =============================================================================
// Orders / Health
// =============================================================================

async fn list_orders(State(state): AppStateRef) -> ApiResult<Vec<Order>> {
    Ok(Json(state.db.orders().list_all().await?))
}

async fn add_order(
    State(state): AppStateRef,
    Json(body): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = Order::from(body);
    state.db.orders().insert(&order).await?;
    info!(order_no = %order.order_no, lines = order.lines.len(), "Order added");
    republish(&state).await;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn delete_order(State(state): AppStateRef, Path(order_no): Path<String>) -> ApiResult<Deleted> {
    state.db.orders().delete(&order_no).await?;
    info!(%order_no, "Order deleted");
    republish(&state).await;
    Ok(Json(Deleted { order_no }))
}

/// Order intake changes which orders are retrievable.
async fn republish(state: &AppState) {
    if let Err(e) = state.engine.refresh_retrievable().await {
        warn!(error = %e, "Retrievable refresh failed");
    }
}

async fn retrievable(State(state): AppStateRef) -> Json<Vec<RetrievalPlan>> {
    Json(state.engine.retrievable())
}

async fn health(State(state): AppStateRef) -> (StatusCode, Json<Health>) {
    let database = state.db.health_check().await;
    debug!(database, "Health check");
    if database {
        (StatusCode::OK, Json(Health { status: "ok", database }))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(Health { status: "degraded", database }))
    }
}

// =============================================================================
// Tests
// =============================================================================
