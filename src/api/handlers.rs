//! API Handlers
//!
//! HTTP request handlers for each sidecar endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::debug;

use crate::cache::Category;
use crate::coordinator::RequestCoordinator;
use crate::error::{CoordinatorError, Result};
use crate::models::{
    HealthResponse, InvalidateQuery, InvalidateResponse, MutateRequest, MutateResponse,
    ReadRequest, ReadResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RequestCoordinator,
}

impl AppState {
    pub fn new(coordinator: RequestCoordinator) -> Self {
        Self { coordinator }
    }
}

/// Handler for POST /read
///
/// Cached, coalesced read through the coordinator.
pub async fn read_handler(
    State(state): State<AppState>,
    Json(req): Json<ReadRequest>,
) -> Result<Json<ReadResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CoordinatorError::InvalidRequest(error_msg));
    }

    let request = req.api_request();
    let category = req.category();
    let key = category.key_for(&request.signature());

    let value = state.coordinator.read(&request, &category).await?;
    Ok(Json(ReadResponse::new(key, value)))
}

/// Handler for POST /mutate
pub async fn mutate_handler(
    State(state): State<AppState>,
    Json(req): Json<MutateRequest>,
) -> Result<Json<MutateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CoordinatorError::InvalidRequest(error_msg));
    }

    let action = req.action();
    let value = state.coordinator.mutate(&req.api_request(), &action).await?;
    Ok(Json(MutateResponse::new(action.as_str(), value)))
}

/// Handler for DELETE /cache/:category
///
/// Removes a category's entries, optionally only those matching `pattern`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    debug!("Manual invalidation of {} (pattern: {:?})", category, query.pattern);
    let removed = state
        .coordinator
        .invalidate(&Category::new(category.as_str()), query.pattern.as_deref())
        .await?;

    Ok(Json(InvalidateResponse::new(category, removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.coordinator.stats().await;
    let in_flight = state.coordinator.in_flight().await;

    Json(StatsResponse::new(&stats, in_flight))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
