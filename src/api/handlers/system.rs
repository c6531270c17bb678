//! System endpoints: health check, account health, stats.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::{AccountHealthDto, StatsParams, StatsResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /accounts/health` — Advisory health of each posting account.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/health",
    tag = "System",
    summary = "Posting account health",
    description = "Last success, last failure and its classification, and rate-limit reset per account, in failover order. Diagnostic only; never gates posting.",
    responses(
        (status = 200, description = "Account health", body = Vec<AccountHealthDto>),
    )
)]
pub async fn account_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let accounts: Vec<AccountHealthDto> = state
        .boost_service
        .account_health()
        .await
        .into_iter()
        .map(|(account, health)| AccountHealthDto { account, health })
        .collect();
    Json(accounts)
}

/// `GET /stats` — Boost counts derived from stored records.
///
/// # Errors
///
/// Returns a persistence error if the store is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "System",
    summary = "Boost statistics",
    params(StatsParams),
    responses(
        (status = 200, description = "Counts by origin and status", body = StatsResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let since = params.since(Utc::now());
    let buckets = state.boost_service.stats(since).await?;
    Ok(Json(StatsResponse::new(since, buckets)))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Diagnostic routes mounted under /api/v1.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/health", get(account_health_handler))
        .route("/stats", get(stats_handler))
}
