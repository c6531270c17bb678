//! Balance and reward handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::RequireApiKey;
use crate::api::dto::{
    BalancesResponse, EngagementRequest, EngagementResponse, GrantRequest, GrantResponse,
    LinkIdentityRequest,
};
use crate::app_state::AppState;
use crate::domain::{BalanceType, RewardLedger, normalize_email};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /balances/{email}` — Credits and points of a customer.
///
/// # Errors
///
/// Returns [`GatewayError::AccountNotFound`] if the customer has no
/// balances.
#[utoipa::path(
    get,
    path = "/api/v1/balances/{email}",
    tag = "Balances",
    summary = "Get balances",
    params(("email" = String, Path, description = "Customer email")),
    responses(
        (status = 200, description = "Balances", body = BalancesResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 404, description = "No balances for this email", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn get_balances(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let balances = state.boost_service.balances(&email).await?;
    Ok(Json(BalancesResponse::new(normalize_email(&email)?, balances)))
}

/// `POST /balances/{email}/grant` — Add credits or points by hand.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown balance type, a non-positive
/// amount, or credits for a customer without a subscription.
#[utoipa::path(
    post,
    path = "/api/v1/balances/{email}/grant",
    tag = "Balances",
    summary = "Grant balance",
    params(("email" = String, Path, description = "Customer email")),
    request_body = GrantRequest,
    responses(
        (status = 200, description = "New balance", body = GrantResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "No subscription to credit", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn grant_balance(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let balance_type: BalanceType = req.balance_type.parse()?;
    let balance = state
        .boost_service
        .grant(&email, balance_type, req.amount)
        .await?;
    Ok(Json(GrantResponse {
        email: normalize_email(&email)?,
        balance_type,
        balance,
    }))
}

/// `POST /rewards/engagements` — Credit points for an engagement.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed email or blank
/// post id.
#[utoipa::path(
    post,
    path = "/api/v1/rewards/engagements",
    tag = "Rewards",
    summary = "Record an engagement",
    description = "Credits points once per (email, post, action). Repeated calls return `credited: false`.",
    request_body = EngagementRequest,
    responses(
        (status = 200, description = "Engagement processed", body = EngagementResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn record_engagement(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Json(req): Json<EngagementRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state
        .boost_service
        .record_engagement(&req.email, &req.post_id, req.action)
        .await?;
    Ok(Json(EngagementResponse::from(receipt)))
}

/// `POST /rewards/link` — Link a social handle to a reward ledger.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed email or blank
/// handle.
#[utoipa::path(
    post,
    path = "/api/v1/rewards/link",
    tag = "Rewards",
    summary = "Link social identity",
    request_body = LinkIdentityRequest,
    responses(
        (status = 200, description = "Updated ledger", body = RewardLedger),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn link_identity(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Json(req): Json<LinkIdentityRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let ledger = state
        .boost_service
        .link_social_identity(&req.email, &req.handle)
        .await?;
    Ok(Json(ledger))
}

/// Balance and reward routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/balances/{email}", get(get_balances))
        .route("/balances/{email}/grant", post(grant_balance))
        .route("/rewards/engagements", post(record_engagement))
        .route("/rewards/link", post(link_identity))
}
