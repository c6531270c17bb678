//! Boost handlers: place order, poll status, redeem, internal boost.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::RequireApiKey;
use crate::api::dto::{
    BoostStatusResponse, InternalBoostRequest, PlaceOrderRequest, RedeemBoostRequest,
    RedeemBoostResponse,
};
use crate::app_state::AppState;
use crate::domain::BoostId;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /boosts` — Create the pending record for a paid boost.
///
/// # Errors
///
/// Returns [`GatewayError`] on an incomplete payload or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/boosts",
    tag = "Boosts",
    summary = "Place a boost order",
    description = "Stores a pending boost keyed by the payment-session id. The boost is published when the payment provider confirms the payment. Repeating the call with the same id returns the stored record unchanged.",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order stored", body = BoostStatusResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
    )
)]
pub async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let record = state.boost_service.place_order(req.into()).await?;
    Ok((StatusCode::CREATED, Json(BoostStatusResponse::from(record))))
}

/// `GET /boosts/{id}` — Poll a boost's status.
///
/// # Errors
///
/// Returns [`GatewayError::BoostNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/boosts/{id}",
    tag = "Boosts",
    summary = "Get boost status",
    description = "Read-only projection of a boost record: pending, published with its post URL, or failed with a reason.",
    params(("id" = String, Path, description = "Transaction or boost id")),
    responses(
        (status = 200, description = "Boost status", body = BoostStatusResponse),
        (status = 404, description = "Boost not found", body = ErrorResponse),
    )
)]
pub async fn get_boost(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let record = state.boost_service.status(&BoostId::from(id)).await?;
    Ok(Json(BoostStatusResponse::from(record)))
}

/// `POST /boosts/redeem` — Publish a boost paid with credits or points.
///
/// # Errors
///
/// Returns [`GatewayError`] on bad input, insufficient balance, or when
/// every posting account failed.
#[utoipa::path(
    post,
    path = "/api/v1/boosts/redeem",
    tag = "Boosts",
    summary = "Redeem a balance for a boost",
    description = "Debits one subscription credit or the configured reward-point cost, then publishes synchronously. Nothing is stored when the balance is insufficient. A debit is not refunded if publishing fails.",
    request_body = RedeemBoostRequest,
    responses(
        (status = 200, description = "Boost published", body = RedeemBoostResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 422, description = "Insufficient balance", body = ErrorResponse),
        (status = 502, description = "Publishing failed", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn redeem(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Json(req): Json<RedeemBoostRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state.boost_service.redeem(req.try_into()?).await?;
    Ok(Json(RedeemBoostResponse::from(receipt)))
}

/// `POST /boosts/internal` — Publish a boost on the service's behalf.
///
/// # Errors
///
/// Returns [`GatewayError`] on an incomplete payload or when every posting
/// account failed.
#[utoipa::path(
    post,
    path = "/api/v1/boosts/internal",
    tag = "Boosts",
    summary = "Publish an internal boost",
    request_body = InternalBoostRequest,
    responses(
        (status = 201, description = "Boost published", body = BoostStatusResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 502, description = "Publishing failed", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn publish_internal(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Json(req): Json<InternalBoostRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let record = state.boost_service.publish_internal(req.into()).await?;
    Ok((StatusCode::CREATED, Json(BoostStatusResponse::from(record))))
}

/// Boost routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/boosts", post(place_order))
        .route("/boosts/redeem", post(redeem))
        .route("/boosts/internal", post(publish_internal))
        .route("/boosts/{id}", get(get_boost))
}
