//! Payment-provider webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::payment_events::{self, PaymentEvent, SIGNATURE_HEADER};
use crate::service::{EventOutcome, PaymentOutcome};

/// `POST /webhooks/payment` — Receive a signed payment event.
///
/// Publishing failures are recorded on the boost and still acknowledged;
/// the provider only sees an error for bad signatures, malformed events or
/// storage outages, which it will redeliver.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidSignature`], [`GatewayError::InvalidRequest`]
/// or a persistence error.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    tag = "Webhooks",
    summary = "Payment provider webhook",
    description = "Verifies the `Stripe-Signature` header and processes checkout completions and subscription renewals. Other event types are acknowledged and ignored.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Bad signature or malformed event", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::InvalidSignature("missing signature header".to_string()))?;
        payment_events::verify_signature(
            secret,
            signature,
            &body,
            state.webhook_tolerance_secs,
            Utc::now(),
        )?;
    }

    let event = PaymentEvent::parse(&body)?;
    let outcome = state.boost_service.handle_payment_event(event).await?;
    Ok(Json(WebhookAck {
        received: true,
        outcome: describe(&outcome).to_string(),
    }))
}

fn describe(outcome: &EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Boost(PaymentOutcome::Missing) => "boost_not_found",
        EventOutcome::Boost(PaymentOutcome::AlreadyTerminal(_)) => "already_processed",
        EventOutcome::Boost(PaymentOutcome::InFlight) => "in_progress",
        EventOutcome::Boost(PaymentOutcome::Published(_)) => "published",
        EventOutcome::Boost(PaymentOutcome::Failed(_)) => "failed",
        EventOutcome::SubscriptionStarted(_) => "subscription_started",
        EventOutcome::SubscriptionRenewed(_) => "subscription_renewed",
        EventOutcome::Ignored => "ignored",
    }
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payment", post(payment_webhook))
}
