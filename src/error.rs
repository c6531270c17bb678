//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Lower layers report through their own error enums
//! ([`crate::persistence::StoreError`], [`crate::social::PostError`]) which
//! convert into this one at the service boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::StoreError;
use crate::social::PostError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4002,
///     "message": "insufficient balance",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                 |
/// |-----------|-------------------|-----------------------------|
/// | 1000–1999 | Validation / Auth | 400 Bad Request / 401       |
/// | 2000–2999 | Not Found         | 404 Not Found               |
/// | 3000–3999 | Server            | 500 Internal Server Error   |
/// | 4000–4999 | Balance           | 422 Unprocessable Entity    |
/// | 5000–5999 | Upstream          | 502 Bad Gateway             |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown balance type string.
    #[error("invalid balance type: {0}")]
    InvalidBalanceType(String),

    /// Webhook signature missing, malformed, stale, or wrong.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Missing or wrong API key.
    #[error("unauthorized")]
    Unauthorized,

    /// Boost record with the given transaction id was not found.
    #[error("boost not found: {0}")]
    BoostNotFound(String),

    /// No subscription account or reward ledger for the given email.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The balance could not cover the requested debit.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Every candidate social account failed to publish.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidBalanceType(_) => 1002,
            Self::InvalidSignature(_) => 1003,
            Self::Unauthorized => 1004,
            Self::BoostNotFound(_) => 2001,
            Self::AccountNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::InsufficientBalance => 4002,
            Self::PublishFailed(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidBalanceType(_) | Self::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BoostNotFound(_) | Self::AccountNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PublishFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidAmount(amount) => {
                Self::InvalidRequest(format!("amount must be positive, got {amount}"))
            }
            StoreError::NotFound(email) => Self::AccountNotFound(email),
            other => Self::PersistenceError(other.to_string()),
        }
    }
}

impl From<PostError> for GatewayError {
    fn from(err: PostError) -> Self {
        Self::PublishFailed(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
