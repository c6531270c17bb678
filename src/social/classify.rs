//! Provider error classification.
//!
//! [`classify`] is the single place that interprets provider status codes,
//! provider error codes and messages. The poster's retry/failover decision
//! and the amplifier's "already done" handling both consume its output.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Provider code: account suspended.
const CODE_SUSPENDED: i64 = 64;
/// Provider code: account temporarily locked.
const CODE_LOCKED: i64 = 326;
/// Provider code: duplicate status.
const CODE_DUPLICATE: i64 = 187;
/// Provider code: already favorited.
const CODE_ALREADY_LIKED: i64 = 139;
/// Provider code: already retweeted.
const CODE_ALREADY_RETWEETED: i64 = 327;

/// An error response (or transport failure) from the social platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// HTTP status; `None` for timeouts and connection failures.
    pub status: Option<u16>,
    /// Provider-specific numeric error code, when present.
    pub code: Option<i64>,
    /// Human-readable message.
    pub message: String,
    /// When the rate-limit window resets (429 responses only).
    pub rate_limit_reset: Option<DateTime<Utc>>,
}

impl ProviderError {
    /// A transport-level failure with no HTTP status.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            rate_limit_reset: None,
        }
    }

    /// An HTTP error response.
    #[must_use]
    pub fn http(status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code,
            message: message.into(),
            rate_limit_reset: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.code) {
            (Some(status), Some(code)) => write!(f, "{} (status {status}, code {code})", self.message),
            (Some(status), None) => write!(f, "{} (status {status})", self.message),
            (None, _) => f.write_str(&self.message),
        }
    }
}

/// Closed set of outcomes a provider failure is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Credentials rejected or content refused by policy.
    AuthInvalid,
    /// Quota exhausted for this account.
    RateLimited,
    /// Account suspended or locked.
    Suspended,
    /// The action was already performed (duplicate post, already liked).
    Duplicate,
    /// Timeouts and server errors.
    Transient,
    /// Anything not recognized.
    Unknown,
}

impl ErrorClass {
    /// Whether another attempt on the same account may succeed.
    #[must_use]
    pub const fn retry_same_account(self) -> bool {
        matches!(self, Self::Transient | Self::Unknown)
    }

    /// Storage and log representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthInvalid => "auth_invalid",
            Self::RateLimited => "rate_limited",
            Self::Suspended => "suspended",
            Self::Duplicate => "duplicate",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a provider error to its [`ErrorClass`].
#[must_use]
pub fn classify(err: &ProviderError) -> ErrorClass {
    let Some(status) = err.status else {
        return ErrorClass::Transient;
    };
    let message = err.message.to_ascii_lowercase();

    let auth_status = matches!(status, 401 | 403);

    if matches!(err.code, Some(CODE_SUSPENDED | CODE_LOCKED))
        || (auth_status && (message.contains("suspended") || message.contains("locked")))
    {
        return ErrorClass::Suspended;
    }
    if matches!(
        err.code,
        Some(CODE_DUPLICATE | CODE_ALREADY_LIKED | CODE_ALREADY_RETWEETED)
    ) || (matches!(status, 400 | 403 | 409)
        && (message.contains("duplicate") || message.contains("already")))
    {
        return ErrorClass::Duplicate;
    }

    match status {
        401 | 403 => ErrorClass::AuthInvalid,
        429 => ErrorClass::RateLimited,
        408 | 500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert_eq!(classify(&ProviderError::transport("timed out")), ErrorClass::Transient);
    }

    #[test]
    fn auth_failures() {
        assert_eq!(classify(&ProviderError::http(401, Some(89), "Invalid or expired token")), ErrorClass::AuthInvalid);
        assert_eq!(
            classify(&ProviderError::http(403, None, "You are not permitted to perform this action")),
            ErrorClass::AuthInvalid
        );
    }

    #[test]
    fn suspension_by_code_or_message() {
        assert_eq!(classify(&ProviderError::http(403, Some(64), "Forbidden")), ErrorClass::Suspended);
        assert_eq!(classify(&ProviderError::http(403, Some(326), "Forbidden")), ErrorClass::Suspended);
        assert_eq!(
            classify(&ProviderError::http(403, None, "This account is suspended")),
            ErrorClass::Suspended
        );
    }

    #[test]
    fn suspension_words_outside_auth_statuses_are_ignored() {
        assert_eq!(
            classify(&ProviderError::http(503, None, "Database deadlocked, try again")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&ProviderError::http(500, None, "Upstream blocked the request")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&ProviderError::http(401, None, "Your account is temporarily locked")),
            ErrorClass::Suspended
        );
    }

    #[test]
    fn duplicates_and_already_done() {
        assert_eq!(classify(&ProviderError::http(403, Some(187), "Status is a duplicate.")), ErrorClass::Duplicate);
        assert_eq!(
            classify(&ProviderError::http(
                403,
                None,
                "You are not allowed to create a Tweet with duplicate content."
            )),
            ErrorClass::Duplicate
        );
        assert_eq!(
            classify(&ProviderError::http(403, None, "You have already retweeted this Tweet.")),
            ErrorClass::Duplicate
        );
    }

    #[test]
    fn rate_limits_and_server_errors() {
        assert_eq!(classify(&ProviderError::http(429, Some(88), "Too Many Requests")), ErrorClass::RateLimited);
        assert_eq!(classify(&ProviderError::http(503, None, "Service Unavailable")), ErrorClass::Transient);
        assert_eq!(classify(&ProviderError::http(408, None, "Request Timeout")), ErrorClass::Transient);
        assert_eq!(classify(&ProviderError::http(400, None, "Bad Request")), ErrorClass::Unknown);
    }

    #[test]
    fn retry_policy_per_class() {
        assert!(ErrorClass::Transient.retry_same_account());
        assert!(ErrorClass::Unknown.retry_same_account());
        assert!(!ErrorClass::AuthInvalid.retry_same_account());
        assert!(!ErrorClass::RateLimited.retry_same_account());
        assert!(!ErrorClass::Suspended.retry_same_account());
        assert!(!ErrorClass::Duplicate.retry_same_account());
    }
}
