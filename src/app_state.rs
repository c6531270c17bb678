//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::BoostService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Boost service for all business logic.
    pub boost_service: Arc<BoostService>,
    /// Key required by operator endpoints; `None` leaves them open.
    pub api_key: Option<Arc<str>>,
    /// Payment webhook signing secret; `None` skips verification.
    pub webhook_secret: Option<Arc<str>>,
    /// Accepted age of a webhook signature timestamp, in seconds.
    pub webhook_tolerance_secs: i64,
}
