//! REST endpoint handlers organized by resource.

pub mod boost;
pub mod ledger;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(boost::routes())
        .merge(webhook::routes())
        .merge(ledger::routes())
        .merge(system::api_routes())
}
