//! # boost-gateway
//!
//! Lifecycle orchestrator for sponsored social posts ("boosts").
//!
//! A boost pairs a customer's product with third-party content and is
//! published from one of the service's social accounts. It is funded by a
//! one-off payment, a subscription credit, or redeemed reward points. The
//! gateway takes the trigger (a signed payment webhook or an authenticated
//! redemption call), debits the right balance atomically, publishes with
//! bounded retries and ordered account failover, and records the terminal
//! outcome. Amplification by the remaining accounts and the customer
//! notification run as background tasks.
//!
//! ## Architecture
//!
//! ```text
//! Clients (payment provider, operators, customers)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── BoostService (service/)
//!     ├── Dispatcher ──► EngagementAmplifier, Notifier
//!     │
//!     ├── SocialPoster (social/) ──► SocialClient (OAuth 1.0a HTTP)
//!     │
//!     └── RecordStore + BalanceLedger (persistence/)
//!           ├── PostgreSQL (sqlx)
//!           └── in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod social;
