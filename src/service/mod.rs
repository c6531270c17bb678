//! Service layer: business logic orchestration.
//!
//! [`BoostService`] drives the boost lifecycle and balance bookkeeping. It
//! hands fire-and-forget work to the [`Dispatcher`], whose worker runs
//! amplification and calls the [`Notifier`]. [`payment_events`] verifies
//! and parses payment-provider webhooks.

pub mod boost_service;
pub mod dispatcher;
pub mod notifier;
pub mod payment_events;

pub use boost_service::{
    BoostService, EngagementReceipt, EventOutcome, OrderRequest, PaymentOutcome, PublishPolicy,
    RedeemRequest, RedemptionReceipt,
};
pub use dispatcher::{BackgroundTask, Dispatcher};
pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use payment_events::PaymentEvent;
