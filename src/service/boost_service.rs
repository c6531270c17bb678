//! Boost service: the lifecycle orchestrator.
//!
//! Every boost moves `Pending → Published` or `Pending → Failed` exactly
//! once, and only this service decides which. Two entry points drive the
//! same machine:
//!
//! - [`BoostService::handle_payment_confirmed`] resolves a record created
//!   earlier by [`BoostService::place_order`] once the payment provider
//!   confirms the transaction.
//! - [`BoostService::redeem`] debits a subscription credit or reward points
//!   and publishes a fresh record synchronously.
//!
//! Both converge on one publish step: render placeholders, post through the
//! [`SocialPoster`], write the terminal state, then hand amplification and
//! notification to the [`Dispatcher`] without waiting on them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::dispatcher::{BackgroundTask, Dispatcher};
use super::payment_events::PaymentEvent;
use crate::config::{RewardConfig, SocialConfig};
use crate::domain::placeholder;
use crate::domain::{
    BalanceType, Balances, BoostId, BoostOrigin, BoostPayload, BoostRecord, BoostStatus,
    EngagementAction, EngagementEvent, PlanTier, PublishResult, RewardLedger,
    SubscriptionAccount, normalize_email,
};
use crate::error::GatewayError;
use crate::persistence::{BalanceLedger, BoostStat, RecordStore, StoreError};
use crate::social::{AccountHealth, AccountId, PostError, PostOptions, SocialPoster};

/// How boosts are published.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    /// Account every boost is posted from first.
    pub primary_account: AccountId,
    /// Attempts per account.
    pub retries: u32,
    /// Base retry backoff.
    pub retry_delay: Duration,
    /// Whether published boosts are amplified.
    pub amplify: bool,
}

impl PublishPolicy {
    /// Derives the policy from the social settings.
    ///
    /// The primary account is the configured one, else the first account.
    #[must_use]
    pub fn from_config(social: &SocialConfig) -> Self {
        let primary_account = social
            .primary_account
            .clone()
            .or_else(|| social.accounts.first().map(|a| a.id.clone()))
            .unwrap_or_else(|| AccountId::from("primary"));
        Self {
            primary_account,
            retries: social.post_retries,
            retry_delay: social.post_retry_delay,
            amplify: social.amplify_enabled,
        }
    }
}

/// What a payment confirmation did to its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// No record for the transaction id; logged as an integrity warning.
    Missing,
    /// The record was already terminal; nothing happened.
    AlreadyTerminal(BoostStatus),
    /// Another delivery owns the publish step.
    InFlight,
    /// The boost was published.
    Published(PublishResult),
    /// Every publish attempt failed; the record now carries this reason.
    Failed(String),
}

/// What a payment webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A one-off boost payment was processed.
    Boost(PaymentOutcome),
    /// A subscription was provisioned.
    SubscriptionStarted(SubscriptionAccount),
    /// A renewal reset the credit balance.
    SubscriptionRenewed(SubscriptionAccount),
    /// The event type is not handled, or referenced an unknown account.
    Ignored,
}

/// Inputs of a paid boost order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Payment-session id the confirmation will carry.
    pub transaction_id: BoostId,
    /// Customer to notify.
    pub email: Option<String>,
    /// What to publish.
    pub payload: BoostPayload,
}

/// Inputs of a balance-funded boost.
#[derive(Debug, Clone)]
pub struct RedeemRequest {
    /// Customer whose balance pays.
    pub email: String,
    /// Which balance pays.
    pub balance: BalanceType,
    /// What to publish.
    pub payload: BoostPayload,
}

/// Successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionReceipt {
    /// Locally generated record id.
    pub boost_id: BoostId,
    /// Public URL of the new post.
    pub post_url: String,
    /// Balance left after the debit.
    pub remaining_balance: i64,
}

/// Result of recording an engagement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementReceipt {
    /// `false` when the engagement had already been recorded.
    pub credited: bool,
    /// Points the action is worth.
    pub points: i64,
    /// Point balance after the call.
    pub point_balance: i64,
}

/// Orchestrates boost publishing and balance bookkeeping.
#[derive(Debug)]
pub struct BoostService {
    records: Arc<dyn RecordStore>,
    ledger: Arc<dyn BalanceLedger>,
    publisher: Publisher,
    rewards: RewardConfig,
}

/// Owned handles the detached publish task runs on.
#[derive(Debug, Clone)]
struct Publisher {
    records: Arc<dyn RecordStore>,
    poster: Arc<SocialPoster>,
    dispatcher: Dispatcher,
    policy: PublishPolicy,
}

impl BoostService {
    /// Creates the orchestrator.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn BalanceLedger>,
        poster: Arc<SocialPoster>,
        dispatcher: Dispatcher,
        policy: PublishPolicy,
        rewards: RewardConfig,
    ) -> Self {
        let publisher = Publisher {
            records: Arc::clone(&records),
            poster,
            dispatcher,
            policy,
        };
        Self {
            records,
            ledger,
            publisher,
            rewards,
        }
    }

    /// Reward economics in effect.
    #[must_use]
    pub const fn rewards(&self) -> &RewardConfig {
        &self.rewards
    }

    /// Creates the `Pending` record a later payment confirmation resolves.
    ///
    /// Idempotent: an existing record with the same id is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an incomplete payload or
    /// malformed email, or a persistence error.
    pub async fn place_order(&self, order: OrderRequest) -> Result<BoostRecord, GatewayError> {
        if order.transaction_id.as_str().trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "transaction_id is required".to_string(),
            ));
        }
        order.payload.validate()?;
        let email = order.email.as_deref().map(normalize_email).transpose()?;

        let record = BoostRecord::new(order.transaction_id, BoostOrigin::Paid, email, order.payload);
        let stored = self.records.create(record).await?;
        tracing::info!(boost_id = %stored.id, status = %stored.status, "boost order placed");
        Ok(stored)
    }

    /// Payment-confirmed entry point.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the store is unreachable. Publishing
    /// failures are recorded on the record, not returned.
    pub async fn handle_payment_confirmed(
        &self,
        id: &BoostId,
    ) -> Result<PaymentOutcome, GatewayError> {
        let Some(record) = self.records.get(id).await? else {
            tracing::warn!(boost_id = %id, "payment confirmed for unknown boost, ignoring");
            return Ok(PaymentOutcome::Missing);
        };
        if record.is_terminal() {
            tracing::info!(boost_id = %id, status = %record.status, "duplicate payment confirmation ignored");
            return Ok(PaymentOutcome::AlreadyTerminal(record.status));
        }
        if !self.records.claim(id).await? {
            tracing::info!(boost_id = %id, "boost already being published by another delivery");
            return Ok(PaymentOutcome::InFlight);
        }

        Ok(match self.publish(record).await? {
            Ok(result) => PaymentOutcome::Published(result),
            Err(err) => PaymentOutcome::Failed(err.to_string()),
        })
    }

    /// Routes a verified payment webhook event.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the store is unreachable.
    pub async fn handle_payment_event(
        &self,
        event: PaymentEvent,
    ) -> Result<EventOutcome, GatewayError> {
        match event {
            PaymentEvent::BoostPaid {
                event_id,
                transaction_id,
            } => {
                tracing::debug!(%event_id, boost_id = %transaction_id, "boost payment event");
                Ok(EventOutcome::Boost(
                    self.handle_payment_confirmed(&transaction_id).await?,
                ))
            }
            PaymentEvent::SubscriptionStarted {
                email,
                plan,
                subscription_ref,
                ..
            } => {
                let account = self
                    .provision_subscription(&email, plan, subscription_ref.as_deref())
                    .await?;
                Ok(EventOutcome::SubscriptionStarted(account))
            }
            PaymentEvent::SubscriptionRenewed { event_id, email } => {
                match self.renew_subscription(&email).await {
                    Ok(account) => Ok(EventOutcome::SubscriptionRenewed(account)),
                    Err(GatewayError::AccountNotFound(_)) => {
                        tracing::warn!(%event_id, %email, "renewal for unknown subscription, ignoring");
                        Ok(EventOutcome::Ignored)
                    }
                    Err(err) => Err(err),
                }
            }
            PaymentEvent::Ignored {
                event_id,
                event_type,
            } => {
                tracing::debug!(%event_id, %event_type, "unhandled payment event acknowledged");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Credit-redemption entry point.
    ///
    /// Debits before anything else is written; an insufficient balance
    /// leaves no record behind. A debit is kept even if publishing fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for bad input,
    /// [`GatewayError::InsufficientBalance`] when the balance cannot cover
    /// the cost, [`GatewayError::PublishFailed`] when every account failed,
    /// or a persistence error.
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedemptionReceipt, GatewayError> {
        request.payload.validate()?;
        let email = normalize_email(&request.email)?;
        let (cost, origin) = match request.balance {
            BalanceType::Credits => (1, BoostOrigin::Subscription),
            BalanceType::Points => (self.rewards.points_per_boost, BoostOrigin::Reward),
        };

        let Some(remaining_balance) = self.ledger.debit(request.balance, &email, cost).await?
        else {
            tracing::info!(%email, balance = ?request.balance, cost, "redemption rejected, insufficient balance");
            return Err(GatewayError::InsufficientBalance);
        };
        tracing::info!(%email, balance = ?request.balance, cost, remaining_balance, "balance debited");

        let record = BoostRecord::new(BoostId::generate(), origin, Some(email), request.payload);
        let record = self.records.create(record).await?;
        let boost_id = record.id.clone();
        let result = self.publish(record).await??;

        Ok(RedemptionReceipt {
            boost_id,
            post_url: result.post_url,
            remaining_balance,
        })
    }

    /// Publishes a boost on the service's own behalf.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an incomplete payload,
    /// [`GatewayError::PublishFailed`] when every account failed, or a
    /// persistence error.
    pub async fn publish_internal(
        &self,
        payload: BoostPayload,
    ) -> Result<BoostRecord, GatewayError> {
        payload.validate()?;
        let record = BoostRecord::new(BoostId::generate(), BoostOrigin::Internal, None, payload);
        let record = self.records.create(record).await?;
        let id = record.id.clone();
        self.publish(record).await??;
        self.status(&id).await
    }

    /// Status-poll projection of a record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BoostNotFound`] for an unknown id.
    pub async fn status(&self, id: &BoostId) -> Result<BoostRecord, GatewayError> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::BoostNotFound(id.to_string()))
    }

    /// Runs the publish step on its own task. Dropping the caller stops the
    /// wait; the task still writes a terminal state.
    async fn publish(
        &self,
        record: BoostRecord,
    ) -> Result<Result<PublishResult, PostError>, GatewayError> {
        let publisher = self.publisher.clone();
        let boost_id = record.id.clone();
        tokio::spawn(async move { publisher.publish(record).await })
            .await
            .map_err(|err| {
                tracing::error!(%boost_id, error = %err, "publish task aborted");
                GatewayError::Internal(format!("publish task for {boost_id} aborted"))
            })
    }

    /// Creates or replaces a subscription at its plan allotment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed email, or a
    /// persistence error.
    pub async fn provision_subscription(
        &self,
        email: &str,
        plan: PlanTier,
        subscription_ref: Option<&str>,
    ) -> Result<SubscriptionAccount, GatewayError> {
        let email = normalize_email(email)?;
        let account = self
            .ledger
            .provision_subscription(&email, plan, subscription_ref)
            .await?;
        tracing::info!(%email, %plan, credits = account.credit_balance, "subscription provisioned");
        Ok(account)
    }

    /// Resets credits at the start of a new billing cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] if the customer has no
    /// subscription.
    pub async fn renew_subscription(
        &self,
        email: &str,
    ) -> Result<SubscriptionAccount, GatewayError> {
        let email = normalize_email(email)?;
        let account = self.ledger.reset_credits(&email).await?;
        tracing::info!(%email, plan = %account.plan, credits = account.credit_balance, "subscription renewed");
        Ok(account)
    }

    /// Manually increases a balance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a non-positive amount or
    /// [`GatewayError::AccountNotFound`] when crediting a missing
    /// subscription.
    pub async fn grant(
        &self,
        email: &str,
        balance: BalanceType,
        amount: i64,
    ) -> Result<i64, GatewayError> {
        let email = normalize_email(email)?;
        let new_balance = self.ledger.grant(balance, &email, amount).await?;
        tracing::info!(%email, ?balance, amount, new_balance, "balance granted");
        Ok(new_balance)
    }

    /// Credits points for an engagement, once per `(email, post, action)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed email or
    /// blank post id, or a persistence error.
    pub async fn record_engagement(
        &self,
        email: &str,
        post_id: &str,
        action: EngagementAction,
    ) -> Result<EngagementReceipt, GatewayError> {
        let email = normalize_email(email)?;
        let post_id = post_id.trim();
        if post_id.is_empty() {
            return Err(GatewayError::InvalidRequest("post_id is required".to_string()));
        }
        let points = self.rewards.points_for(action);
        let event = EngagementEvent {
            email: email.clone(),
            post_id: post_id.to_string(),
            action,
            points,
            recorded_at: Utc::now(),
        };
        let credited = self.ledger.record_engagement(&event).await?;
        if credited {
            tracing::info!(%email, %post_id, %action, points, "engagement credited");
        } else {
            tracing::debug!(%email, %post_id, %action, "engagement already recorded");
        }

        let point_balance = self
            .ledger
            .balances(&email)
            .await?
            .rewards
            .map_or(0, |r| r.point_balance);
        Ok(EngagementReceipt {
            credited,
            points,
            point_balance,
        })
    }

    /// Links a social handle to the customer's reward ledger.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed email or
    /// blank handle.
    pub async fn link_social_identity(
        &self,
        email: &str,
        handle: &str,
    ) -> Result<RewardLedger, GatewayError> {
        let email = normalize_email(email)?;
        let handle = handle.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(GatewayError::InvalidRequest("handle is required".to_string()));
        }
        let ledger = self.ledger.link_social_identity(&email, handle).await?;
        tracing::info!(%email, %handle, "social identity linked");
        Ok(ledger)
    }

    /// Both balances of a customer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] if the customer has neither
    /// a subscription nor a reward ledger.
    pub async fn balances(&self, email: &str) -> Result<Balances, GatewayError> {
        let email = normalize_email(email)?;
        let balances = self.ledger.balances(&email).await?;
        if balances.subscription.is_none() && balances.rewards.is_none() {
            return Err(StoreError::NotFound(email).into());
        }
        Ok(balances)
    }

    /// Record counts by origin and status since `since`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the store is unreachable.
    pub async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<BoostStat>, GatewayError> {
        Ok(self.records.stats(since).await?)
    }

    /// Advisory health of every posting account.
    pub async fn account_health(&self) -> Vec<(AccountId, AccountHealth)> {
        self.publisher.poster.health().await
    }
}

impl Publisher {
    /// Render, post, record the terminal state, dispatch side effects.
    async fn publish(self, mut record: BoostRecord) -> Result<PublishResult, PostError> {
        let text = placeholder::render(&record.payload);
        let options = PostOptions {
            retries: self.policy.retries,
            retry_delay: self.policy.retry_delay,
            fallback_accounts: self
                .poster
                .accounts()
                .fallbacks_for(&self.policy.primary_account),
        };

        let outcome = match self
            .poster
            .post(&text, &self.policy.primary_account, &options)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = err.to_string();
                match self.records.update_to_failed(&record.id, &reason).await {
                    Ok(true) => tracing::warn!(boost_id = %record.id, error = %reason, "boost failed"),
                    Ok(false) => tracing::warn!(boost_id = %record.id, "boost no longer pending, failure not recorded"),
                    Err(store_err) => tracing::error!(boost_id = %record.id, error = %store_err,
                        "could not record boost failure, record stays pending"),
                }
                return Err(err);
            }
        };

        let result = PublishResult {
            post_id: outcome.post_id.clone(),
            post_url: outcome.post_url.clone(),
            published_at: Utc::now(),
            account_id: outcome.account_id.to_string(),
        };
        match self.records.update_to_published(&record.id, &result).await {
            Ok(true) => {
                tracing::info!(boost_id = %record.id, account = %outcome.account_id,
                    post_url = %outcome.post_url, "boost published");
            }
            Ok(false) => {
                tracing::warn!(boost_id = %record.id, post_id = %outcome.post_id,
                    "boost no longer pending, publish result not recorded");
            }
            Err(err) => {
                tracing::error!(boost_id = %record.id, post_id = %outcome.post_id, error = %err,
                    "post is live but the record stays pending");
            }
        }

        if self.policy.amplify {
            self.dispatcher.dispatch(BackgroundTask::Amplify {
                boost_id: record.id.clone(),
                post_id: outcome.post_id,
                account: outcome.account_id,
            });
        }
        record.status = BoostStatus::Published;
        record.result = Some(result.clone());
        record.updated_at = result.published_at;
        self.dispatcher.dispatch(BackgroundTask::Notify {
            record: Box::new(record),
        });

        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::boost_record::fixtures;
    use crate::persistence::MemoryStore;
    use crate::social::accounts::fixtures::credentials;
    use crate::social::client::fake::FakeSocialClient;
    use crate::social::{AccountRegistry, ProviderError, SocialClient};

    const EMAIL: &str = "ada@example.com";
    const RENDERED: &str = "Check out https://b.example/post and https://p.example";

    struct Harness {
        service: BoostService,
        store: Arc<MemoryStore>,
        client: Arc<FakeSocialClient>,
        tasks: mpsc::Receiver<BackgroundTask>,
    }

    fn harness() -> Harness {
        harness_with_delay(Duration::ZERO)
    }

    fn harness_with_delay(retry_delay: Duration) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(FakeSocialClient::new());
        let registry = AccountRegistry::new(vec![credentials("main"), credentials("alt")]);
        let poster = SocialPoster::new(
            Arc::clone(&client) as Arc<dyn SocialClient>,
            Arc::new(registry),
        );
        let (dispatcher, tasks) = Dispatcher::channel(16);
        let policy = PublishPolicy {
            primary_account: AccountId::from("main"),
            retries: 2,
            retry_delay,
            amplify: true,
        };
        let service = BoostService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&store) as Arc<dyn BalanceLedger>,
            Arc::new(poster),
            dispatcher,
            policy,
            RewardConfig::default(),
        );
        Harness {
            service,
            store,
            client,
            tasks,
        }
    }

    fn order(id: &str) -> OrderRequest {
        OrderRequest {
            transaction_id: BoostId::from(id),
            email: Some("Ada@Example.com".to_string()),
            payload: fixtures::payload(),
        }
    }

    fn redeem(balance: BalanceType) -> RedeemRequest {
        RedeemRequest {
            email: EMAIL.to_string(),
            balance,
            payload: fixtures::payload(),
        }
    }

    async fn fail_everywhere(client: &FakeSocialClient) {
        client
            .fail_always("main", ProviderError::http(401, None, "Unauthorized"))
            .await;
        client
            .fail_always("alt", ProviderError::http(403, Some(64), "Your account is suspended"))
            .await;
    }

    /// Polls until at least one record exists and none is pending.
    async fn settled_stats(service: &BoostService) -> Vec<BoostStat> {
        for _ in 0..100 {
            let Ok(stats) = service.stats(Utc::now() - chrono::Duration::hours(1)).await else {
                panic!("stats failed");
            };
            if !stats.is_empty() && stats.iter().all(|s| s.status != BoostStatus::Pending) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("boost never reached a terminal state");
    }

    async fn slow_first_attempt(client: &FakeSocialClient) {
        client
            .script("main", vec![Err(ProviderError::http(503, None, "Service Unavailable"))])
            .await;
    }

    #[tokio::test]
    async fn abandoned_redemption_still_publishes() {
        let h = harness_with_delay(Duration::from_millis(200));
        slow_first_attempt(&h.client).await;
        let _ = h.store.grant(BalanceType::Points, EMAIL, 30).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            h.service.redeem(redeem(BalanceType::Points)),
        )
        .await;
        assert!(abandoned.is_err());

        assert_eq!(
            settled_stats(&h.service).await,
            vec![BoostStat {
                origin: BoostOrigin::Reward,
                status: BoostStatus::Published,
                count: 1,
            }]
        );
        let Ok(balances) = h.service.balances(EMAIL).await else {
            panic!("balances missing");
        };
        assert_eq!(balances.rewards.map(|r| r.point_balance), Some(5));
    }

    #[tokio::test]
    async fn abandoned_confirmation_does_not_strand_the_claim() {
        let h = harness_with_delay(Duration::from_millis(200));
        slow_first_attempt(&h.client).await;
        let _ = h.service.place_order(order("tx_1")).await;
        let id = BoostId::from("tx_1");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), h.service.handle_payment_confirmed(&id))
                .await;
        assert!(abandoned.is_err());

        let _ = settled_stats(&h.service).await;
        let redelivery = h.service.handle_payment_confirmed(&id).await;
        assert!(matches!(
            redelivery,
            Ok(PaymentOutcome::AlreadyTerminal(BoostStatus::Published))
        ));
        assert_eq!(h.client.publish_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn payment_confirmation_publishes_rendered_text() {
        let mut h = harness();
        let _ = h.service.place_order(order("tx_1")).await;

        let outcome = h.service.handle_payment_confirmed(&BoostId::from("tx_1")).await;
        let Ok(PaymentOutcome::Published(result)) = outcome else {
            panic!("expected publish, got {outcome:?}");
        };
        assert_eq!(result.post_url, "https://x.com/main/status/1001");
        assert_eq!(
            h.client.publish_calls().await,
            vec![("main".to_string(), RENDERED.to_string())]
        );

        let Ok(record) = h.service.status(&BoostId::from("tx_1")).await else {
            panic!("record missing");
        };
        assert_eq!(record.status, BoostStatus::Published);
        assert_eq!(record.post_url(), Some("https://x.com/main/status/1001"));
        assert_eq!(record.customer_email.as_deref(), Some(EMAIL));
        assert_eq!(record.payload.text, fixtures::payload().text);

        assert!(matches!(
            h.tasks.try_recv(),
            Ok(BackgroundTask::Amplify { post_id, .. }) if post_id == "1001"
        ));
        let Ok(BackgroundTask::Notify { record }) = h.tasks.try_recv() else {
            panic!("expected notify task");
        };
        assert_eq!(record.status, BoostStatus::Published);
    }

    #[tokio::test]
    async fn duplicate_confirmation_posts_once() {
        let h = harness();
        let _ = h.service.place_order(order("tx_1")).await;
        let id = BoostId::from("tx_1");

        let _ = h.service.handle_payment_confirmed(&id).await;
        let Ok(first) = h.service.status(&id).await else {
            panic!("record missing");
        };
        let second = h.service.handle_payment_confirmed(&id).await;

        assert!(matches!(
            second,
            Ok(PaymentOutcome::AlreadyTerminal(BoostStatus::Published))
        ));
        assert_eq!(h.client.publish_calls().await.len(), 1);
        let Ok(after) = h.service.status(&id).await else {
            panic!("record missing");
        };
        assert_eq!(after.result, first.result);
    }

    #[tokio::test]
    async fn failed_boost_is_terminal() {
        let h = harness();
        fail_everywhere(&h.client).await;
        let _ = h.service.place_order(order("tx_1")).await;
        let id = BoostId::from("tx_1");

        let Ok(PaymentOutcome::Failed(reason)) = h.service.handle_payment_confirmed(&id).await
        else {
            panic!("expected failure");
        };
        assert!(reason.contains("alt"));
        let Ok(record) = h.service.status(&id).await else {
            panic!("record missing");
        };
        assert_eq!(record.status, BoostStatus::Failed);
        assert_eq!(record.error.as_deref(), Some(reason.as_str()));

        let calls = h.client.publish_calls().await.len();
        let again = h.service.handle_payment_confirmed(&id).await;
        assert!(matches!(
            again,
            Ok(PaymentOutcome::AlreadyTerminal(BoostStatus::Failed))
        ));
        assert_eq!(h.client.publish_calls().await.len(), calls);
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_warning_not_an_error() {
        let h = harness();
        let outcome = h.service.handle_payment_confirmed(&BoostId::from("tx_404")).await;
        assert!(matches!(outcome, Ok(PaymentOutcome::Missing)));
        assert!(h.client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn claimed_record_is_left_to_its_owner() {
        let h = harness();
        let _ = h.service.place_order(order("tx_1")).await;
        let id = BoostId::from("tx_1");
        assert!(matches!(h.store.claim(&id).await, Ok(true)));

        let outcome = h.service.handle_payment_confirmed(&id).await;
        assert!(matches!(outcome, Ok(PaymentOutcome::InFlight)));
        assert!(h.client.publish_calls().await.is_empty());
    }

    #[tokio::test]
    async fn order_placement_is_idempotent() {
        let h = harness();
        let _ = h.service.place_order(order("tx_1")).await;
        let mut changed = order("tx_1");
        changed.payload.text = "something else".to_string();
        let Ok(record) = h.service.place_order(changed).await else {
            panic!("second placement failed");
        };
        assert_eq!(record.payload.text, fixtures::payload().text);
        assert_eq!(h.store.boost_count().await, 1);
    }

    #[tokio::test]
    async fn redemption_with_insufficient_points_has_no_side_effects() {
        let h = harness();
        let _ = h.store.grant(BalanceType::Points, EMAIL, 10).await;

        let result = h.service.redeem(redeem(BalanceType::Points)).await;
        assert!(matches!(result, Err(GatewayError::InsufficientBalance)));
        assert_eq!(h.store.boost_count().await, 0);
        assert!(h.client.calls().await.is_empty());

        let Ok(balances) = h.service.balances(EMAIL).await else {
            panic!("balances missing");
        };
        assert_eq!(balances.rewards.map(|r| r.point_balance), Some(10));
    }

    #[tokio::test]
    async fn credit_redemption_publishes_and_reports_remaining() {
        let h = harness();
        let _ = h
            .service
            .provision_subscription(EMAIL, PlanTier::Starter, Some("sub_1"))
            .await;

        let Ok(receipt) = h.service.redeem(redeem(BalanceType::Credits)).await else {
            panic!("redemption failed");
        };
        assert_eq!(receipt.remaining_balance, PlanTier::Starter.allotment() - 1);
        assert_eq!(receipt.post_url, "https://x.com/main/status/1001");
        assert!(receipt.boost_id.is_local());

        let Ok(record) = h.service.status(&receipt.boost_id).await else {
            panic!("record missing");
        };
        assert_eq!(record.origin, BoostOrigin::Subscription);
        assert_eq!(record.status, BoostStatus::Published);
    }

    #[tokio::test]
    async fn failed_redemption_keeps_the_debit() {
        let h = harness();
        fail_everywhere(&h.client).await;
        let _ = h.store.grant(BalanceType::Points, EMAIL, 30).await;

        let result = h.service.redeem(redeem(BalanceType::Points)).await;
        assert!(matches!(result, Err(GatewayError::PublishFailed(_))));
        assert_eq!(h.store.boost_count().await, 1);

        let Ok(balances) = h.service.balances(EMAIL).await else {
            panic!("balances missing");
        };
        assert_eq!(balances.rewards.map(|r| r.point_balance), Some(5));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_debit() {
        let h = harness();
        let _ = h.store.grant(BalanceType::Points, EMAIL, 30).await;
        let mut request = redeem(BalanceType::Points);
        request.payload.content.url.clear();

        let result = h.service.redeem(request).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        let Ok(balances) = h.service.balances(EMAIL).await else {
            panic!("balances missing");
        };
        assert_eq!(balances.rewards.map(|r| r.point_balance), Some(30));
    }

    #[tokio::test]
    async fn subscription_events_provision_then_reset() {
        let h = harness();
        let started = h
            .service
            .handle_payment_event(PaymentEvent::SubscriptionStarted {
                event_id: "evt_1".to_string(),
                email: "ADA@example.com".to_string(),
                plan: PlanTier::Growth,
                subscription_ref: Some("sub_1".to_string()),
            })
            .await;
        assert!(matches!(started, Ok(EventOutcome::SubscriptionStarted(_))));

        let _ = h.service.redeem(redeem(BalanceType::Credits)).await;
        let renewed = h
            .service
            .handle_payment_event(PaymentEvent::SubscriptionRenewed {
                event_id: "evt_2".to_string(),
                email: EMAIL.to_string(),
            })
            .await;
        let Ok(EventOutcome::SubscriptionRenewed(account)) = renewed else {
            panic!("expected renewal");
        };
        assert_eq!(account.credit_balance, PlanTier::Growth.allotment());
    }

    #[tokio::test]
    async fn renewal_for_unknown_customer_is_ignored() {
        let h = harness();
        let outcome = h
            .service
            .handle_payment_event(PaymentEvent::SubscriptionRenewed {
                event_id: "evt_9".to_string(),
                email: EMAIL.to_string(),
            })
            .await;
        assert!(matches!(outcome, Ok(EventOutcome::Ignored)));
    }

    #[tokio::test]
    async fn engagement_is_credited_once() {
        let h = harness();
        let first = h.service.record_engagement(EMAIL, "1800", EngagementAction::Retweet).await;
        let second = h.service.record_engagement(EMAIL, "1800", EngagementAction::Retweet).await;

        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("engagement failed");
        };
        assert!(first.credited);
        assert!(!second.credited);
        assert_eq!(second.point_balance, RewardConfig::default().points_retweet);
    }

    #[tokio::test]
    async fn linking_strips_the_at_sign() {
        let h = harness();
        let Ok(ledger) = h.service.link_social_identity(EMAIL, " @ada_dev ").await else {
            panic!("link failed");
        };
        assert_eq!(ledger.social_identity.as_deref(), Some("ada_dev"));
        assert!(h.service.link_social_identity(EMAIL, "@").await.is_err());
    }

    #[tokio::test]
    async fn balances_for_stranger_is_not_found() {
        let h = harness();
        let result = h.service.balances("nobody@example.com").await;
        assert!(matches!(result, Err(GatewayError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn internal_boost_is_published_synchronously() {
        let h = harness();
        let Ok(record) = h.service.publish_internal(fixtures::payload()).await else {
            panic!("internal boost failed");
        };
        assert_eq!(record.origin, BoostOrigin::Internal);
        assert_eq!(record.status, BoostStatus::Published);

        let Ok(stats) = h.service.stats(Utc::now() - chrono::Duration::hours(1)).await else {
            panic!("stats failed");
        };
        assert_eq!(
            stats,
            vec![BoostStat {
                origin: BoostOrigin::Internal,
                status: BoostStatus::Published,
                count: 1,
            }]
        );
    }
}
