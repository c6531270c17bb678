//! Engagement amplifier: secondary accounts engage with a new post.
//!
//! Best-effort by construction: [`EngagementAmplifier::amplify`] cannot
//! fail. Every action's outcome lands in the returned summary.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::classify::{ErrorClass, classify};
use super::client::SocialClient;
use super::{AccountId, AccountRegistry};

/// One engagement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplifyAction {
    /// Like the post.
    Like,
    /// Retweet the post.
    Retweet,
    /// Reply to the post.
    Reply,
}

impl fmt::Display for AmplifyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Like => "like",
            Self::Retweet => "retweet",
            Self::Reply => "reply",
        })
    }
}

/// Result of one engagement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "error")]
pub enum ActionResult {
    /// The platform accepted the action.
    Done,
    /// The platform reported the action as already performed.
    AlreadyDone,
    /// The action failed; later actions still ran.
    Failed(String),
}

/// What one account did for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    /// Acting account.
    pub account: AccountId,
    /// Step performed.
    pub action: AmplifyAction,
    /// Outcome.
    pub result: ActionResult,
}

/// Summary of one amplification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AmplifySummary {
    /// Every attempted action, in execution order.
    pub actions: Vec<ActionOutcome>,
}

impl AmplifySummary {
    /// Actions that ended in success or were already done.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| !matches!(a.result, ActionResult::Failed(_)))
            .count()
    }

    /// Actions that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.actions.len() - self.succeeded()
    }
}

/// Drives every non-posting account to like, retweet and reply.
#[derive(Debug)]
pub struct EngagementAmplifier {
    client: Arc<dyn SocialClient>,
    accounts: Arc<AccountRegistry>,
    action_delay: Duration,
    reply_text: Option<String>,
}

impl EngagementAmplifier {
    /// Creates an amplifier.
    #[must_use]
    pub fn new(
        client: Arc<dyn SocialClient>,
        accounts: Arc<AccountRegistry>,
        action_delay: Duration,
        reply_text: Option<String>,
    ) -> Self {
        Self {
            client,
            accounts,
            action_delay,
            reply_text,
        }
    }

    /// Engages with `post_id` from every account other than
    /// `posting_account`, pausing `action_delay` between actions.
    pub async fn amplify(&self, post_id: &str, posting_account: &AccountId) -> AmplifySummary {
        let mut summary = AmplifySummary::default();
        let mut first = true;

        for account in self.accounts.others(posting_account) {
            let mut steps = vec![AmplifyAction::Like, AmplifyAction::Retweet];
            if self.reply_text.is_some() {
                steps.push(AmplifyAction::Reply);
            }

            for action in steps {
                if !first {
                    tokio::time::sleep(self.action_delay).await;
                }
                first = false;

                let outcome = match action {
                    AmplifyAction::Like => self.client.like(account, post_id).await,
                    AmplifyAction::Retweet => self.client.retweet(account, post_id).await,
                    AmplifyAction::Reply => {
                        let text = self.reply_text.as_deref().unwrap_or_default();
                        self.client
                            .publish(account, text, Some(post_id))
                            .await
                            .map(|_| ())
                    }
                };

                let result = match outcome {
                    Ok(()) => ActionResult::Done,
                    Err(err) if classify(&err) == ErrorClass::Duplicate => ActionResult::AlreadyDone,
                    Err(err) => {
                        tracing::warn!(account = %account.id, %action, %post_id, error = %err,
                            "amplification action failed");
                        ActionResult::Failed(err.to_string())
                    }
                };
                summary.actions.push(ActionOutcome {
                    account: account.id.clone(),
                    action,
                    result,
                });
            }
        }

        tracing::info!(
            %post_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "amplification finished"
        );
        summary
    }
}
