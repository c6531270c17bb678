//! Background dispatcher for fire-and-forget side effects.
//!
//! Amplification and customer notification run after the request that
//! triggered them has already answered. [`Dispatcher`] hands them to a
//! worker over a bounded [`tokio::sync::mpsc`] queue; the worker runs each
//! task on a [`JoinSet`] so a slow amplification never delays a
//! notification. Outcomes are only logged, under the
//! `boost_gateway::background` target.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use super::notifier::Notifier;
use crate::domain::{BoostId, BoostRecord};
use crate::social::{AccountId, EngagementAmplifier};

const LOG_TARGET: &str = "boost_gateway::background";

/// Work handed off the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundTask {
    /// Drive secondary accounts to engage with a new post.
    Amplify {
        /// Boost the post belongs to.
        boost_id: BoostId,
        /// Platform post id.
        post_id: String,
        /// Account that published the post.
        account: AccountId,
    },
    /// Inform the customer about a published boost.
    Notify {
        /// The published record.
        record: Box<BoostRecord>,
    },
}

impl BackgroundTask {
    fn kind(&self) -> &'static str {
        match self {
            Self::Amplify { .. } => "amplify",
            Self::Notify { .. } => "notify",
        }
    }
}

/// Sending half of the background queue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<BackgroundTask>,
}

impl Dispatcher {
    /// Creates a dispatcher and the receiving end of its queue.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<BackgroundTask>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Creates a dispatcher with its worker already running.
    #[must_use]
    pub fn spawn(
        capacity: usize,
        amplifier: Option<Arc<EngagementAmplifier>>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, JoinHandle<()>) {
        let (dispatcher, receiver) = Self::channel(capacity);
        let worker = tokio::spawn(run_worker(receiver, amplifier, notifier));
        (dispatcher, worker)
    }

    /// Enqueues a task without waiting.
    ///
    /// Returns `false` and logs when the queue is full or the worker is
    /// gone; the task is dropped.
    pub fn dispatch(&self, task: BackgroundTask) -> bool {
        let kind = task.kind();
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(target: LOG_TARGET, kind, "background queue full, task dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(target: LOG_TARGET, kind, "background worker stopped, task dropped");
                false
            }
        }
    }
}

/// Worker loop: runs every received task concurrently and drains in-flight
/// tasks once all dispatchers are dropped.
pub async fn run_worker(
    mut receiver: mpsc::Receiver<BackgroundTask>,
    amplifier: Option<Arc<EngagementAmplifier>>,
    notifier: Arc<dyn Notifier>,
) {
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            task = receiver.recv() => {
                let Some(task) = task else { break };
                in_flight.spawn(execute(task, amplifier.as_ref().map(Arc::clone), Arc::clone(&notifier)));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    tracing::error!(target: LOG_TARGET, error = %err, "background task panicked");
                }
            }
        }
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            tracing::error!(target: LOG_TARGET, error = %err, "background task panicked");
        }
    }
    tracing::info!(target: LOG_TARGET, "background worker stopped");
}

async fn execute(
    task: BackgroundTask,
    amplifier: Option<Arc<EngagementAmplifier>>,
    notifier: Arc<dyn Notifier>,
) {
    match task {
        BackgroundTask::Amplify {
            boost_id,
            post_id,
            account,
        } => {
            let Some(amplifier) = amplifier else {
                return;
            };
            let summary = amplifier.amplify(&post_id, &account).await;
            tracing::info!(
                target: LOG_TARGET,
                %boost_id,
                %post_id,
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                "amplification complete"
            );
        }
        BackgroundTask::Notify { record } => match notifier.boost_completed(&record).await {
            Ok(()) => tracing::debug!(target: LOG_TARGET, boost_id = %record.id, "notification sent"),
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, boost_id = %record.id, error = %err, "notification failed");
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::BoostOrigin;
    use crate::domain::boost_record::fixtures;
    use crate::service::notifier::NotifyError;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<BoostId>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn boost_completed(&self, record: &BoostRecord) -> Result<(), NotifyError> {
            self.seen.lock().await.push(record.id.clone());
            Err(NotifyError::Delivery("mailbox full".to_string()))
        }
    }

    fn record() -> BoostRecord {
        BoostRecord::new(BoostId::from("tx_1"), BoostOrigin::Paid, None, fixtures::payload())
    }

    #[tokio::test]
    async fn worker_runs_tasks_and_swallows_failures() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, worker) =
            Dispatcher::spawn(8, None, Arc::clone(&notifier) as Arc<dyn Notifier>);

        assert!(dispatcher.dispatch(BackgroundTask::Notify {
            record: Box::new(record()),
        }));
        assert!(dispatcher.dispatch(BackgroundTask::Amplify {
            boost_id: BoostId::from("tx_1"),
            post_id: "1800".to_string(),
            account: AccountId::from("main"),
        }));

        drop(dispatcher);
        tokio_test::assert_ok!(worker.await);
        assert_eq!(notifier.seen.lock().await.as_slice(), &[BoostId::from("tx_1")]);
    }

    #[tokio::test]
    async fn full_queue_drops_task() {
        let (dispatcher, _receiver) = Dispatcher::channel(1);
        let task = BackgroundTask::Notify {
            record: Box::new(record()),
        };
        assert!(dispatcher.dispatch(task.clone()));
        assert!(!dispatcher.dispatch(task));
    }

    #[tokio::test]
    async fn closed_queue_drops_task() {
        let (dispatcher, receiver) = Dispatcher::channel(4);
        drop(receiver);
        assert!(!dispatcher.dispatch(BackgroundTask::Notify {
            record: Box::new(record()),
        }));
    }
}
