//! Scheduled refetching.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::sync::SyncInner;

/// Shortest polling interval accepted.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Background task that calls `sync()` on a fixed interval.
///
/// The task stops when the handle is stopped or dropped, or when the
/// subscription sync it belongs to is disposed.
#[must_use = "dropping the handle stops polling"]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub(super) fn spawn(inner: Arc<SyncInner>, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if inner.is_disposed() {
                    tracing::debug!("polling stopped, subscription sync disposed");
                    break;
                }
                inner.start(false).await;
            }
        });

        Self { task }
    }

    /// Stop polling. An in-flight fetch is abandoned by this task but still
    /// completes for any other caller waiting on it.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the polling task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
