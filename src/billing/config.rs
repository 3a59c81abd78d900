//! Subscription sync configuration.

use std::time::Duration;

/// Default minimum gap between two fetches of a settled subscription.
pub const DEFAULT_MIN_REFETCH_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of consecutive rejections before an error is persistent.
pub const DEFAULT_REJECTION_THRESHOLD: u32 = 3;

/// Tuning for [`SubscriptionSync`](super::SubscriptionSync).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// A `sync()` issued sooner than this after a successful fetch returns the
    /// current state without fetching. Does not apply while in `Error`.
    /// Default: 1s
    pub min_refetch_interval: Duration,

    /// Consecutive `ProviderRejected` failures after which the error is
    /// flagged persistent.
    /// Default: 3
    pub rejection_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_refetch_interval: DEFAULT_MIN_REFETCH_INTERVAL,
            rejection_threshold: DEFAULT_REJECTION_THRESHOLD,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_min_refetch_interval(mut self, interval: Duration) -> Self {
        self.min_refetch_interval = interval;
        self
    }

    /// Values below 1 are treated as 1.
    #[must_use]
    pub fn with_rejection_threshold(mut self, threshold: u32) -> Self {
        self.rejection_threshold = threshold.max(1);
        self
    }
}
