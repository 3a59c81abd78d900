//! Billing provider contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{BillingPeriod, SubscriptionStatus, Timestamp};

/// Subscription status as reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Active,
    Expired,
    #[serde(alias = "cancelled")]
    Canceled,
}

impl From<RemoteStatus> for SubscriptionStatus {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Active => SubscriptionStatus::Active,
            RemoteStatus::Expired => SubscriptionStatus::Expired,
            RemoteStatus::Canceled => SubscriptionStatus::Canceled,
        }
    }
}

/// A successful status lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: RemoteStatus,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
}

impl StatusPayload {
    pub fn new(status: RemoteStatus, period_start: Timestamp, period_end: Timestamp) -> Self {
        Self {
            status,
            period_start,
            period_end,
        }
    }

    /// Parse and validate a raw provider body.
    ///
    /// Unknown statuses, missing fields and inverted periods are all
    /// reported as [`ProviderError::Malformed`].
    pub fn from_json(body: &[u8]) -> Result<Self, ProviderError> {
        let payload: StatusPayload = serde_json::from_slice(body)?;
        payload.validate()?;
        Ok(payload)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.period_end < self.period_start {
            return Err(ProviderError::Malformed(format!(
                "period ends ({}) before it starts ({})",
                self.period_end, self.period_start
            )));
        }
        Ok(())
    }

    pub fn period(&self) -> BillingPeriod {
        BillingPeriod {
            start: self.period_start,
            end: self.period_end,
        }
    }
}

/// Source of truth for subscription status.
///
/// Implementations own transport, authentication and timeouts. A failed call
/// is reported through [`ProviderError`] and never panics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Look up the current status of `subscription_id`.
    async fn fetch_status(&self, subscription_id: &str) -> Result<StatusPayload, ProviderError>;
}
