//! Error types for the cart and subscription engine.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by cart operations.
///
/// All of these are raised before the cart is touched, so a failed call
/// leaves the items exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Invalid quantity: {0} (must be at least 1)")]
    InvalidQuantity(i64),

    #[error("Index {index} out of range (cart has {len} lines)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Amount overflow for item {0}")]
    AmountOverflow(String),
}

/// Result type for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;

/// Failure reported by a [`BillingProvider`](crate::billing::BillingProvider).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport-level failure: DNS, connect, timeout, reset.
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// Provider answered with a non-success status.
    #[error("Provider rejected request (status {status:?}): {message}")]
    Rejected { status: Option<u16>, message: String },

    /// Provider answered but the body failed validation.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Malformed(e.to_string())
    }
}

/// Category of a subscription sync failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncErrorKind {
    /// Network failure. Retry on the next sync.
    ProviderUnreachable,
    /// Non-success or malformed response.
    ProviderRejected,
    /// The subscription id can never be fetched.
    InvalidSubscriptionId,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncErrorKind::ProviderUnreachable => "ProviderUnreachable",
            SyncErrorKind::ProviderRejected => "ProviderRejected",
            SyncErrorKind::InvalidSubscriptionId => "InvalidSubscriptionId",
        };
        f.write_str(s)
    }
}

impl From<&ProviderError> for SyncErrorKind {
    fn from(e: &ProviderError) -> Self {
        match e {
            ProviderError::Unreachable(_) => SyncErrorKind::ProviderUnreachable,
            ProviderError::Rejected { .. } | ProviderError::Malformed(_) => {
                SyncErrorKind::ProviderRejected
            }
        }
    }
}

/// Error descriptor recorded in subscription state.
///
/// This is data, not a thrown error: `sync()` never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,

    pub message: String,

    pub occurred_at: Timestamp,

    /// Consecutive failures of this kind, including this one.
    pub consecutive_failures: u32,

    /// Whether the UI should show this as a lasting problem rather than
    /// waiting for the next sync.
    pub persistent: bool,
}

impl SyncError {
    /// Whether a later sync may succeed without outside intervention.
    pub fn is_transient(&self) -> bool {
        !self.persistent
    }

    pub(crate) fn invalid_subscription_id(reason: String, at: Timestamp) -> Self {
        Self {
            kind: SyncErrorKind::InvalidSubscriptionId,
            message: reason,
            occurred_at: at,
            consecutive_failures: 1,
            persistent: true,
        }
    }

    pub(crate) fn from_provider(
        error: &ProviderError,
        consecutive_failures: u32,
        rejection_threshold: u32,
        at: Timestamp,
    ) -> Self {
        let kind = SyncErrorKind::from(error);
        let persistent =
            kind == SyncErrorKind::ProviderRejected && consecutive_failures >= rejection_threshold;

        Self {
            kind,
            message: error.to_string(),
            occurred_at: at,
            consecutive_failures,
            persistent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_kinds() {
        let unreachable = ProviderError::Unreachable("connection reset".to_string());
        let rejected = ProviderError::Rejected {
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        let malformed = ProviderError::Malformed("missing status".to_string());

        assert_eq!(SyncErrorKind::from(&unreachable), SyncErrorKind::ProviderUnreachable);
        assert_eq!(SyncErrorKind::from(&rejected), SyncErrorKind::ProviderRejected);
        assert_eq!(SyncErrorKind::from(&malformed), SyncErrorKind::ProviderRejected);
    }

    #[test]
    fn test_rejection_becomes_persistent_at_threshold() {
        let rejected = ProviderError::Rejected {
            status: Some(500),
            message: "oops".to_string(),
        };

        let second = SyncError::from_provider(&rejected, 2, 3, Timestamp(0));
        assert!(second.is_transient());

        let third = SyncError::from_provider(&rejected, 3, 3, Timestamp(0));
        assert!(third.persistent);
    }

    #[test]
    fn test_unreachable_never_persistent() {
        let unreachable = ProviderError::Unreachable("timeout".to_string());
        let error = SyncError::from_provider(&unreachable, 10, 3, Timestamp(0));
        assert!(error.is_transient());
    }

    #[test]
    fn test_cart_error_messages() {
        let err = CartError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "Index 4 out of range (cart has 2 lines)");
    }
}
