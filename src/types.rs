//! Core types for carts and subscription state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::SyncError;

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Timestamp(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        let delta = self.0.saturating_sub(earlier.0);
        Duration::from_millis(u64::try_from(delta).unwrap_or(0))
    }

    /// Shift forward by `duration`.
    pub fn plus(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Cart Types ---

/// A line in the cart. One line per item id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Purchasable entity id (unique per item type, not per line).
    pub id: String,

    /// Display label.
    pub name: String,

    /// Price per unit in the currency's smallest unit.
    pub unit_price: u64,

    /// Aggregated quantity, always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// `unit_price * quantity`, `None` on overflow.
    pub fn line_total(&self) -> Option<u64> {
        self.unit_price.checked_mul(u64::from(self.quantity))
    }
}

/// Input for adding an item (quantity not yet validated).
///
/// Quantities are signed so that raw form input, including zero and negative
/// values, can be handed over and rejected with a typed error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCartItem {
    pub id: String,
    pub name: String,
    pub unit_price: u64,
    pub quantity: i64,
}

impl NewCartItem {
    /// Create a new item input.
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_price: u64, quantity: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }
}

impl From<CartItem> for NewCartItem {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: i64::from(item.quantity),
        }
    }
}

/// Snapshot of a cart handed back to calling code after every operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    /// Lines in insertion order.
    pub items: Vec<CartItem>,

    /// Sum of all line totals.
    pub total_cost: u64,
}

// --- Subscription Types ---

/// Local view of a subscription's status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Unknown,
    Loading,
    Active,
    Expired,
    Canceled,
    Error,
}

impl SubscriptionStatus {
    /// True for statuses that came from a successful fetch.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Expired | SubscriptionStatus::Canceled
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Unknown => "UNKNOWN",
            SubscriptionStatus::Loading => "LOADING",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Expired => "EXPIRED",
            SubscriptionStatus::Canceled => "CANCELED",
            SubscriptionStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Billing period reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl BillingPeriod {
    /// Whether `at` falls inside the period (end exclusive).
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at < self.end
    }
}

/// Snapshot of a subscription's synchronisation state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Subscription this state belongs to. Never changes.
    pub subscription_id: String,

    pub status: SubscriptionStatus,

    /// Set only while `status` is `Error`.
    pub last_error: Option<SyncError>,

    /// When the last successful fetch completed.
    pub last_synced_at: Option<Timestamp>,

    /// Period reported by the last successful fetch.
    pub current_period: Option<BillingPeriod>,
}

impl SubscriptionState {
    /// Initial state for a subscription that has never been synced.
    pub fn unknown(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            status: SubscriptionStatus::Unknown,
            last_error: None,
            last_synced_at: None,
            current_period: None,
        }
    }

    /// True when the subscription is known to be active.
    pub fn is_entitled(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}
