//! Subscription status synchronisation.
//!
//! [`SubscriptionSync`] tracks one subscription through a small state machine:
//!
//! ```text
//! Unknown ──sync──▶ Loading ──ok──▶ Active | Expired | Canceled
//!                      │                        │
//!                      └──err──▶ Error ◀────────┘ (next sync goes via Loading)
//! ```
//!
//! The remote side is reached only through the [`BillingProvider`] trait.
//!
//! # Example
//!
//! ```ignore
//! let sync = SubscriptionSync::new("sub_123", Arc::new(StripeStatusProvider::new(key)));
//!
//! let handle = sync.subscribe(|state| render_banner(state));
//! let state = sync.sync().await;
//! if state.is_entitled() {
//!     unlock_features();
//! }
//! ```

mod config;
mod poll;
mod provider;
mod sync;

pub use config::{SyncConfig, DEFAULT_MIN_REFETCH_INTERVAL, DEFAULT_REJECTION_THRESHOLD};
pub use poll::PollHandle;
pub use provider::{BillingProvider, RemoteStatus, StatusPayload};
pub use sync::{SubscriptionSync, SubscriptionSyncBuilder};
