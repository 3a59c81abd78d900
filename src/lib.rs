//! # Checkout State
//!
//! State management for a checkout session: a shopping cart and the
//! status of the customer's subscription. Neither component performs I/O;
//! network access is delegated to an injected billing provider.
//!
//! ## Core Concepts
//!
//! - **Cart**: Ordered line items, merged by item id, with validated quantities
//! - **Subscription sync**: Status state machine fed by a billing provider
//! - **Coalescing**: Overlapping `sync()` calls share one provider request
//! - **Listeners**: Callbacks or channels notified on every state change
//!
//! ## Example
//!
//! ```ignore
//! use checkout_state::{CartStore, NewCartItem, SubscriptionSync};
//!
//! let mut cart = CartStore::new();
//! cart.add_item(NewCartItem::new("sku1", "Widget", 500, 2))?;
//! cart.add_item(NewCartItem::new("sku1", "Widget", 500, 3))?;
//! assert_eq!(cart.total_cost(), 2500);
//!
//! let sync = SubscriptionSync::new("sub_123", provider);
//! let state = sync.sync().await;
//! println!("subscription is {}", state.status);
//! ```

pub mod billing;
pub mod cart;
pub mod clock;
pub mod error;
pub mod listeners;
pub mod types;
pub mod validation;

// Re-exports
pub use billing::{
    BillingProvider, PollHandle, RemoteStatus, StatusPayload, SubscriptionSync,
    SubscriptionSyncBuilder, SyncConfig,
};
pub use cart::CartStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CartError, ProviderError, Result, SyncError, SyncErrorKind};
pub use listeners::{
    DropReason, ListenerHandle, ListenerId, ListenerRegistry, StateEvent, StateReceiver,
    WatchConfig,
};
pub use types::*;
