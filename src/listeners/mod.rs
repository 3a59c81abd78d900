//! Listener system for live state updates.
//!
//! Both the cart and the subscription sync publish a fresh snapshot after
//! every change. Calling code can observe them two ways:
//! - Callbacks registered with `subscribe`, disposed through the returned handle
//! - Bounded channels from `watch`, with slow-watcher dropping
//!
//! # Example
//!
//! ```ignore
//! let registry = ListenerRegistry::<CartState>::new();
//!
//! let handle = registry.subscribe(|state| render(state));
//! let watcher = registry.watch(WatchConfig::default());
//!
//! registry.notify(&cart.state());
//! if let Some(latest) = watcher.latest() {
//!     println!("total: {}", latest.total_cost);
//! }
//!
//! handle.unsubscribe();
//! ```

mod manager;
mod types;

pub use manager::ListenerRegistry;
pub use types::{
    DropReason, ListenerHandle, ListenerId, StateEvent, StateReceiver, WatchConfig,
};
