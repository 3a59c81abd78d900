//! Listener types for state change notifications.

use serde::{Deserialize, Serialize};
use std::sync::Weak;

/// Unique identifier for a listener within one registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Configuration for a channel watcher.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Max buffered snapshots before the watcher is dropped.
    /// Default: 64
    pub buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// Events delivered to channel watchers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent<S> {
    /// The owner moved to a new state.
    Changed { state: S },

    /// The watcher was removed and will receive nothing further.
    Dropped { reason: DropReason },
}

/// Why a watcher was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The owner was disposed.
    Disposed,
}

/// Removes a listener from whatever registry issued it.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: ListenerId) -> bool;
}

/// Disposer returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call [`ListenerHandle::unsubscribe`].
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct ListenerHandle {
    pub id: ListenerId,
    pub(crate) registry: Weak<dyn Detach>,
}

impl ListenerHandle {
    /// Stop receiving notifications.
    ///
    /// Returns false if the listener was already gone (unsubscribed, cleared,
    /// or the owner was dropped).
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

/// Receiving end of a channel watcher.
pub struct StateReceiver<S> {
    pub id: ListenerId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StateEvent<S>>,
}

impl<S> StateReceiver<S> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StateEvent<S>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StateEvent<S>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StateEvent<S>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything buffered and return the newest state, if any.
    pub fn latest(&self) -> Option<S> {
        let mut latest = None;
        while let Ok(event) = self.receiver.try_recv() {
            if let StateEvent::Changed { state } = event {
                latest = Some(state);
            }
        }
        latest
    }
}

impl<S> std::fmt::Debug for StateReceiver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReceiver")
            .field("id", &self.id)
            .field("buffered", &self.receiver.len())
            .finish()
    }
}
