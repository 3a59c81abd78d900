//! Listener registry for broadcasting state snapshots.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{
    Detach, DropReason, ListenerHandle, ListenerId, StateEvent, StateReceiver, WatchConfig,
};

type Callback<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Internal listener state.
enum Listener<S> {
    Callback(Callback<S>),
    Channel(Sender<StateEvent<S>>),
}

struct RegistryInner<S> {
    /// Active listeners, in registration order.
    listeners: RwLock<BTreeMap<ListenerId, Listener<S>>>,
    /// Counter for generating listener IDs.
    next_id: AtomicU64,
}

impl<S: Send + Sync + 'static> Detach for RegistryInner<S> {
    fn detach(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id);
        match removed {
            Some(Listener::Channel(sender)) => {
                // Best effort, the buffer may be full.
                let _ = sender.try_send(StateEvent::Dropped {
                    reason: DropReason::Unsubscribed,
                });
                true
            }
            Some(Listener::Callback(_)) => true,
            None => false,
        }
    }
}

/// Fans state snapshots out to callbacks and channel watchers.
///
/// Callbacks run after the registry lock is released, so a callback may
/// subscribe or unsubscribe without deadlocking.
pub struct ListenerRegistry<S> {
    inner: Arc<RegistryInner<S>>,
}

impl<S: Clone + Send + Sync + 'static> ListenerRegistry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                listeners: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn handle(&self, id: ListenerId) -> ListenerHandle {
        let inner: Arc<dyn Detach> = self.inner.clone();
        ListenerHandle {
            id,
            registry: Arc::downgrade(&inner),
        }
    }

    /// Register a callback invoked with every new state.
    pub fn subscribe<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner
            .listeners
            .write()
            .insert(id, Listener::Callback(Arc::new(callback)));
        self.handle(id)
    }

    /// Register a bounded channel that receives every new state.
    ///
    /// A watcher whose buffer fills up, or whose receiver is dropped, is
    /// removed on the next broadcast.
    pub fn watch(&self, config: WatchConfig) -> StateReceiver<S> {
        let id = self.next_id();
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        self.inner
            .listeners
            .write()
            .insert(id, Listener::Channel(sender));
        StateReceiver { id, receiver }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.detach(id)
    }

    /// Get listener count.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Remove every listener, telling watchers why.
    pub fn clear(&self, reason: DropReason) {
        let drained = std::mem::take(&mut *self.inner.listeners.write());
        for listener in drained.into_values() {
            if let Listener::Channel(sender) = listener {
                let _ = sender.try_send(StateEvent::Dropped { reason });
            }
        }
    }

    /// Deliver `state` to every listener. Drops watchers that fail to receive.
    pub fn notify(&self, state: &S) {
        let mut callbacks = Vec::new();
        let mut to_remove = Vec::new();

        {
            let listeners = self.inner.listeners.read();
            for (id, listener) in listeners.iter() {
                match listener {
                    Listener::Callback(callback) => callbacks.push(Arc::clone(callback)),
                    Listener::Channel(sender) => {
                        let event = StateEvent::Changed {
                            state: state.clone(),
                        };
                        match sender.try_send(event) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                to_remove.push((*id, true));
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                to_remove.push((*id, false));
                            }
                        }
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.inner.listeners.write();
            for (id, overflowed) in to_remove {
                if let Some(Listener::Channel(sender)) = listeners.remove(&id) {
                    if overflowed {
                        tracing::debug!(listener = id.0, "dropping slow watcher");
                        // Might fail, the buffer is full.
                        let _ = sender.try_send(StateEvent::Dropped {
                            reason: DropReason::BufferOverflow,
                        });
                    }
                }
            }
        }

        for callback in callbacks {
            callback(state);
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Default for ListenerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for ListenerRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();

        let handle = registry.subscribe(|_| {});
        assert_eq!(registry.listener_count(), 1);

        assert!(handle.unsubscribe());
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            let _handle = registry.subscribe(move |value: &u32| {
                seen.lock().unwrap().push((tag, *value));
            });
        }

        registry.notify(&7);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![("first", 7), ("second", 7), ("third", 7)]);
    }

    #[test]
    fn test_unsubscribed_callback_not_called() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let handle = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&1);
        handle.unsubscribe();
        registry.notify(&2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_can_unsubscribe_during_notify() {
        let registry: Arc<ListenerRegistry<u32>> = Arc::new(ListenerRegistry::new());
        let inner = Arc::clone(&registry);

        let _handle = registry.subscribe(move |_| {
            inner.clear(DropReason::Unsubscribed);
        });

        registry.notify(&1);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_watch_receives_changes() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let watcher = registry.watch(WatchConfig::default());

        registry.notify(&5);

        let event = watcher.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(event, StateEvent::Changed { state: 5 });
    }

    #[test]
    fn test_drop_slow_watcher() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let _watcher = registry.watch(WatchConfig { buffer_size: 2 });

        // Flood with states
        for i in 0..10 {
            registry.notify(&i);
        }

        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_is_removed() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let watcher = registry.watch(WatchConfig::default());
        drop(watcher);

        registry.notify(&1);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_latest_drains_buffer() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let watcher = registry.watch(WatchConfig::default());

        registry.notify(&1);
        registry.notify(&2);
        registry.notify(&3);

        assert_eq!(watcher.latest(), Some(3));
        assert_eq!(watcher.latest(), None);
    }

    #[test]
    fn test_clear_notifies_watchers() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let watcher = registry.watch(WatchConfig::default());
        let handle = registry.subscribe(|_| {});

        registry.clear(DropReason::Disposed);

        assert_eq!(
            watcher.try_recv().unwrap(),
            StateEvent::Dropped {
                reason: DropReason::Disposed
            }
        );
        assert!(!handle.unsubscribe());
    }
}
