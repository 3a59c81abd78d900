//! Subscription status synchronisation against a billing provider.

use futures::future::{self, BoxFuture, Either, FutureExt, Ready, Shared};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::poll::PollHandle;
use super::provider::{BillingProvider, StatusPayload};
use crate::clock::{Clock, SystemClock};
use crate::error::{ProviderError, SyncError, SyncErrorKind};
use crate::listeners::{
    DropReason, ListenerHandle, ListenerRegistry, StateReceiver, WatchConfig,
};
use crate::types::{SubscriptionState, SubscriptionStatus, Timestamp};
use crate::validation::validate_subscription_id;

type SharedFetch = Shared<BoxFuture<'static, SubscriptionState>>;

/// Result of a planned `sync()`, resolved by awaiting.
pub(super) type PendingSync = Either<SharedFetch, Ready<SubscriptionState>>;

/// Consecutive failures of one kind.
#[derive(Default)]
struct FailureStreak {
    kind: Option<SyncErrorKind>,
    count: u32,
}

impl FailureStreak {
    fn record(&mut self, kind: SyncErrorKind) -> u32 {
        if self.kind == Some(kind) {
            self.count = self.count.saturating_add(1);
        } else {
            self.kind = Some(kind);
            self.count = 1;
        }
        self.count
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything guarded by the state lock.
struct Slot {
    state: SubscriptionState,
    streak: FailureStreak,
    disposed: bool,
}

/// What a `sync()` call is going to do.
enum Plan {
    /// Another call already started a fetch.
    Attach(SharedFetch),
    /// This call started a fetch.
    Fetch(SharedFetch),
    /// Nothing to do.
    Skip,
    /// The id can never be fetched.
    Reject(String),
}

pub(super) struct SyncInner {
    subscription_id: String,
    /// Why the id is unusable, checked once at construction.
    id_error: Option<String>,
    provider: Arc<dyn BillingProvider>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    slot: RwLock<Slot>,
    in_flight: Mutex<Option<SharedFetch>>,
    listeners: ListenerRegistry<SubscriptionState>,
}

fn enter_loading(slot: &mut Slot) {
    slot.state.status = SubscriptionStatus::Loading;
    slot.state.last_error = None;
}

impl SyncInner {
    fn snapshot(&self) -> SubscriptionState {
        self.slot.read().state.clone()
    }

    pub(super) fn is_disposed(&self) -> bool {
        self.slot.read().disposed
    }

    fn is_fresh(&self) -> bool {
        let now = self.clock.now();
        let slot = self.slot.read();
        slot.state.status.is_settled()
            && slot
                .state
                .last_synced_at
                .is_some_and(|at| now.saturating_duration_since(at) < self.config.min_refetch_interval)
    }

    /// Apply `change` unless disposed. Returns the new state if applied.
    fn apply<F>(&self, change: F) -> Option<SubscriptionState>
    where
        F: FnOnce(&mut Slot),
    {
        let mut slot = self.slot.write();
        if slot.disposed {
            return None;
        }
        change(&mut slot);
        Some(slot.state.clone())
    }

    /// Notify listeners of an applied change, or fall back to the frozen state.
    fn publish(&self, applied: Option<SubscriptionState>) -> SubscriptionState {
        match applied {
            Some(state) => {
                self.listeners.notify(&state);
                state
            }
            None => self.snapshot(),
        }
    }

    fn plan(self: &Arc<Self>, force: bool) -> Plan {
        let mut in_flight = self.in_flight.lock();

        if let Some(fetch) = in_flight.as_ref() {
            return Plan::Attach(fetch.clone());
        }
        if self.is_disposed() {
            return Plan::Skip;
        }
        if let Some(reason) = &self.id_error {
            return Plan::Reject(reason.clone());
        }
        if !force && self.is_fresh() {
            return Plan::Skip;
        }

        // Loading is written now and announced when the fetch first runs,
        // so listeners never see it after the outcome.
        let loading = self.apply(enter_loading);
        let fetch = Arc::clone(self).fetch(loading).boxed().shared();
        *in_flight = Some(fetch.clone());
        Plan::Fetch(fetch)
    }

    /// Decide what a `sync()` call does, registering any new fetch before
    /// returning. Only the provider call itself waits for the first poll.
    pub(super) fn start(self: &Arc<Self>, force: bool) -> PendingSync {
        match self.plan(force) {
            Plan::Attach(fetch) => {
                debug!("joining in-flight fetch");
                Either::Left(fetch)
            }
            Plan::Fetch(fetch) => Either::Left(fetch),
            Plan::Skip => {
                debug!("fetch skipped");
                Either::Right(future::ready(self.snapshot()))
            }
            Plan::Reject(reason) => Either::Right(future::ready(self.reject_invalid_id(reason))),
        }
    }

    fn reject_invalid_id(&self, reason: String) -> SubscriptionState {
        let loading = self.apply(enter_loading);
        self.publish(loading);

        warn!(%reason, "subscription id rejected, not contacting provider");
        let at = self.clock.now();
        let failed = self.apply(move |slot| {
            let count = slot.streak.record(SyncErrorKind::InvalidSubscriptionId);
            let mut error = SyncError::invalid_subscription_id(reason, at);
            error.consecutive_failures = count;

            slot.state.status = SubscriptionStatus::Error;
            slot.state.last_error = Some(error);
            slot.state.current_period = None;
        });
        self.publish(failed)
    }

    async fn fetch(self: Arc<Self>, loading: Option<SubscriptionState>) -> SubscriptionState {
        if let Some(state) = &loading {
            self.listeners.notify(state);
        }

        let result = self
            .provider
            .fetch_status(&self.subscription_id)
            .await
            .and_then(|payload| {
                payload.validate()?;
                Ok(payload)
            });

        let now = self.clock.now();
        let threshold = self.config.rejection_threshold.max(1);
        let applied = self.apply(|slot| match result {
            Ok(payload) => settle(slot, &payload, now),
            Err(error) => fail(slot, &error, threshold, now),
        });

        if applied.is_none() {
            debug!("disposed while fetching, result discarded");
        }

        // Cleared after the state is written so a follow-up call sees it.
        self.in_flight.lock().take();
        self.publish(applied)
    }
}

fn settle(slot: &mut Slot, payload: &StatusPayload, now: Timestamp) {
    let status = SubscriptionStatus::from(payload.status);
    info!(%status, "subscription synced");

    slot.streak.reset();
    slot.state.status = status;
    slot.state.last_error = None;
    slot.state.last_synced_at = Some(now);
    slot.state.current_period = Some(payload.period());
}

fn fail(slot: &mut Slot, error: &ProviderError, threshold: u32, now: Timestamp) {
    let count = slot.streak.record(SyncErrorKind::from(error));
    let error = SyncError::from_provider(error, count, threshold, now);
    warn!(
        kind = %error.kind,
        consecutive = count,
        persistent = error.persistent,
        error = %error.message,
        "subscription sync failed"
    );

    slot.state.status = SubscriptionStatus::Error;
    slot.state.last_error = Some(error);
    slot.state.current_period = None;
}

/// Keeps one subscription's status in step with the billing provider.
///
/// `sync()` never fails: provider errors end up in
/// [`SubscriptionState::last_error`] with status `Error`. Calls made while a
/// fetch is outstanding share that fetch instead of starting another.
///
/// Dropping the sync disposes it: an outstanding fetch still resolves for
/// whoever awaits it, but no longer changes the state.
pub struct SubscriptionSync {
    inner: Arc<SyncInner>,
}

impl SubscriptionSync {
    /// Create a sync with default configuration and the system clock.
    pub fn new(subscription_id: impl Into<String>, provider: Arc<dyn BillingProvider>) -> Self {
        Self::builder(subscription_id, provider).build()
    }

    pub fn builder(
        subscription_id: impl Into<String>,
        provider: Arc<dyn BillingProvider>,
    ) -> SubscriptionSyncBuilder {
        SubscriptionSyncBuilder {
            subscription_id: subscription_id.into(),
            provider,
            config: SyncConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Fetch the current status, unless a fetch is already running (join it)
    /// or the last successful fetch is younger than the refetch interval.
    ///
    /// The decision is made when `sync()` is called, not when the returned
    /// future is first polled: two calls with no await between them always
    /// share one provider request.
    #[tracing::instrument(skip(self), fields(subscription_id = %self.inner.subscription_id))]
    pub fn sync(&self) -> impl Future<Output = SubscriptionState> + Send + 'static {
        self.inner.start(false)
    }

    /// Like [`SubscriptionSync::sync`] but ignores the refetch interval.
    #[tracing::instrument(skip(self), fields(subscription_id = %self.inner.subscription_id))]
    pub fn refresh(&self) -> impl Future<Output = SubscriptionState> + Send + 'static {
        self.inner.start(true)
    }

    /// Current state, without waiting for any fetch.
    pub fn state(&self) -> SubscriptionState {
        self.inner.snapshot()
    }

    pub fn subscription_id(&self) -> &str {
        &self.inner.subscription_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Call `listener` on every state transition.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&SubscriptionState) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Receive every state transition on a bounded channel.
    pub fn watch(&self, config: WatchConfig) -> StateReceiver<SubscriptionState> {
        self.inner.listeners.watch(config)
    }

    /// Run `sync()` every `interval` until the handle is stopped or dropped,
    /// or this sync is disposed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_polling(&self, interval: Duration) -> PollHandle {
        PollHandle::spawn(Arc::clone(&self.inner), interval)
    }

    /// Freeze the state and drop every listener. A fetch already running
    /// still resolves for its awaiters, but its result is discarded.
    pub fn dispose(&self) {
        {
            let mut slot = self.inner.slot.write();
            if slot.disposed {
                return;
            }
            slot.disposed = true;
        }
        // The stored fetch holds an Arc to `inner`.
        let abandoned = self.inner.in_flight.lock().take();
        drop(abandoned);
        self.inner.listeners.clear(DropReason::Disposed);
        debug!(subscription_id = %self.inner.subscription_id, "subscription sync disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl Drop for SubscriptionSync {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SubscriptionSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSync")
            .field("subscription_id", &self.inner.subscription_id)
            .field("status", &self.inner.slot.read().state.status)
            .finish()
    }
}

/// Builder for [`SubscriptionSync`].
pub struct SubscriptionSyncBuilder {
    subscription_id: String,
    provider: Arc<dyn BillingProvider>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl SubscriptionSyncBuilder {
    #[must_use]
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SubscriptionSync {
        let id_error = validate_subscription_id(&self.subscription_id).err();
        let state = SubscriptionState::unknown(self.subscription_id.clone());

        SubscriptionSync {
            inner: Arc::new(SyncInner {
                subscription_id: self.subscription_id,
                id_error,
                provider: self.provider,
                clock: self.clock,
                config: self.config,
                slot: RwLock::new(Slot {
                    state,
                    streak: FailureStreak::default(),
                    disposed: false,
                }),
                in_flight: Mutex::new(None),
                listeners: ListenerRegistry::new(),
            }),
        }
    }
}

impl std::fmt::Debug for SubscriptionSyncBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSyncBuilder")
            .field("subscription_id", &self.subscription_id)
            .field("config", &self.config)
            .finish()
    }
}
