//! Session state store: the active unit, the roster, and the call list.
//!
//! The store is an explicit handle passed to every consumer. Clones share the
//! same state. Writes happen under a lock and subscribers are notified after
//! the lock is released, so a subscriber may read the store (or write to it)
//! from inside its callback.
//!
//! Deliveries never overlap and never go backwards: each write is numbered,
//! one thread at a time delivers, and a snapshot older than the last one
//! delivered is skipped. A write made while another thread is delivering is
//! handed to that thread, so only the newest pending snapshot is delivered.
//!
//! ```text
//! reconciler ──update()──▶ SessionStore ──notify──▶ subscribers (views)
//!                               ▲
//! dashboard bootstrap ──set_*()─┘
//! ```

use dispatch_protocol::{Call911, Unit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// `None` exactly when the user has no unit on duty.
    pub active_unit: Option<Unit>,
    pub roster: Vec<Unit>,
    pub calls: Vec<Call911>,
}

type Callback = Arc<dyn Fn(&SessionState) + Send + Sync>;

struct StoreInner {
    state: RwLock<SessionState>,
    version: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscriber: AtomicU64,
    delivery: Mutex<Delivery>,
}

#[derive(Default)]
struct Delivery {
    /// Some thread is running callbacks.
    active: bool,
    delivered: u64,
    pending: Option<(u64, SessionState)>,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl SessionStore {
    pub fn new(initial: SessionState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial),
                version: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                delivery: Mutex::new(Delivery::default()),
            }),
        }
    }

    /// Snapshot of the latest completed write.
    pub fn get(&self) -> SessionState {
        self.inner
            .state
            .read()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn active_unit(&self) -> Option<Unit> {
        self.inner
            .state
            .read()
            .map(|state| state.active_unit.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().active_unit.clone())
    }

    /// Replaces the active unit wholesale; no validation.
    pub fn set_active_unit(&self, unit: Option<Unit>) {
        self.update(|state| {
            state.active_unit = unit;
            true
        });
    }

    pub fn set_roster(&self, units: Vec<Unit>) {
        self.update(|state| {
            state.roster = units;
            true
        });
    }

    pub fn set_calls(&self, calls: Vec<Call911>) {
        self.update(|state| {
            state.calls = calls;
            true
        });
    }

    /// Atomic read-modify-write.
    ///
    /// `apply` returns whether it changed anything; subscribers are notified
    /// only then. Returns the same flag.
    pub fn update<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let (version, snapshot) = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !apply(&mut state) {
                return false;
            }
            let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
            (version, state.clone())
        };
        self.notify(version, snapshot);
        true
    }

    /// Registers `callback` for every committed change. Dropping the returned
    /// handle unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> StoreSubscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(callback)));
        StoreSubscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    fn notify(&self, version: u64, snapshot: SessionState) {
        {
            let mut delivery = self.lock_delivery();
            if version <= delivery.delivered {
                return;
            }
            let newer = delivery
                .pending
                .as_ref()
                .map_or(true, |(pending, _)| version > *pending);
            if newer {
                delivery.pending = Some((version, snapshot));
            }
            if delivery.active {
                return;
            }
            delivery.active = true;
        }

        let mut guard = DeliveryGuard {
            delivery: &self.inner.delivery,
            armed: true,
        };
        loop {
            let (version, snapshot) = {
                let mut delivery = self.lock_delivery();
                match delivery.pending.take() {
                    Some(next) => {
                        delivery.delivered = next.0;
                        next
                    }
                    None => {
                        delivery.active = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            tracing::trace!(version, "Notifying store subscribers");
            for callback in self.callbacks() {
                callback(&snapshot);
            }
        }
    }

    fn lock_delivery(&self) -> MutexGuard<'_, Delivery> {
        self.inner
            .delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callbacks(&self) -> Vec<Callback> {
        self.inner
            .subscribers
            .lock()
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Releases the delivery slot if a callback panics.
struct DeliveryGuard<'a> {
    delivery: &'a Mutex<Delivery>,
    armed: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut delivery = self
                .delivery
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            delivery.active = false;
        }
    }
}

pub struct StoreSubscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        if let Ok(mut subscribers) = inner.subscribers.lock() {
            subscribers.retain(|(id, _)| *id != self.id);
        };
    }
}
