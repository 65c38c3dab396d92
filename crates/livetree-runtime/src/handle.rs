#![forbid(unsafe_code)]

//! Session-owned invalidation registry.
//!
//! A [`SessionHandle`] is the only piece of session state that long-lived
//! nodes and producer callbacks keep. It records which addresses are dirty,
//! which client timers are active, and forwards every invalidation to an
//! optional notifier (the transport hook that schedules a flush).
//!
//! The handle is `Send + Sync` and cheap to clone. Callbacks running on
//! producer threads only touch the handle, never the render tree; the session
//! applies the pending set on its own turn.
//!
//! # Invariants
//!
//! 1. The dirty set never contains duplicates.
//! 2. [`SessionHandle::take_dirty`] returns a minimal cover: no returned
//!    address encloses another.
//! 3. A timer lease is registered for exactly as long as its guard lives.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use ahash::AHashMap;
use livetree_core::ElementId;

/// Global counter for session IDs (log correlation only).
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Callback told about every invalidated address.
pub type Notifier = Arc<dyn Fn(&ElementId) + Send + Sync>;

/// A client-side refresh trigger currently registered on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTimer {
    /// Address the client reports ticks for.
    pub element_id: ElementId,
    /// Tick interval requested from the client.
    pub interval: Duration,
}

struct Shared {
    session_id: u64,
    dirty: Mutex<BTreeSet<ElementId>>,
    timers: Mutex<AHashMap<u64, ActiveTimer>>,
    next_lease: AtomicU64,
    notifier: Mutex<Option<Notifier>>,
    invalidations: AtomicU64,
}

/// Shared handle to a session's invalidation state.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                session_id: SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                dirty: Mutex::new(BTreeSet::new()),
                timers: Mutex::new(AHashMap::new()),
                next_lease: AtomicU64::new(1),
                notifier: Mutex::new(None),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    /// Session identifier for log correlation.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.shared.session_id
    }

    /// Mark `element_id` as needing a re-render.
    ///
    /// Safe to call from any thread.
    pub fn invalidate(&self, element_id: &ElementId) {
        let inserted = lock(&self.shared.dirty).insert(element_id.clone());
        self.shared.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            session = self.shared.session_id,
            element = %element_id,
            inserted,
            "invalidate"
        );
        let notifier = lock(&self.shared.notifier).clone();
        if let Some(notify) = notifier {
            notify(element_id);
        }
    }

    /// Whether any address is waiting to be re-rendered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !lock(&self.shared.dirty).is_empty()
    }

    /// Snapshot of the pending addresses, in address order.
    #[must_use]
    pub fn pending(&self) -> Vec<ElementId> {
        lock(&self.shared.dirty).iter().cloned().collect()
    }

    /// Total number of invalidations received.
    #[must_use]
    pub fn invalidation_count(&self) -> u64 {
        self.shared.invalidations.load(Ordering::Relaxed)
    }

    /// Snapshot of the active client timers, in address order.
    #[must_use]
    pub fn active_timers(&self) -> Vec<ActiveTimer> {
        let mut timers: Vec<ActiveTimer> = lock(&self.shared.timers).values().cloned().collect();
        timers.sort_by(|a, b| a.element_id.cmp(&b.element_id));
        timers
    }

    pub(crate) fn set_notifier(&self, notifier: Option<Notifier>) {
        *lock(&self.shared.notifier) = notifier;
    }

    /// Drain the dirty set, coalesced to a minimal cover.
    pub(crate) fn take_dirty(&self) -> Vec<ElementId> {
        let dirty = std::mem::take(&mut *lock(&self.shared.dirty));
        coalesce(dirty)
    }

    /// Put addresses back after a failed flush.
    pub(crate) fn requeue(&self, ids: impl IntoIterator<Item = ElementId>) {
        lock(&self.shared.dirty).extend(ids);
    }

    pub(crate) fn clear_dirty(&self) {
        lock(&self.shared.dirty).clear();
    }

    pub(crate) fn register_timer(&self, element_id: &ElementId, interval: Duration) -> TimerLease {
        let lease = self.shared.next_lease.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.timers).insert(
            lease,
            ActiveTimer {
                element_id: element_id.clone(),
                interval,
            },
        );
        TimerLease {
            shared: Arc::downgrade(&self.shared),
            lease,
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.shared.session_id)
            .field("pending", &lock(&self.shared.dirty).len())
            .field("timers", &lock(&self.shared.timers).len())
            .finish()
    }
}

/// Registration of a client timer; deregisters on drop.
pub(crate) struct TimerLease {
    shared: Weak<Shared>,
    lease: u64,
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.timers).remove(&self.lease);
        }
    }
}

/// Reduce `ids` to the addresses not enclosed by another member.
///
/// Sorted address order places every descendant directly after its
/// ancestors, so checking the last kept address is enough.
pub fn coalesce(ids: impl IntoIterator<Item = ElementId>) -> Vec<ElementId> {
    let sorted: BTreeSet<ElementId> = ids.into_iter().collect();
    let mut kept: Vec<ElementId> = Vec::with_capacity(sorted.len());
    for id in sorted {
        if kept.last().is_some_and(|last| last.encloses(&id)) {
            continue;
        }
        kept.push(id);
    }
    kept
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
