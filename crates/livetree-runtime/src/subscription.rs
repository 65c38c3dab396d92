#![forbid(unsafe_code)]

//! Subscription nodes.
//!
//! A subscription node listens to a [`Publisher`]. Each delivered value is
//! stored in the node's [`ValueCell`] and the node's address is marked dirty.
//! When the client later commits the node (its trigger calls
//! `valueCommit(id)`), the stored value is handed to the node's action.
//!
//! Delivery happens on the publisher's thread; the callback never touches
//! the render tree.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use livetree_core::ElementId;

use crate::handle::SessionHandle;
use crate::node::{InvokeContext, InvokeOutcome};
use crate::reactive::{Publisher, Sink};
use crate::resource::{Resource, ResourceKind};
use crate::wrapping::{WrapBehavior, WrappingNode};

/// Action run with the latest received value.
pub type ValueAction<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Latest value received by a subscription node.
pub struct ValueCell<T> {
    value: Mutex<Option<T>>,
    received: AtomicU64,
}

impl<T> Default for ValueCell<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            received: AtomicU64::new(0),
        }
    }
}

impl<T> ValueCell<T> {
    fn store(&self, value: T) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of values received so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Whether a value has arrived.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> ValueCell<T> {
    /// Copy of the latest value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> fmt::Debug for ValueCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell")
            .field("received", &self.received())
            .finish_non_exhaustive()
    }
}

/// Behavior of a subscription node.
pub struct SubscriptionBehavior<T> {
    source: Arc<dyn Publisher<T>>,
    action: ValueAction<T>,
}

impl<T> SubscriptionBehavior<T> {
    /// Listen to `source`, running `action` on commit.
    #[must_use]
    pub fn new(source: Arc<dyn Publisher<T>>, action: ValueAction<T>) -> Self {
        Self { source, action }
    }
}

impl<T> Clone for SubscriptionBehavior<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            action: Arc::clone(&self.action),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> WrapBehavior for SubscriptionBehavior<T> {
    type Slot = ValueCell<T>;
    const KIND: &'static str = "subscription";

    fn attach(
        &self,
        element_id: &ElementId,
        slot: Weak<Self::Slot>,
        session: &SessionHandle,
    ) -> Resource {
        let owner = element_id.clone();
        let session = session.clone();
        let sink: Sink<T> = Arc::new(move |value: &T| {
            // The node is gone; a late delivery is dropped.
            let Some(cell) = slot.upgrade() else {
                return;
            };
            cell.store(value.clone());
            session.invalidate(&owner);
        });
        let subscription = self.source.subscribe(sink);
        Resource::new(ResourceKind::Subscription, element_id.clone(), subscription)
    }

    fn is_compatible(&self, previous: &Self) -> bool {
        self.source.source_key() == previous.source.source_key()
    }

    fn fire(
        &self,
        element_id: &ElementId,
        slot: &Self::Slot,
        _cx: &InvokeContext<'_>,
    ) -> InvokeOutcome {
        match slot.get() {
            Some(value) => {
                (self.action)(&value);
                InvokeOutcome::Fired
            }
            None => {
                tracing::trace!(element = %element_id, "commit before first value");
                InvokeOutcome::Pending
            }
        }
    }
}

/// Render node for a subscription view.
pub type SubscriptionNode<T> = WrappingNode<SubscriptionBehavior<T>>;
