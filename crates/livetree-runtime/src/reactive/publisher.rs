#![forbid(unsafe_code)]

//! Push-based value producers.
//!
//! A [`Publisher`] hands every new value to its subscribers. Subscribing
//! returns a [`Subscription`] guard; dropping the guard detaches the callback.
//! [`Broadcaster`] is the thread-safe publisher used by applications and tests
//! to feed values into a render tree from timers, channels or other threads.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 3. Callbacks run without the broadcaster lock held, so a callback may
//!    subscribe, unsubscribe or send again.
//! 4. Version increments exactly once per [`Broadcaster::send`].
//! 5. The value is recorded as latest before any subscriber runs, so a
//!    callback reading [`Broadcaster::latest`] sees the value it was handed.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callback invoked with every published value.
pub type Sink<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A source of asynchronously arriving values.
///
/// Implementations may invoke the sink from any thread.
pub trait Publisher<T>: Send + Sync + 'static {
    /// Register `sink`; it stays registered until the returned guard drops.
    fn subscribe(&self, sink: Sink<T>) -> Subscription;

    /// Identity of the underlying value stream.
    ///
    /// Two publishers with equal keys deliver the same values. Handles that
    /// share state (such as clones of one [`Broadcaster`]) must report the
    /// same key. The default is the address of `self`.
    fn source_key(&self) -> usize {
        (self as *const Self).cast::<()>() as usize
    }
}

/// RAII guard for a publisher registration.
///
/// Dropping the guard cancels the registration.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    hold: Option<Box<dyn Send + Sync>>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription that runs `on_cancel` when dropped.
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            hold: None,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// A subscription that keeps `value` alive until dropped.
    ///
    /// Publishers that store weak references to their callbacks hand the
    /// strong reference to the subscriber through this constructor.
    pub fn holding(value: impl Send + Sync + 'static) -> Self {
        Self {
            hold: Some(Box::new(value)),
            on_cancel: None,
        }
    }

    /// Cancel explicitly. Equivalent to dropping the guard.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hold = None;
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct BroadcastState<T> {
    subscribers: Vec<Weak<dyn Fn(&T) + Send + Sync>>,
    latest: Option<Arc<T>>,
    version: u64,
}

/// Thread-safe multi-subscriber publisher.
///
/// Subscribers are stored as `Weak` callbacks and cleaned up lazily during
/// notification; the strong reference lives in the [`Subscription`].
pub struct Broadcaster<T> {
    state: Arc<Mutex<BroadcastState<T>>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BroadcastState {
                subscribers: Vec::new(),
                latest: None,
                version: 0,
            })),
        }
    }

    /// Subscribe with a closure.
    pub fn subscribe_fn(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.register(Arc::new(callback))
    }

    fn register(&self, sink: Sink<T>) -> Subscription {
        self.lock().subscribers.push(Arc::downgrade(&sink));
        Subscription::holding(sink)
    }

    /// Publish `value` to every live subscriber.
    pub fn send(&self, value: T) {
        let value = Arc::new(value);
        let live: Vec<Sink<T>> = {
            let mut state = self.lock();
            state.subscribers.retain(|weak| weak.strong_count() > 0);
            state.version += 1;
            state.latest = Some(Arc::clone(&value));
            state.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for sink in &live {
            sink(value.as_ref());
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of values sent so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BroadcastState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Broadcaster<T> {
    /// The most recently sent value.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.lock().latest.as_deref().cloned()
    }
}

impl<T: Send + Sync + 'static> Publisher<T> for Broadcaster<T> {
    fn subscribe(&self, sink: Sink<T>) -> Subscription {
        self.register(sink)
    }

    fn source_key(&self) -> usize {
        Arc::as_ptr(&self.state).cast::<()>() as usize
    }
}

impl<T> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster").finish_non_exhaustive()
    }
}
