#![forbid(unsafe_code)]

//! Timer nodes.
//!
//! A timer node asks the client to commit it every `interval`. The resource
//! is a lease on the session's timer registry, so [`SessionHandle::active_timers`]
//! lists exactly the timers the current tree holds. Each commit counts a
//! tick, runs the optional tick action and marks the node dirty, which
//! re-renders its content on the next flush.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use livetree_core::ElementId;
use web_time::Instant;

use crate::handle::SessionHandle;
use crate::node::{InvokeContext, InvokeOutcome};
use crate::resource::{Resource, ResourceKind};
use crate::wrapping::{WrapBehavior, WrappingNode};

/// One client tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    /// 1-based tick number for this node's identity.
    pub sequence: u64,
    /// When the tick was received.
    pub at: Instant,
}

/// Action run on every tick.
pub type TickAction = Arc<dyn Fn(&TimerTick) + Send + Sync>;

/// Tick bookkeeping carried across rebuilds.
#[derive(Default)]
pub struct TimerSlot {
    ticks: AtomicU64,
    last_tick: Mutex<Option<Instant>>,
}

impl TimerSlot {
    /// Ticks received so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Time of the most recent tick.
    #[must_use]
    pub fn last_tick(&self) -> Option<Instant> {
        *self.last_tick.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self) -> TimerTick {
        let at = Instant::now();
        *self.last_tick.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
        TimerTick {
            sequence: self.ticks.fetch_add(1, Ordering::Relaxed) + 1,
            at,
        }
    }
}

impl fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerSlot")
            .field("ticks", &self.ticks())
            .field("last_tick", &self.last_tick())
            .finish()
    }
}

/// Behavior of a timer node.
#[derive(Clone)]
pub struct TimerBehavior {
    interval: Duration,
    on_tick: Option<TickAction>,
}

impl TimerBehavior {
    /// Tick every `interval`.
    #[must_use]
    pub fn new(interval: Duration, on_tick: Option<TickAction>) -> Self {
        Self { interval, on_tick }
    }

    /// Tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl WrapBehavior for TimerBehavior {
    type Slot = TimerSlot;
    const KIND: &'static str = "timer";

    fn attach(
        &self,
        element_id: &ElementId,
        _slot: Weak<Self::Slot>,
        session: &SessionHandle,
    ) -> Resource {
        let lease = session.register_timer(element_id, self.interval);
        Resource::new(ResourceKind::Timer, element_id.clone(), lease)
    }

    fn is_compatible(&self, previous: &Self) -> bool {
        self.interval == previous.interval
    }

    fn fire(
        &self,
        element_id: &ElementId,
        slot: &Self::Slot,
        cx: &InvokeContext<'_>,
    ) -> InvokeOutcome {
        let tick = slot.record();
        tracing::trace!(element = %element_id, sequence = tick.sequence, "timer tick");
        if let Some(on_tick) = &self.on_tick {
            on_tick(&tick);
        }
        cx.session().invalidate(element_id);
        InvokeOutcome::Fired
    }
}

impl fmt::Debug for TimerBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerBehavior")
            .field("interval", &self.interval)
            .field("on_tick", &self.on_tick.is_some())
            .finish()
    }
}

/// Render node for a timer view.
pub type TimerNode = WrappingNode<TimerBehavior>;
