#![forbid(unsafe_code)]

//! Live server-rendered HTML trees.
//!
//! # Role in livetree
//! `livetree-runtime` owns everything stateful: building view descriptions
//! into addressed render nodes, keeping subscriptions and timers attached to
//! the right node across rebuilds, and routing client interactions back to
//! the node that rendered them.
//!
//! # Primary responsibilities
//! - **Building**: [`View`] descriptions become [`RenderNode`] trees through
//!   [`TreeBuilder`], which assigns every node an [`ElementId`].
//! - **Wrapping nodes**: [`SubscriptionView`] and [`TimerView`] own an
//!   external [`Resource`] and emit a client refresh trigger.
//! - **Reconciliation**: rebuilds move still-valid resources to the node
//!   that takes over the same address ([`reconcile`]).
//! - **Dispatch**: [`Session::dispatch`] routes client interactions by
//!   address.
//!
//! # How it fits in the system
//! `livetree-core` supplies addresses and escaping. The `livetree` facade
//! re-exports both crates for applications; transports sit on top of
//! [`Session`], feeding it interactions and sending out its patches.

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod handle;
#[cfg(feature = "tracing-init")]
pub mod logging;
pub mod node;
pub mod reactive;
pub mod reconcile;
pub mod resource;
pub mod session;
pub mod subscription;
pub mod timer;
pub mod views;
pub mod wrapping;

pub use builder::{AnyView, BuildContext, BuildError, IdScope, TreeBuilder, View};
pub use config::{ConfigError, SessionConfig};
pub use dispatch::{DispatchError, Interaction};
pub use handle::{ActiveTimer, Notifier, SessionHandle};
pub use node::{Adoption, BoxNode, InvokeContext, InvokeOutcome, RenderNode};
pub use reactive::{Broadcaster, Publisher, Subscription};
pub use reconcile::ReconcileReport;
pub use resource::{Resource, ResourceId, ResourceKind};
pub use session::{Patch, Session, SessionStats};
pub use subscription::{SubscriptionBehavior, SubscriptionNode, ValueCell};
pub use timer::{TimerBehavior, TimerNode, TimerSlot, TimerTick};
pub use views::{Axis, Button, Dynamic, Stack, SubscriptionView, Text, TimerView, ViewExt};
pub use wrapping::{ClientTrigger, WrapBehavior, WrapState, WrappingNode};

pub use livetree_core::{ElementId, IdComponent};
