#![forbid(unsafe_code)]

//! External value producers for livetree.
//!
//! This module provides the push side of asynchronous updates:
//!
//! - [`Publisher`]: anything that can hand values to a subscriber callback.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Broadcaster`]: a thread-safe, version-tracked publisher.
//!
//! # Architecture
//!
//! Producers live outside the render pass and may deliver values on any
//! thread. A subscription node's callback only records the value and marks
//! the node dirty on its session; it never touches the render tree.

pub mod publisher;

pub use publisher::{Broadcaster, Publisher, Sink, Subscription};
