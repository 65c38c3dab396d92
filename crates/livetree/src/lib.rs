#![forbid(unsafe_code)]

//! livetree public facade.
//!
//! Server-rendered HTML whose nodes keep their identity across rebuilds.
//! Every node has a hierarchical [`ElementId`]; the same address is the DOM
//! id the client sees and the routing key for interactions it sends back.
//!
//! ```ignore
//! use livetree::prelude::*;
//!
//! let prices: Broadcaster<f64> = Broadcaster::new();
//! let latest = prices.clone();
//! let mut session = Session::default();
//! let html = session.mount(
//!     Stack::new()
//!         .child(Text::new("Price"))
//!         .child(
//!             Text::computed(move || format!("{:.2}", latest.latest().unwrap_or_default()))
//!                 .on_receive(prices.clone(), |_: &f64| {}),
//!         ),
//! )?;
//!
//! prices.send(101.5);
//! for patch in session.flush()? {
//!     // send `patch.web_id` / `patch.html` to the client
//! }
//! ```
//!
//! # Features
//! - `runtime` (default): sessions, views and reconciliation.
//! - `tracing-init`: `logging::init` for hosts without their own subscriber.

pub use livetree_core::{AddressError, ElementId, IdComponent, html};

#[cfg(feature = "runtime")]
pub use livetree_runtime as runtime;

#[cfg(feature = "runtime")]
pub use livetree_runtime::{
    BuildError, ConfigError, DispatchError, Interaction, InvokeOutcome, Patch, ReconcileReport,
    Session, SessionConfig, SessionHandle, View,
};

#[cfg(feature = "tracing-init")]
pub use livetree_runtime::logging;

/// Common imports for building pages.
pub mod prelude {
    pub use livetree_core::{ElementId, IdComponent};

    #[cfg(feature = "runtime")]
    pub use livetree_runtime::{
        AnyView, Axis, Broadcaster, BuildContext, BuildError, Button, Dynamic, Interaction,
        InvokeOutcome, Patch, Publisher, Session, SessionConfig, Stack, SubscriptionView, Text,
        TimerView, View, ViewExt,
    };
}
