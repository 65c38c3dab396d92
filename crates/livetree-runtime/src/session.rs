#![forbid(unsafe_code)]

//! Per-connection session.
//!
//! A [`Session`] owns the live render tree for one client. It serializes the
//! three things that may touch the tree:
//!
//! - [`Session::rebuild`] / [`Session::mount`]: build, reconcile, swap.
//! - [`Session::dispatch`]: route a client interaction.
//! - [`Session::flush`]: rebuild after invalidations and emit patches.
//!
//! Producer callbacks never reach the tree directly; they only mark addresses
//! dirty on the [`SessionHandle`].
//!
//! # Failure Modes
//!
//! - A build error leaves the previous tree, its markup and its resources
//!   untouched. The error is returned to the caller.
//! - A dispatch aimed at an address that does not exist (stale client markup,
//!   malformed input) is absorbed: logged at debug level and reported as
//!   [`InvokeOutcome::Stale`].
//! - Dropping the session cancels every resource the tree holds.

use std::fmt;
use std::sync::Arc;

use livetree_core::ElementId;
use serde::Serialize;
use serde_json::Value;
use web_time::Instant;

use crate::builder::{BuildError, TreeBuilder, View};
use crate::config::{ConfigError, SessionConfig};
use crate::dispatch::{self, Interaction};
use crate::handle::{ActiveTimer, Notifier, SessionHandle};
use crate::node::{BoxNode, InvokeContext, InvokeOutcome, RenderNode, find_node, render_html, resource_ids};
use crate::reconcile::{self, ReconcileReport};
use crate::resource::ResourceId;

/// Replacement markup for one subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
    /// Address of the replaced subtree.
    pub element_id: ElementId,
    /// DOM id of the element to replace.
    pub web_id: String,
    /// New outer HTML of the subtree.
    pub html: String,
}

impl Patch {
    fn render(node: &dyn RenderNode) -> Self {
        Self {
            element_id: node.element_id().clone(),
            web_id: node.element_id().web_id(),
            html: render_html(node),
        }
    }
}

/// Cumulative session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Successful builds.
    pub builds: u64,
    /// Builds that returned an error.
    pub failed_builds: u64,
    /// Interactions received.
    pub dispatched: u64,
    /// Interactions that ran an action.
    pub fired: u64,
    /// Interactions absorbed as stale.
    pub absorbed: u64,
    /// Patches emitted by [`Session::flush`].
    pub patches: u64,
}

/// The live render tree for one client.
pub struct Session {
    builder: TreeBuilder,
    handle: SessionHandle,
    view: Option<Arc<dyn View>>,
    root: Option<BoxNode>,
    stats: SessionStats,
}

impl Session {
    /// Create a session with a validated configuration.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            builder: TreeBuilder::new(config),
            handle: SessionHandle::new(),
            view: None,
            root: None,
            stats: SessionStats::default(),
        })
    }

    /// Call `notify` for every invalidated address, from whichever thread
    /// invalidated it. Typically used to schedule a [`flush`](Self::flush).
    #[must_use]
    pub fn with_notifier(self, notify: impl Fn(&ElementId) + Send + Sync + 'static) -> Self {
        let notifier: Notifier = Arc::new(notify);
        self.handle.set_notifier(Some(notifier));
        self
    }

    /// Shared invalidation handle.
    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        self.builder.config()
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Build `view` as the page and return its markup.
    pub fn mount(&mut self, view: impl View) -> Result<String, BuildError> {
        self.rebuild(Arc::new(view))?;
        Ok(self.html())
    }

    /// Replace the page with `view`, keeping every still-valid resource.
    ///
    /// On error the previous tree stays live and unchanged.
    pub fn rebuild(&mut self, view: Arc<dyn View>) -> Result<ReconcileReport, BuildError> {
        let _span = tracing::debug_span!("rebuild", session = self.handle.session_id()).entered();
        let started = Instant::now();

        let mut next = match self.builder.build_root(&*view, &self.handle) {
            Ok(next) => next,
            Err(err) => {
                self.stats.failed_builds += 1;
                tracing::warn!(error = %err, "build failed; previous tree kept");
                return Err(err);
            }
        };

        let mut report = ReconcileReport::default();
        if let Some(previous) = self.root.as_mut() {
            reconcile::reconcile(&mut *next, &mut **previous, &mut report);
        }
        reconcile::activate(&mut *next, &self.handle, &mut report);

        let previous = self.root.replace(next);
        if let Some(previous) = previous {
            debug_assert!(
                self.root
                    .as_deref()
                    .is_some_and(|next| reconcile::ownership_is_exclusive(next, Some(&*previous))),
                "resource held by more than one node after reconciliation"
            );
            report.cancelled = resource_ids(&*previous).len();
            drop(previous);
        }
        self.view = Some(view);
        self.stats.builds += 1;

        tracing::debug!(
            transferred = report.transferred,
            replaced = report.replaced,
            attached = report.attached,
            cancelled = report.cancelled,
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "rebuild complete"
        );
        Ok(report)
    }

    /// Markup of the whole page. Empty before the first successful build.
    #[must_use]
    pub fn html(&self) -> String {
        self.root.as_deref().map(render_html).unwrap_or_default()
    }

    /// Root of the live tree.
    #[must_use]
    pub fn root(&self) -> Option<&dyn RenderNode> {
        self.root.as_deref()
    }

    /// The live node at `element_id`.
    #[must_use]
    pub fn node(&self, element_id: &ElementId) -> Option<&dyn RenderNode> {
        self.root
            .as_deref()
            .and_then(|root| find_node(root, element_id))
    }

    /// Route an interaction decoded from the client.
    pub fn dispatch(&mut self, interaction: &Interaction) -> InvokeOutcome {
        match interaction.target() {
            Ok(target) => self.dispatch_to(&target, interaction.payload.as_ref()),
            Err(err) => {
                self.stats.dispatched += 1;
                self.absorb(&err);
                InvokeOutcome::Stale
            }
        }
    }

    /// Route an interaction given as a raw JSON message.
    pub fn dispatch_json(&mut self, message: &str) -> InvokeOutcome {
        match Interaction::from_json(message) {
            Ok(interaction) => self.dispatch(&interaction),
            Err(err) => {
                self.stats.dispatched += 1;
                self.absorb(&err);
                InvokeOutcome::Stale
            }
        }
    }

    /// Route an interaction aimed at a DOM id such as `e.0._`.
    pub fn dispatch_web_id(&mut self, web_id: &str, payload: Option<&Value>) -> InvokeOutcome {
        match ElementId::from_web_id(web_id) {
            Ok(target) => self.dispatch_to(&target, payload),
            Err(err) => {
                self.stats.dispatched += 1;
                self.absorb(&err);
                InvokeOutcome::Stale
            }
        }
    }

    /// Route an interaction aimed at `target`.
    pub fn dispatch_to(&mut self, target: &ElementId, payload: Option<&Value>) -> InvokeOutcome {
        let _span = tracing::debug_span!(
            "dispatch",
            session = self.handle.session_id(),
            target = %target
        )
        .entered();
        self.stats.dispatched += 1;

        let Some(root) = self.root.as_deref() else {
            tracing::debug!("no tree mounted; interaction dropped");
            self.stats.absorbed += 1;
            return InvokeOutcome::Stale;
        };
        let cx = InvokeContext::new(payload, &self.handle);
        match dispatch::route(root, target, &cx) {
            Ok(outcome) => {
                if outcome == InvokeOutcome::Fired {
                    self.stats.fired += 1;
                }
                outcome
            }
            Err(err) => {
                self.absorb(&err);
                InvokeOutcome::Stale
            }
        }
    }

    fn absorb(&mut self, err: &dyn std::error::Error) {
        self.stats.absorbed += 1;
        tracing::debug!(error = %err, "interaction absorbed");
    }

    /// Rebuild after invalidations and return one patch per dirty subtree.
    ///
    /// Dirty addresses are coalesced (a dirty ancestor covers its dirty
    /// descendants) and emitted in address order. Addresses that no longer
    /// exist after the rebuild are dropped. If the rebuild fails the dirty
    /// set is restored and the error returned.
    pub fn flush(&mut self) -> Result<Vec<Patch>, BuildError> {
        let dirty = self.handle.take_dirty();
        if dirty.is_empty() {
            return Ok(Vec::new());
        }
        let Some(view) = self.view.clone() else {
            tracing::trace!(dirty = dirty.len(), "flush before mount; dropping invalidations");
            return Ok(Vec::new());
        };
        if let Err(err) = self.rebuild(view) {
            self.handle.requeue(dirty);
            return Err(err);
        }

        let patches: Vec<Patch> = dirty
            .iter()
            .filter_map(|id| self.node(id).map(Patch::render))
            .collect();
        self.stats.patches += patches.len() as u64;
        tracing::debug!(dirty = dirty.len(), patches = patches.len(), "flushed");
        Ok(patches)
    }

    /// IDs of every resource the live tree holds.
    #[must_use]
    pub fn live_resources(&self) -> Vec<ResourceId> {
        self.root.as_deref().map(resource_ids).unwrap_or_default()
    }

    /// ID of the resource held by the node at `element_id`.
    #[must_use]
    pub fn resource_at(&self, element_id: &ElementId) -> Option<ResourceId> {
        self.node(element_id)?.resource().map(|resource| resource.id())
    }

    /// Client timers the live tree holds.
    #[must_use]
    pub fn active_timers(&self) -> Vec<ActiveTimer> {
        self.handle.active_timers()
    }

    /// Drop the live tree, cancelling every resource. Returns how many were
    /// cancelled.
    pub fn teardown(&mut self) -> usize {
        let cancelled = self
            .root
            .take()
            .map_or(0, |root| resource_ids(&*root).len());
        self.view = None;
        self.handle.clear_dirty();
        if cancelled > 0 {
            tracing::debug!(session = self.handle.session_id(), cancelled, "session torn down");
        }
        cancelled
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            builder: TreeBuilder::default(),
            handle: SessionHandle::new(),
            view: None,
            root: None,
            stats: SessionStats::default(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("mounted", &self.root.is_some())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
