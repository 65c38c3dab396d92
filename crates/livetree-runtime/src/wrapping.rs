#![forbid(unsafe_code)]

//! Wrapping nodes.
//!
//! A [`WrappingNode`] decorates exactly one content child with an external
//! resource (a publisher subscription or a client timer) and a client-side
//! refresh trigger. The variant-specific parts live in a [`WrapBehavior`];
//! the node itself owns the lifecycle:
//!
//! ```text
//! Unattached --resume--> Active --take-over--> Superseded
//!      |                   |  ^
//!      |                   +--+ resume (cancel, then attach)
//!      +--take-over (compatible predecessor)--> Active
//! ```
//!
//! # Identity Slot
//!
//! Each node owns an `Arc<B::Slot>` that its resource callback reaches
//! through a `Weak`. Taking over a predecessor moves both the resource and
//! the slot, so a value delivered before the rebuild is still visible to the
//! successor and the callback keeps writing into the live node.

use std::any::Any;
use std::fmt::{self, Write};
use std::sync::{Arc, Weak};
use std::time::Duration;

use livetree_core::ElementId;
use livetree_core::html::{js_string_literal, open_tag_with_id};

use crate::handle::SessionHandle;
use crate::node::{Adoption, BoxNode, InvokeContext, InvokeOutcome, RenderNode};
use crate::resource::{Resource, ResourceId};

/// Client-side refresh trigger emitted before a wrapping node's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTrigger {
    client_object: Arc<str>,
    interval: Duration,
    message: Option<String>,
}

impl ClientTrigger {
    /// Create a trigger calling `client_object.valueCommit` every `interval`.
    #[must_use]
    pub fn new(client_object: &str, interval: Duration, message: Option<String>) -> Self {
        Self {
            client_object: Arc::from(client_object),
            interval,
            message,
        }
    }

    /// Tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Console message logged on each tick.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Append the inline script for the node at `web_id`.
    pub fn write_script(&self, html: &mut String, web_id: &str) {
        html.push_str("<script>setInterval(() => {");
        if let Some(message) = &self.message {
            let _ = write!(html, "console.log({});", js_string_literal(message));
        }
        let _ = write!(
            html,
            "{}.valueCommit({})}}, {});</script>",
            self.client_object,
            js_string_literal(web_id),
            self.interval.as_millis()
        );
    }
}

/// Variant-specific behavior of a wrapping node.
pub trait WrapBehavior: Send + 'static {
    /// State shared between the node and its resource callback. Moves with
    /// the resource on take-over.
    type Slot: Default + Send + Sync + 'static;

    /// Node kind name.
    const KIND: &'static str;

    /// Acquire the external resource for the node at `element_id`.
    fn attach(
        &self,
        element_id: &ElementId,
        slot: Weak<Self::Slot>,
        session: &SessionHandle,
    ) -> Resource;

    /// Whether a resource attached by `previous` is still valid for `self`.
    fn is_compatible(&self, previous: &Self) -> bool;

    /// Run the node's own action for an interaction addressed to it.
    fn fire(&self, element_id: &ElementId, slot: &Self::Slot, cx: &InvokeContext<'_>)
    -> InvokeOutcome;
}

/// Lifecycle state of a wrapping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapState {
    /// Built, no resource yet.
    Unattached,
    /// Holds a live resource.
    Active,
    /// Handed its resource and slot to a successor.
    Superseded,
}

/// A node that owns an external resource and wraps one content child.
pub struct WrappingNode<B: WrapBehavior> {
    element_id: ElementId,
    behavior: B,
    trigger: ClientTrigger,
    slot: Arc<B::Slot>,
    resource: Option<Resource>,
    content: BoxNode,
    superseded: bool,
}

impl<B: WrapBehavior> WrappingNode<B> {
    /// Create an unattached node.
    #[must_use]
    pub fn new(element_id: ElementId, behavior: B, trigger: ClientTrigger, content: BoxNode) -> Self {
        debug_assert!(
            element_id.encloses(content.element_id()) && &element_id != content.element_id(),
            "content must live below its wrapper"
        );
        Self {
            element_id,
            behavior,
            trigger,
            slot: Arc::new(B::Slot::default()),
            resource: None,
            content,
            superseded: false,
        }
    }

    /// Build a successor at the same address with new content, taking over
    /// this node's resource when `behavior` is compatible.
    #[must_use]
    pub fn rebuild_with_content(&mut self, behavior: B, content: BoxNode) -> Self {
        let mut next = Self::new(
            self.element_id.clone(),
            behavior,
            self.trigger.clone(),
            content,
        );
        next.take_over(self);
        next
    }

    /// (Re)acquire the resource. Any existing resource is cancelled first.
    pub fn resume(&mut self, session: &SessionHandle) -> ResourceId {
        if let Some(previous) = self.resource.take() {
            previous.cancel();
        }
        let resource = self
            .behavior
            .attach(&self.element_id, Arc::downgrade(&self.slot), session);
        let id = resource.id();
        tracing::debug!(
            kind = B::KIND,
            element = %self.element_id,
            resource = %id,
            "wrapping node resumed"
        );
        self.resource = Some(resource);
        self.superseded = false;
        id
    }

    /// Take the resource and slot of `previous` when compatible.
    pub fn take_over(&mut self, previous: &mut Self) -> Adoption {
        debug_assert_eq!(self.element_id, previous.element_id);
        if !self.behavior.is_compatible(&previous.behavior) {
            tracing::debug!(
                kind = B::KIND,
                element = %self.element_id,
                "incompatible predecessor; resource will be replaced"
            );
            return Adoption::Replaced;
        }
        let Some(resource) = previous.resource.take() else {
            return Adoption::Fresh;
        };
        if let Some(stale) = self.resource.take() {
            stale.cancel();
        }
        self.slot = std::mem::take(&mut previous.slot);
        previous.superseded = true;
        let id = resource.id();
        self.resource = Some(resource);
        tracing::trace!(kind = B::KIND, element = %self.element_id, resource = %id, "resource transferred");
        Adoption::Transferred(id)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WrapState {
        match (&self.resource, self.superseded) {
            (Some(_), _) => WrapState::Active,
            (None, true) => WrapState::Superseded,
            (None, false) => WrapState::Unattached,
        }
    }

    /// The wrapped content node.
    #[must_use]
    pub fn content(&self) -> &dyn RenderNode {
        &*self.content
    }

    /// The variant behavior.
    #[must_use]
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    /// The identity slot shared with the resource callback.
    #[must_use]
    pub fn slot(&self) -> &B::Slot {
        &self.slot
    }

    /// The client refresh trigger.
    #[must_use]
    pub fn trigger(&self) -> &ClientTrigger {
        &self.trigger
    }

    /// ID of the held resource, if any.
    #[must_use]
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.resource.as_ref().map(Resource::id)
    }
}

impl<B: WrapBehavior> RenderNode for WrappingNode<B> {
    fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    fn kind(&self) -> &'static str {
        B::KIND
    }

    fn generate_html(&self, html: &mut String) {
        let web_id = self.element_id.web_id();
        open_tag_with_id(html, "div", &web_id);
        html.push('>');
        self.trigger.write_script(html, &web_id);
        self.content.generate_html(html);
        html.push_str("</div>");
    }

    fn invoke(&self, target: &ElementId, cx: &InvokeContext<'_>) -> InvokeOutcome {
        if !self.element_id.encloses(target) {
            return InvokeOutcome::Unmatched;
        }
        if &self.element_id == target {
            return self.behavior.fire(&self.element_id, &self.slot, cx);
        }
        self.content.invoke(target, cx)
    }

    fn children(&self) -> Vec<&dyn RenderNode> {
        vec![&*self.content]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn RenderNode> {
        vec![&mut *self.content]
    }

    fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    fn adopt_from(&mut self, previous: &mut dyn RenderNode) -> Adoption {
        match previous.as_any_mut().downcast_mut::<Self>() {
            Some(previous) => self.take_over(previous),
            None => Adoption::Fresh,
        }
    }

    fn activate(&mut self, session: &SessionHandle) -> bool {
        if self.resource.is_some() {
            return false;
        }
        self.resume(session);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<B: WrapBehavior> fmt::Debug for WrappingNode<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappingNode")
            .field("kind", &B::KIND)
            .field("element_id", &self.element_id)
            .field("state", &self.state())
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
