#![forbid(unsafe_code)]

//! Render nodes.
//!
//! A [`RenderNode`] is the compiled form of one view description node. It
//! knows its [`ElementId`], writes its markup, accepts interactions routed by
//! address, and takes part in reconciliation by adopting identity-bound state
//! (resources, cached values) from the node that previously held its address.
//!
//! Nodes are never mutated structurally from the outside: a rebuild produces a
//! fresh tree, and each new node asks its predecessor to hand over whatever is
//! still valid.
//!
//! # Routing Contract
//!
//! `invoke(target)` on a node at address `A`:
//! - `A` does not enclose `target` → [`InvokeOutcome::Unmatched`], no effect.
//! - `A == target` → run the node's own action, if it has one.
//! - `target` is a strict descendant → delegate to the one child whose address
//!   encloses `target`. Sibling addresses never overlap, so there is no
//!   backtracking.

use std::any::Any;

use livetree_core::ElementId;
use serde_json::Value;

use crate::handle::SessionHandle;
use crate::resource::{Resource, ResourceId};

/// Owned, type-erased render node.
pub type BoxNode = Box<dyn RenderNode>;

/// Result of routing an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The exact target node ran its action.
    Fired,
    /// The exact target exists but has nothing to act on yet (no value has
    /// arrived from its producer).
    Pending,
    /// No node at the target address has an action.
    Unmatched,
    /// The address does not belong to the live tree (stale or malformed
    /// client reference). Only reported by the session, which absorbs the
    /// underlying dispatch error.
    Stale,
}

/// What a node did with its predecessor's state during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adoption {
    /// The node has no identity-bound state.
    NotApplicable,
    /// No usable predecessor state; the node starts unattached.
    Fresh,
    /// The predecessor's resource moved into this node.
    Transferred(ResourceId),
    /// The predecessor's resource is incompatible and will be cancelled with
    /// the predecessor.
    Replaced,
}

/// Per-dispatch context handed down the tree.
#[derive(Debug, Clone, Copy)]
pub struct InvokeContext<'a> {
    payload: Option<&'a Value>,
    session: &'a SessionHandle,
}

impl<'a> InvokeContext<'a> {
    /// Create a context for one routed interaction.
    #[must_use]
    pub fn new(payload: Option<&'a Value>, session: &'a SessionHandle) -> Self {
        Self { payload, session }
    }

    /// The interaction payload, opaque to the routing layer.
    #[must_use]
    pub fn payload(&self) -> Option<&'a Value> {
        self.payload
    }

    /// The session the tree belongs to.
    #[must_use]
    pub fn session(&self) -> &'a SessionHandle {
        self.session
    }
}

/// A node of the live render tree.
pub trait RenderNode: Send + 'static {
    /// Address of this node.
    fn element_id(&self) -> &ElementId;

    /// Short node kind name for logs and diagnostics.
    fn kind(&self) -> &'static str;

    /// Append this node's markup (including its subtree) to `html`.
    fn generate_html(&self, html: &mut String);

    /// Route an interaction addressed at `target`.
    fn invoke(&self, target: &ElementId, cx: &InvokeContext<'_>) -> InvokeOutcome;

    /// Direct children, in address order.
    fn children(&self) -> Vec<&dyn RenderNode> {
        Vec::new()
    }

    /// Direct children, mutably.
    fn children_mut(&mut self) -> Vec<&mut dyn RenderNode> {
        Vec::new()
    }

    /// The external resource currently owned by this node.
    fn resource(&self) -> Option<&Resource> {
        None
    }

    /// Take over identity-bound state from the node that held this address in
    /// the previous tree.
    fn adopt_from(&mut self, _previous: &mut dyn RenderNode) -> Adoption {
        Adoption::NotApplicable
    }

    /// Attach an external resource if the node needs one and holds none.
    /// Returns `true` when a resource was attached.
    fn activate(&mut self, _session: &SessionHandle) -> bool {
        false
    }

    /// Upcast for downcasting to the concrete node type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete node type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Render a node (and its subtree) to a fresh string.
#[must_use]
pub fn render_html(node: &dyn RenderNode) -> String {
    let mut html = String::new();
    node.generate_html(&mut html);
    html
}

/// Find the node at exactly `target`.
#[must_use]
pub fn find_node<'a>(node: &'a dyn RenderNode, target: &ElementId) -> Option<&'a dyn RenderNode> {
    if node.element_id() == target {
        return Some(node);
    }
    if !node.element_id().encloses(target) {
        return None;
    }
    node.children()
        .into_iter()
        .find(|child| child.element_id().encloses(target))
        .and_then(|child| find_node(child, target))
}

/// Find the node at exactly `target`, mutably.
pub fn find_node_mut<'a>(
    node: &'a mut dyn RenderNode,
    target: &ElementId,
) -> Option<&'a mut dyn RenderNode> {
    if node.element_id() == target {
        return Some(node);
    }
    if !node.element_id().encloses(target) {
        return None;
    }
    node.children_mut()
        .into_iter()
        .find(|child| child.element_id().encloses(target))
        .and_then(|child| find_node_mut(child, target))
}

/// Route `target` to the child that encloses it.
///
/// Shared by container-like nodes: returns [`InvokeOutcome::Unmatched`] when
/// no child owns the address.
pub fn invoke_children(
    children: &[BoxNode],
    target: &ElementId,
    cx: &InvokeContext<'_>,
) -> InvokeOutcome {
    children
        .iter()
        .find(|child| child.element_id().encloses(target))
        .map_or(InvokeOutcome::Unmatched, |child| child.invoke(target, cx))
}

/// Visit every node of the subtree in pre-order.
pub fn walk<'a>(node: &'a dyn RenderNode, visit: &mut dyn FnMut(&'a dyn RenderNode)) {
    visit(node);
    for child in node.children() {
        walk(child, visit);
    }
}

/// Visit every node of the subtree in pre-order, mutably.
pub fn walk_mut(node: &mut dyn RenderNode, visit: &mut dyn FnMut(&mut dyn RenderNode)) {
    visit(node);
    for child in node.children_mut() {
        walk_mut(child, visit);
    }
}

/// IDs of every resource held in the subtree, in pre-order.
#[must_use]
pub fn resource_ids(node: &dyn RenderNode) -> Vec<ResourceId> {
    let mut ids = Vec::new();
    walk(node, &mut |n| {
        if let Some(resource) = n.resource() {
            ids.push(resource.id());
        }
    });
    ids
}
