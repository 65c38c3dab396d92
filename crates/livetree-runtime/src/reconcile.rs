#![forbid(unsafe_code)]

//! Identity-preserving reconciliation.
//!
//! A rebuild produces a complete new tree before anything live changes.
//! Reconciliation then pairs every new node with the previous node at the
//! same address and lets it adopt what is still valid:
//!
//! 1. [`reconcile`]: compatible wrapping nodes move the predecessor's
//!    resource and identity slot into the successor.
//! 2. [`activate`]: wrapping nodes still without a resource attach one.
//! 3. The caller drops the previous tree; resources nobody adopted cancel on
//!    drop.
//!
//! Addresses are the identity. A node whose address did not exist before, or
//! whose predecessor was a different kind of node, starts fresh.
//!
//! Both trees are walked together: a child can only have a predecessor under
//! the predecessor of its parent, so each container pairs its children with
//! the previous container's children by last address component.

use std::collections::HashSet;

use ahash::AHashMap;
use livetree_core::IdComponent;
use serde::Serialize;

use crate::handle::SessionHandle;
use crate::node::{Adoption, RenderNode, resource_ids, walk_mut};

/// Counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Resources moved from a predecessor.
    pub transferred: usize,
    /// Predecessors whose resource was incompatible with the successor.
    pub replaced: usize,
    /// Resources newly attached.
    pub attached: usize,
    /// Resources cancelled with the previous tree.
    pub cancelled: usize,
}

/// Move identity-bound state from `previous` into `next`, address by address.
///
/// `next` and `previous` are the nodes at one address (normally both roots).
pub fn reconcile(
    next: &mut dyn RenderNode,
    previous: &mut dyn RenderNode,
    report: &mut ReconcileReport,
) {
    if next.element_id() != previous.element_id() {
        return;
    }
    match next.adopt_from(&mut *previous) {
        Adoption::Transferred(_) => report.transferred += 1,
        Adoption::Replaced => report.replaced += 1,
        Adoption::Fresh | Adoption::NotApplicable => {}
    }

    let children = next.children_mut();
    if children.is_empty() {
        return;
    }
    let mut predecessors: AHashMap<IdComponent, &mut dyn RenderNode> = previous
        .children_mut()
        .into_iter()
        .filter_map(|child| {
            let component = child.element_id().last()?.clone();
            Some((component, child))
        })
        .collect();
    for child in children {
        let Some(component) = child.element_id().last() else {
            continue;
        };
        if let Some(predecessor) = predecessors.remove(component) {
            reconcile(child, predecessor, report);
        }
    }
}

/// Attach resources for every node that still needs one.
pub fn activate(next: &mut dyn RenderNode, session: &SessionHandle, report: &mut ReconcileReport) {
    walk_mut(next, &mut |node| {
        if node.activate(session) {
            report.attached += 1;
        }
    });
}

/// Whether every resource in `next` is held exactly once and none is still
/// held by `previous`.
#[must_use]
pub fn ownership_is_exclusive(next: &dyn RenderNode, previous: Option<&dyn RenderNode>) -> bool {
    let mut seen = HashSet::new();
    if !resource_ids(next).into_iter().all(|id| seen.insert(id)) {
        return false;
    }
    previous.is_none_or(|previous| resource_ids(previous).iter().all(|id| !seen.contains(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{TreeBuilder, View};
    use crate::node::{BoxNode, InvokeContext, InvokeOutcome, resource_ids};
    use crate::reactive::Broadcaster;
    use crate::resource::{Resource, ResourceKind};
    use crate::views::{Stack, Text, ViewExt};
    use livetree_core::ElementId;
    use std::any::Any;
    use std::time::Duration;

    /// Node holding an arbitrary resource, for ownership checks.
    struct Holder {
        element_id: ElementId,
        resource: Option<Resource>,
        children: Vec<BoxNode>,
    }

    impl Holder {
        fn boxed(element_id: ElementId, resource: Option<Resource>, children: Vec<BoxNode>) -> BoxNode {
            Box::new(Self {
                element_id,
                resource,
                children,
            })
        }
    }

    impl RenderNode for Holder {
        fn element_id(&self) -> &ElementId {
            &self.element_id
        }

        fn kind(&self) -> &'static str {
            "holder"
        }

        fn generate_html(&self, _html: &mut String) {}

        fn invoke(&self, _target: &ElementId, _cx: &InvokeContext<'_>) -> InvokeOutcome {
            InvokeOutcome::Unmatched
        }

        fn children(&self) -> Vec<&dyn RenderNode> {
            self.children.iter().map(|c| &**c).collect()
        }

        fn children_mut(&mut self) -> Vec<&mut dyn RenderNode> {
            self.children.iter_mut().map(|c| &mut **c).collect()
        }

        fn resource(&self) -> Option<&Resource> {
            self.resource.as_ref()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn timer_resource(owner: &ElementId) -> Resource {
        Resource::new(ResourceKind::Timer, owner.clone(), ())
    }

    fn build(view: &dyn View, session: &SessionHandle) -> BoxNode {
        TreeBuilder::default().build_root(view, session).unwrap()
    }

    fn run(next: &mut BoxNode, previous: Option<&mut BoxNode>, session: &SessionHandle) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if let Some(previous) = previous {
            reconcile(&mut **next, &mut **previous, &mut report);
        }
        activate(&mut **next, session, &mut report);
        report
    }

    #[test]
    fn first_build_attaches_everything() {
        let session = SessionHandle::new();
        let source: Broadcaster<u8> = Broadcaster::new();
        let view = Stack::new()
            .child(Text::new("a").timer())
            .child(Text::new("b").on_receive(source.clone(), |_: &u8| {}));
        let mut tree = build(&view, &session);

        let report = run(&mut tree, None, &session);
        assert_eq!(report.attached, 2);
        assert_eq!(source.subscriber_count(), 1);
        assert_eq!(session.active_timers().len(), 1);
        assert!(ownership_is_exclusive(&*tree, None));
    }

    #[test]
    fn same_view_rebuild_transfers_everything() {
        let session = SessionHandle::new();
        let source: Broadcaster<u8> = Broadcaster::new();
        let view = Stack::new()
            .child(Text::new("a").timer())
            .child(Text::new("b").on_receive(source.clone(), |_: &u8| {}));
        let mut first = build(&view, &session);
        run(&mut first, None, &session);
        let before = resource_ids(&*first);

        let mut second = build(&view, &session);
        let report = run(&mut second, Some(&mut first), &session);

        assert_eq!(report.transferred, 2);
        assert_eq!(report.attached, 0);
        assert_eq!(resource_ids(&*second), before);
        assert!(resource_ids(&*first).is_empty());
        assert!(ownership_is_exclusive(&*second, Some(&*first)));
        drop(first);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn changed_interval_replaces_timer() {
        let session = SessionHandle::new();
        let mut first = build(&Text::new("t").timer().interval(Duration::from_secs(1)), &session);
        run(&mut first, None, &session);

        let mut second = build(&Text::new("t").timer().interval(Duration::from_secs(2)), &session);
        let report = run(&mut second, Some(&mut first), &session);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.attached, 1);
        assert_eq!(resource_ids(&*first).len(), 1);

        drop(first);
        let timers = session.active_timers();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].interval, Duration::from_secs(2));
    }

    #[test]
    fn node_moved_to_new_address_starts_fresh() {
        let session = SessionHandle::new();
        let source: Broadcaster<u8> = Broadcaster::new();
        let wrapped = |s: &Broadcaster<u8>| Text::new("v").on_receive(s.clone(), |_: &u8| {});

        let mut first = build(&Stack::new().child(wrapped(&source)), &session);
        run(&mut first, None, &session);

        let moved = Stack::new().child(Text::new("new")).child(wrapped(&source));
        let mut second = build(&moved, &session);
        let report = run(&mut second, Some(&mut first), &session);
        assert_eq!(report.transferred, 0);
        assert_eq!(report.attached, 1);

        drop(first);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn resource_held_twice_in_next_is_not_exclusive() {
        let a = ElementId::root().child(IdComponent::Index(0));
        let b = ElementId::root().child(IdComponent::Index(1));
        let original = timer_resource(&a);
        let copy = original.aliased();
        let tree = Holder::boxed(
            ElementId::root(),
            None,
            vec![
                Holder::boxed(a, Some(original), vec![]),
                Holder::boxed(b, Some(copy), vec![]),
            ],
        );
        assert!(!ownership_is_exclusive(&*tree, None));
    }

    #[test]
    fn resource_still_held_by_previous_is_not_exclusive() {
        let a = ElementId::root().child(IdComponent::Index(0));
        let resource = timer_resource(&a);
        let stale = resource.aliased();
        let single = |resource: Resource| {
            Holder::boxed(ElementId::root(), None, vec![Holder::boxed(a.clone(), Some(resource), vec![])])
        };
        let next = single(resource);
        let previous = single(stale);
        assert!(!ownership_is_exclusive(&*next, Some(&*previous)));

        let unrelated = single(timer_resource(&a));
        assert!(ownership_is_exclusive(&*next, Some(&*unrelated)));
    }

    #[test]
    fn wide_stack_pairs_children_by_address() {
        let session = SessionHandle::new();
        let view = (0..64).fold(Stack::new(), |stack, i| {
            if i % 2 == 0 {
                stack.child(Text::new(format!("t{i}")).timer())
            } else {
                stack.keyed(format!("k{i}"), Text::new("k").timer())
            }
        });
        let mut first = build(&view, &session);
        run(&mut first, None, &session);
        let before = resource_ids(&*first);

        let mut second = build(&view, &session);
        let report = run(&mut second, Some(&mut first), &session);
        assert_eq!(report.transferred, 64);
        assert_eq!(report.attached, 0);
        assert_eq!(resource_ids(&*second), before);
    }

    #[test]
    fn mismatched_roots_adopt_nothing() {
        let session = SessionHandle::new();
        let mut previous = build(&Text::new("t").timer(), &session);
        run(&mut previous, None, &session);

        let mut next = Holder::boxed(ElementId::root().child(IdComponent::Index(0)), None, vec![]);
        let mut report = ReconcileReport::default();
        reconcile(&mut *next, &mut *previous, &mut report);
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(resource_ids(&*previous).len(), 1);
    }
}
