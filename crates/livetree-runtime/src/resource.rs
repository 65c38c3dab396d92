#![forbid(unsafe_code)]

//! Owned external resources.
//!
//! A [`Resource`] is the subscription or timer lease held by a wrapping node.
//! It is owned by exactly one node at a time and cancels itself on drop, so a
//! superseded node that did not hand its resource to a successor cannot leak
//! it. Transfer during reconciliation is a plain Rust move.
//!
//! Each resource carries a process-unique [`ResourceId`] so reconciliation
//! can check that no resource ends up held twice and tests can observe that
//! a resource was moved rather than recreated.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use livetree_core::ElementId;

/// Global counter for unique resource IDs.
static RESOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an attached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(RESOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// What kind of external resource a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A registration with an external [`Publisher`](crate::reactive::Publisher).
    Subscription,
    /// A recurring client-side refresh trigger registered on the session.
    Timer,
}

impl ResourceKind {
    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Timer => "timer",
        }
    }
}

/// An external resource owned by a single wrapping node.
///
/// Dropping the resource cancels it.
#[must_use = "dropping a Resource cancels it immediately"]
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    owner: ElementId,
    _guard: Box<dyn Send>,
}

impl Resource {
    /// Wrap a cancellation guard. `guard` is dropped when the resource is.
    pub fn new(kind: ResourceKind, owner: ElementId, guard: impl Send + 'static) -> Self {
        let id = ResourceId::next();
        tracing::trace!(resource = %id, kind = kind.as_str(), owner = %owner, "resource attached");
        Self {
            id,
            kind,
            owner,
            _guard: Box::new(guard),
        }
    }

    /// Identity of this resource.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resource kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Address of the node the resource was attached for.
    #[must_use]
    pub fn owner(&self) -> &ElementId {
        &self.owner
    }

    /// Cancel explicitly. Equivalent to dropping the resource.
    pub fn cancel(self) {
        drop(self);
    }

    /// A second resource reporting the same id, for ownership checks.
    #[cfg(test)]
    pub(crate) fn aliased(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            owner: self.owner.clone(),
            _guard: Box::new(()),
        }
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        tracing::trace!(
            resource = %self.id,
            kind = self.kind.as_str(),
            owner = %self.owner,
            "resource cancelled"
        );
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
