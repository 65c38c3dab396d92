#![forbid(unsafe_code)]

//! View descriptions and tree construction.
//!
//! A [`View`] is an immutable description of part of a page. Building turns
//! the description into a tree of [`RenderNode`](crate::node::RenderNode)s,
//! assigning every node an address from the [`BuildContext`]'s current
//! [`ElementId`].
//!
//! # Address Discipline
//!
//! Descending into a child is always done through [`BuildContext::enter`],
//! which pushes one component and returns an [`IdScope`] guard that pops it
//! when dropped. Pushes and pops therefore stay balanced on every path,
//! including early returns through `?`. After a build step returns, the
//! context holds the same address it held before.
//!
//! A wrapping view builds its content under [`IdComponent::Content`] first,
//! then takes its own address from the restored context. The content's
//! address is thus always the wrapper's address plus one `Content` step.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use livetree_core::{AddressError, ElementId, IdComponent};

use crate::config::SessionConfig;
use crate::handle::SessionHandle;
use crate::node::BoxNode;
use crate::wrapping::ClientTrigger;

/// Errors that abort a build. The live tree is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Two children of one container share a key.
    #[error("duplicate key {key:?} under {parent}")]
    DuplicateKey { parent: ElementId, key: String },
    /// A child key is not a valid address component.
    #[error("invalid key {key:?} under {parent}: {source}")]
    InvalidKey {
        parent: ElementId,
        key: String,
        #[source]
        source: AddressError,
    },
    /// A container has more positional children than an index can hold.
    #[error("too many children under {parent}")]
    TooManyChildren { parent: ElementId },
    /// The tree is deeper than the configured limit.
    #[error("view tree exceeds depth {max_depth} at {at}")]
    DepthExceeded { at: ElementId, max_depth: usize },
    /// A view rejected its own inputs.
    #[error("invalid view at {at}: {reason}")]
    InvalidView { at: ElementId, reason: String },
}

/// Immutable description of a page fragment.
///
/// Views are shared between rebuilds, so they must be `Send + Sync`. Any
/// state that outlives a build belongs in a publisher or in the nodes'
/// adopted slots, never in the view.
pub trait View: Send + Sync + 'static {
    /// Build the node for this view at the context's current address.
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError>;
}

impl<V: View + ?Sized> View for Box<V> {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        (**self).build_tree(cx)
    }
}

impl<V: View + ?Sized> View for std::sync::Arc<V> {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        (**self).build_tree(cx)
    }
}

/// Owned, type-erased view.
pub type AnyView = Box<dyn View>;

/// Stateless tree builder bound to a configuration.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    config: SessionConfig,
}

impl TreeBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// The configuration views read defaults from.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build `view` at the context's current address.
    ///
    /// This is the single entry point for building any view; containers call
    /// it (through [`BuildContext::build_child`]) for each child.
    pub fn build_tree(
        &self,
        view: &dyn View,
        cx: &mut BuildContext<'_>,
    ) -> Result<BoxNode, BuildError> {
        cx.nodes_built += 1;
        view.build_tree(cx)
    }

    /// Build a whole tree rooted at the empty address.
    pub fn build_root(
        &self,
        view: &dyn View,
        session: &SessionHandle,
    ) -> Result<BoxNode, BuildError> {
        let mut cx = BuildContext::new(self, session);
        let root = self.build_tree(view, &mut cx)?;
        debug_assert!(cx.element_id().is_root(), "unbalanced address stack");
        tracing::trace!(nodes = cx.nodes_built, "tree built");
        Ok(root)
    }

    /// Client trigger for a wrapping node at `element_id`.
    ///
    /// `interval` and `message` fall back to the configured defaults.
    #[must_use]
    pub fn client_trigger(
        &self,
        element_id: &ElementId,
        interval: Option<Duration>,
        message: Option<&str>,
    ) -> ClientTrigger {
        let message = match message {
            Some(message) => Some(message.to_owned()),
            None if self.config.diagnostics => Some(format!("livetree tick {element_id}")),
            None => None,
        };
        ClientTrigger::new(
            self.config.client_object.as_str(),
            interval.unwrap_or_else(|| self.config.refresh_interval()),
            message,
        )
    }
}

/// Mutable state threaded through one build.
pub struct BuildContext<'a> {
    builder: &'a TreeBuilder,
    session: &'a SessionHandle,
    element_id: ElementId,
    nodes_built: usize,
}

impl<'a> BuildContext<'a> {
    /// Start a build at the root address.
    #[must_use]
    pub fn new(builder: &'a TreeBuilder, session: &'a SessionHandle) -> Self {
        Self {
            builder,
            session,
            element_id: ElementId::root(),
            nodes_built: 0,
        }
    }

    /// Address of the node currently being built.
    #[must_use]
    pub fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    /// The builder running this build.
    #[must_use]
    pub fn builder(&self) -> &'a TreeBuilder {
        self.builder
    }

    /// The session the tree is built for.
    #[must_use]
    pub fn session(&self) -> &'a SessionHandle {
        self.session
    }

    /// Number of views built so far.
    #[must_use]
    pub fn nodes_built(&self) -> usize {
        self.nodes_built
    }

    /// Descend one level. The component is popped when the guard drops.
    pub fn enter(&mut self, component: IdComponent) -> Result<IdScope<'_, 'a>, BuildError> {
        let max_depth = self.builder.config().max_depth;
        if self.element_id.depth() >= max_depth {
            return Err(BuildError::DepthExceeded {
                at: self.element_id.clone(),
                max_depth,
            });
        }
        self.element_id.push(component);
        Ok(IdScope { cx: self })
    }

    /// Build `view` one level below the current address.
    pub fn build_child(
        &mut self,
        component: IdComponent,
        view: &dyn View,
    ) -> Result<BoxNode, BuildError> {
        let builder = self.builder;
        let mut scope = self.enter(component)?;
        builder.build_tree(view, &mut *scope)
    }

    /// Build the single content child of a wrapping view.
    ///
    /// Returns the wrapper's own address together with the built content.
    pub fn build_content(&mut self, content: &dyn View) -> Result<(ElementId, BoxNode), BuildError> {
        let node = self.build_child(IdComponent::Content, content)?;
        Ok((self.element_id.clone(), node))
    }
}

impl std::fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("element_id", &self.element_id)
            .field("nodes_built", &self.nodes_built)
            .finish_non_exhaustive()
    }
}

/// Guard for one level of the address stack.
///
/// Dereferences to the [`BuildContext`] positioned at the child address.
#[must_use = "the address is popped as soon as the scope drops"]
pub struct IdScope<'s, 'a> {
    cx: &'s mut BuildContext<'a>,
}

impl<'a> Deref for IdScope<'_, 'a> {
    type Target = BuildContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for IdScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}

impl Drop for IdScope<'_, '_> {
    fn drop(&mut self) {
        self.cx.element_id.pop();
    }
}
