#![forbid(unsafe_code)]

//! Client interaction routing.
//!
//! The client reports an interaction as a JSON message carrying the target
//! address (as path tokens) and an optional opaque payload:
//!
//! ```json
//! {"path": ["0", "_"], "payload": {"value": 3}}
//! ```
//!
//! [`route`] hands the interaction to the root node, which delegates by
//! address. Failures here are typed; the session decides what to absorb.

use livetree_core::{AddressError, ElementId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{InvokeContext, InvokeOutcome, RenderNode};

/// Errors raised while routing an interaction.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The target lies outside the tree rooted at `root`.
    #[error("address {target} is not routable from {root}")]
    Unroutable { target: ElementId, root: ElementId },
    /// The interaction named a malformed address.
    #[error(transparent)]
    Address(#[from] AddressError),
    /// The interaction message could not be decoded.
    #[error("malformed interaction: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A client interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Address tokens below the root.
    pub path: Vec<String>,
    /// Opaque event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Interaction {
    /// Interaction aimed at `target`.
    #[must_use]
    pub fn new(target: &ElementId, payload: Option<Value>) -> Self {
        Self {
            path: target.components().iter().map(ToString::to_string).collect(),
            payload,
        }
    }

    /// Decode a JSON interaction message.
    pub fn from_json(message: &str) -> Result<Self, DispatchError> {
        Ok(serde_json::from_str(message)?)
    }

    /// The target address.
    pub fn target(&self) -> Result<ElementId, AddressError> {
        ElementId::from_path(&self.path)
    }
}

/// Route an interaction aimed at `target` into the tree at `root`.
pub fn route(
    root: &dyn RenderNode,
    target: &ElementId,
    cx: &InvokeContext<'_>,
) -> Result<InvokeOutcome, DispatchError> {
    if !root.element_id().encloses(target) {
        return Err(DispatchError::Unroutable {
            target: target.clone(),
            root: root.element_id().clone(),
        });
    }
    let outcome = root.invoke(target, cx);
    tracing::trace!(target = %target, ?outcome, "routed interaction");
    Ok(outcome)
}
