#![forbid(unsafe_code)]

//! Hierarchical element addresses.
//!
//! An [`ElementId`] is the ordered path of [`IdComponent`]s that identifies a
//! render node's position in the tree. Addresses are assigned positionally
//! while the tree builder walks a view description, so two builds of the same
//! view shape produce the same addresses and node identity survives
//! reconciliation.
//!
//! # Invariants
//!
//! 1. Two addresses are equal iff their component sequences are equal.
//! 2. `a.encloses(b)` iff `a` is a prefix of `b` (ancestor-or-equal).
//! 3. Balanced `push`/`pop` sequences leave the address unchanged.
//! 4. [`ElementId::web_id`] and [`ElementId::from_web_id`] are exact inverses.
//!    The same string is used for DOM ids, embedded client scripts and
//!    inbound routing, so every component token must be unambiguous.
//!
//! # Web Encoding
//!
//! | Component | Token |
//! |-----------|-------|
//! | root | `e` (prefix of every web id) |
//! | `Index(n)` | decimal `n`, no leading zeros |
//! | `Key(k)` | `k`, matching `[A-Za-z][A-Za-z0-9_-]*` |
//! | `Content` | `_` |
//!
//! Tokens are joined with `.`: the content child of the third root child is
//! `e.2._`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Leading token of every web id; stands for the root address.
pub const WEB_ID_ROOT: &str = "e";

/// Separator between web id tokens.
pub const WEB_ID_SEPARATOR: char = '.';

const CONTENT_TOKEN: &str = "_";

/// Errors produced while parsing or constructing addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The web id did not start with the root token.
    #[error("web id {0:?} does not start with the root token")]
    MissingRoot(String),
    /// Two separators in a row, or a trailing separator.
    #[error("empty address component")]
    EmptyComponent,
    /// A token that is neither an index, a key nor the content marker.
    #[error("invalid address component {0:?}")]
    InvalidComponent(String),
}

/// One hierarchical level of an [`ElementId`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdComponent {
    /// Positional child of a container.
    Index(u32),
    /// Explicitly keyed child of a container.
    Key(Arc<str>),
    /// The single child of a wrapping node.
    Content,
}

impl IdComponent {
    /// Create a keyed component, validating the key text.
    pub fn key(name: &str) -> Result<Self, AddressError> {
        if is_valid_key(name) {
            Ok(Self::Key(Arc::from(name)))
        } else {
            Err(AddressError::InvalidComponent(name.to_owned()))
        }
    }

    /// Parse a single web id token.
    pub fn parse(token: &str) -> Result<Self, AddressError> {
        if token.is_empty() {
            return Err(AddressError::EmptyComponent);
        }
        if token == CONTENT_TOKEN {
            return Ok(Self::Content);
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            // Leading zeros would alias another token.
            if token.len() > 1 && token.starts_with('0') {
                return Err(AddressError::InvalidComponent(token.to_owned()));
            }
            return token
                .parse::<u32>()
                .map(Self::Index)
                .map_err(|_| AddressError::InvalidComponent(token.to_owned()));
        }
        Self::key(token)
    }
}

impl fmt::Display for IdComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => f.write_str(key),
            Self::Content => f.write_str(CONTENT_TOKEN),
        }
    }
}

impl From<u32> for IdComponent {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

fn is_valid_key(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        }
        _ => false,
    }
}

/// Hierarchical address of a render node.
///
/// The empty address is the root. Most trees are shallow, so components are
/// stored inline up to eight levels.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ElementId {
    components: SmallVec<[IdComponent; 8]>,
}

impl ElementId {
    /// The root address (no components).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build an address from its components.
    pub fn from_components(components: impl IntoIterator<Item = IdComponent>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    /// Parse the routing path delivered by the transport (tokens without the
    /// root prefix).
    pub fn from_path<I, S>(path: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let components = path
            .into_iter()
            .map(|token| IdComponent::parse(token.as_ref()))
            .collect::<Result<SmallVec<_>, _>>()?;
        Ok(Self { components })
    }

    /// Parse a full web id such as `e.0._`.
    pub fn from_web_id(web_id: &str) -> Result<Self, AddressError> {
        let mut tokens = web_id.split(WEB_ID_SEPARATOR);
        if tokens.next() != Some(WEB_ID_ROOT) {
            return Err(AddressError::MissingRoot(web_id.to_owned()));
        }
        Self::from_path(tokens)
    }

    /// Extend the address by one level.
    pub fn push(&mut self, component: IdComponent) {
        self.components.push(component);
    }

    /// Remove the deepest level. Returns `None` at the root.
    pub fn pop(&mut self) -> Option<IdComponent> {
        self.components.pop()
    }

    /// A new address one level below `self`.
    #[must_use]
    pub fn child(&self, component: IdComponent) -> Self {
        let mut child = self.clone();
        child.push(component);
        child
    }

    /// The enclosing address, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        parent.pop().map(|_| parent)
    }

    /// Number of components.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Whether this is the root address.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The component sequence.
    #[must_use]
    pub fn components(&self) -> &[IdComponent] {
        &self.components
    }

    /// The deepest component, if any.
    #[must_use]
    pub fn last(&self) -> Option<&IdComponent> {
        self.components.last()
    }

    /// Whether `self` is an ancestor of, or equal to, `other`.
    #[must_use]
    pub fn encloses(&self, other: &ElementId) -> bool {
        other.components.starts_with(&self.components)
    }

    /// Whether `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &ElementId) -> bool {
        self.depth() < other.depth() && self.encloses(other)
    }

    /// The string encoding shared by DOM ids, client scripts and routing.
    #[must_use]
    pub fn web_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(WEB_ID_ROOT)?;
        for component in &self.components {
            write!(f, "{WEB_ID_SEPARATOR}{component}")?;
        }
        Ok(())
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.web_id()
    }
}

impl TryFrom<String> for ElementId {
    type Error = AddressError;

    fn try_from(web_id: String) -> Result<Self, Self::Error> {
        Self::from_web_id(&web_id)
    }
}

impl std::str::FromStr for ElementId {
    type Err = AddressError;

    fn from_str(web_id: &str) -> Result<Self, Self::Err> {
        Self::from_web_id(web_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(components: &[IdComponent]) -> ElementId {
        ElementId::from_components(components.iter().cloned())
    }

    #[test]
    fn root_web_id() {
        assert_eq!(ElementId::root().web_id(), "e");
        assert!(ElementId::root().is_root());
        assert_eq!(ElementId::root().parent(), None);
    }

    #[test]
    fn web_id_encoding() {
        let key = IdComponent::key("sidebar").unwrap();
        let eid = id(&[IdComponent::Index(2), key, IdComponent::Content]);
        assert_eq!(eid.web_id(), "e.2.sidebar._");
        assert_eq!(ElementId::from_web_id("e.2.sidebar._").unwrap(), eid);
    }

    #[test]
    fn from_path_matches_web_id() {
        let from_path = ElementId::from_path(["0", "_", "12"]).unwrap();
        let from_web = ElementId::from_web_id("e.0._.12").unwrap();
        assert_eq!(from_path, from_web);
        assert_eq!(ElementId::from_path(Vec::<String>::new()).unwrap(), ElementId::root());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(
            ElementId::from_web_id("x.0"),
            Err(AddressError::MissingRoot("x.0".into()))
        );
        assert_eq!(ElementId::from_web_id("e..0"), Err(AddressError::EmptyComponent));
        assert_eq!(ElementId::from_web_id("e.0."), Err(AddressError::EmptyComponent));
        assert!(matches!(
            ElementId::from_web_id("e.01"),
            Err(AddressError::InvalidComponent(_))
        ));
        assert!(matches!(
            ElementId::from_web_id("e.9999999999"),
            Err(AddressError::InvalidComponent(_))
        ));
        assert!(matches!(
            ElementId::from_path(["-x"]),
            Err(AddressError::InvalidComponent(_))
        ));
    }

    #[test]
    fn key_validation() {
        assert!(IdComponent::key("item-3_b").is_ok());
        assert!(IdComponent::key("").is_err());
        assert!(IdComponent::key("3abc").is_err());
        assert!(IdComponent::key("a.b").is_err());
        assert!(IdComponent::key("a'b").is_err());
    }

    #[test]
    fn encloses_is_prefix() {
        let parent = id(&[IdComponent::Index(1)]);
        let child = parent.child(IdComponent::Content);
        let sibling = id(&[IdComponent::Index(2)]);

        assert!(parent.encloses(&parent));
        assert!(parent.encloses(&child));
        assert!(!child.encloses(&parent));
        assert!(!parent.encloses(&sibling));
        assert!(ElementId::root().encloses(&child));

        assert!(parent.is_ancestor_of(&child));
        assert!(!parent.is_ancestor_of(&parent));
    }

    #[test]
    fn index_one_does_not_enclose_index_ten() {
        let one = id(&[IdComponent::Index(1)]);
        let ten = id(&[IdComponent::Index(10)]);
        assert!(!one.encloses(&ten));
    }

    #[test]
    fn ancestors_sort_before_descendants() {
        let a = id(&[IdComponent::Index(0)]);
        let b = a.child(IdComponent::Index(5));
        let c = id(&[IdComponent::Index(1)]);
        let mut ids = vec![c.clone(), b.clone(), a.clone()];
        ids.sort();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn serde_uses_web_id() {
        let eid = id(&[IdComponent::Index(3), IdComponent::Content]);
        let json = serde_json::to_string(&eid).unwrap();
        assert_eq!(json, "\"e.3._\"");
        let back: ElementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, eid);
        assert!(serde_json::from_str::<ElementId>("\"q.1\"").is_err());
    }

    fn component_strategy() -> impl Strategy<Value = IdComponent> {
        prop_oneof![
            any::<u32>().prop_map(IdComponent::Index),
            "[a-z][a-z0-9_-]{0,6}".prop_map(|k| IdComponent::key(&k).unwrap()),
            Just(IdComponent::Content),
        ]
    }

    proptest! {
        #[test]
        fn balanced_push_pop_restores_address(
            start in prop::collection::vec(component_strategy(), 0..6),
            pushed in prop::collection::vec(component_strategy(), 0..12),
        ) {
            let mut eid = ElementId::from_components(start);
            let before = eid.clone();
            for component in pushed.iter().cloned() {
                eid.push(component);
            }
            for _ in &pushed {
                eid.pop();
            }
            prop_assert_eq!(eid, before);
        }

        #[test]
        fn web_id_parses_back(components in prop::collection::vec(component_strategy(), 0..10)) {
            let eid = ElementId::from_components(components);
            let parsed = ElementId::from_web_id(&eid.web_id()).unwrap();
            prop_assert_eq!(parsed, eid);
        }

        #[test]
        fn child_is_strict_descendant(
            components in prop::collection::vec(component_strategy(), 0..8),
            extra in component_strategy(),
        ) {
            let parent = ElementId::from_components(components);
            let child = parent.child(extra);
            prop_assert_eq!(child.depth(), parent.depth() + 1);
            prop_assert!(parent.is_ancestor_of(&child));
            prop_assert_eq!(child.parent(), Some(parent));
        }
    }
}
