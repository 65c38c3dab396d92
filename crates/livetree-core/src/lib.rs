#![forbid(unsafe_code)]

//! Core primitives for livetree.
//!
//! This crate provides:
//! - [`ElementId`] for hierarchical, positionally stable node addresses and
//!   their web encoding
//! - [`html`] helpers for escaped markup and inline-script string literals

pub mod element_id;
pub mod html;

pub use element_id::{AddressError, ElementId, IdComponent, WEB_ID_ROOT, WEB_ID_SEPARATOR};
