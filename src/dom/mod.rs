//! Reference host document
//!
//! An in-memory element tree with listeners, bubbling dispatch, mutation
//! observers and a CSS selector subset. Used by the CLI and by tests; any
//! other [`crate::host::Host`] implementation can stand in for it.

mod document;
pub mod selector;

pub use document::{Document, NodeSpec};
pub use selector::{ElementTree, Selector};
