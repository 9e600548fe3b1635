#![forbid(unsafe_code)]

//! Presentation adapters for jtree.
//!
//! [`Outline`] turns a [`SelectorSnapshot`](jtree_runtime::SelectorSnapshot)
//! into rows with guide characters, or straight into text.

pub mod outline;

pub use outline::{
    Disclosure, NOTHING_SELECTED, NodeRow, Outline, OutlineGuides, OutlineRow, RowKind,
};
