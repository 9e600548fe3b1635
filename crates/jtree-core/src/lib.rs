#![forbid(unsafe_code)]

//! Lazy-loading jurisdiction tree state.
//!
//! This crate holds the state machine behind a jurisdiction picker: a forest
//! of jurisdictions (country, state, county, ...) that is fetched one level at
//! a time, expanded one branch per depth, and checked down to a single
//! selected node.
//!
//! # Key Components
//!
//! - [`Forest`] - persistent node table keyed by [`NodePath`] (the Tree Node Store)
//! - [`ExpansionController`] - sibling-exclusive expansion and fetch bookkeeping
//! - [`SelectionTracker`] - the single selected node and its breadcrumb
//! - [`JurisdictionTree`] - the owned session bundling the three
//! - [`JurisdictionSource`] - the data source contract (roots and children)
//!
//! # How it fits in the system
//! `jtree-core` performs no I/O. Operations return new [`Forest`] snapshots
//! plus [`FetchTicket`]s describing the fetches the caller must run; the
//! runtime crate executes those against a [`JurisdictionSource`] and feeds the
//! results back through [`JurisdictionTree::complete_fetch`].

pub mod cancellation;
pub mod expansion;
pub mod forest;
pub mod jurisdiction;
pub mod node;
pub mod path;
pub mod selection;
pub mod source;
pub mod tree;

pub use cancellation::{CancellationSource, CancellationToken};
pub use expansion::{
    Expansion, ExpansionController, FetchCompletion, FetchOutcome, FetchTicket, StaleFetchPolicy,
    collapse_subtree, force_collapse,
};
pub use forest::{Forest, StoreError};
pub use jurisdiction::{Jurisdiction, JurisdictionId};
pub use node::NodeState;
pub use path::{NodePath, PathParseError};
pub use selection::{DEFAULT_SEPARATOR, SelectionTracker, full_path, full_path_by_id};
pub use source::{JurisdictionSource, SourceError};
pub use tree::{JurisdictionTree, TreeEffects};
