#![forbid(unsafe_code)]

//! Per-node state held by the [`Forest`](crate::Forest).

use im::Vector;

use crate::jurisdiction::{Jurisdiction, JurisdictionId};

/// A jurisdiction plus its lazy-loading and interaction flags.
///
/// Fields are read-only outside the crate; every change goes through a
/// [`Forest`](crate::Forest) mutation that produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub(crate) id: JurisdictionId,
    pub(crate) name: String,
    /// Child ids in source order. `None` until the first successful fetch.
    pub(crate) children: Option<Vector<JurisdictionId>>,
    pub(crate) expanded: bool,
    pub(crate) checked: bool,
    pub(crate) loading_children: bool,
    pub(crate) load_error: bool,
}

impl NodeState {
    /// Fresh, collapsed, unchecked, not-yet-fetched node.
    #[must_use]
    pub fn new(jurisdiction: Jurisdiction) -> Self {
        Self {
            id: jurisdiction.id,
            name: jurisdiction.name,
            children: None,
            expanded: false,
            checked: false,
            loading_children: false,
            load_error: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> JurisdictionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child ids, or `None` when children have not been fetched.
    #[must_use]
    pub fn children(&self) -> Option<&Vector<JurisdictionId>> {
        self.children.as_ref()
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    #[must_use]
    pub fn is_loading_children(&self) -> bool {
        self.loading_children
    }

    #[must_use]
    pub fn has_load_error(&self) -> bool {
        self.load_error
    }

    /// Children have been fetched (possibly an empty list).
    #[must_use]
    pub fn children_loaded(&self) -> bool {
        self.children.is_some()
    }

    /// Fetched and known to have no children.
    #[must_use]
    pub fn is_fetched_leaf(&self) -> bool {
        self.children.as_ref().is_some_and(Vector::is_empty)
    }

    /// Fetched and has at least one child.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Eligible to be the final selection: children absent or empty.
    #[must_use]
    pub fn is_selectable_leaf(&self) -> bool {
        !self.is_branch()
    }

    /// The record this node was built from.
    #[must_use]
    pub fn jurisdiction(&self) -> Jurisdiction {
        Jurisdiction {
            id: self.id,
            name: self.name.clone(),
        }
    }
}
