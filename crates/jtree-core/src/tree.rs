#![forbid(unsafe_code)]

//! [`JurisdictionTree`]: one selector session.
//!
//! Bundles the current [`Forest`] snapshot with the expansion and selection
//! state so callers deal with a single `&mut` value. Operations return the
//! fetch work they create ([`TreeEffects`]); nothing here performs I/O.

use crate::expansion::{
    Expansion, ExpansionController, FetchOutcome, FetchTicket, StaleFetchPolicy,
};
use crate::forest::{Forest, StoreError};
use crate::jurisdiction::{Jurisdiction, JurisdictionId};
use crate::path::NodePath;
use crate::selection::{DEFAULT_SEPARATOR, SelectionTracker, full_path, full_path_by_id};
use crate::source::SourceError;

/// Fetch work produced by a tree operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeEffects {
    /// Child fetch to start.
    pub fetch: Option<FetchTicket>,
    /// Fetches to cancel.
    pub cancelled: Vec<FetchTicket>,
}

impl TreeEffects {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fetch.is_none() && self.cancelled.is_empty()
    }
}

impl From<Expansion> for TreeEffects {
    fn from(expansion: Expansion) -> Self {
        Self {
            fetch: expansion.fetch,
            cancelled: expansion.cancelled,
        }
    }
}

/// Forest, expansion and selection for one picker.
#[derive(Debug)]
pub struct JurisdictionTree {
    forest: Forest,
    expansion: ExpansionController,
    selection: SelectionTracker,
    separator: String,
}

impl JurisdictionTree {
    /// Session over `roots` with the default stale-fetch policy.
    pub fn new(roots: Vec<Jurisdiction>) -> Result<Self, StoreError> {
        Self::with_policy(roots, StaleFetchPolicy::default())
    }

    pub fn with_policy(
        roots: Vec<Jurisdiction>,
        policy: StaleFetchPolicy,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            forest: Forest::from_roots(roots)?,
            expansion: ExpansionController::new(policy),
            selection: SelectionTracker::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
        })
    }

    /// Use `separator` between names in [`breadcrumb`](Self::breadcrumb).
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Current snapshot. Cheap to clone and safe to keep.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    #[must_use]
    pub fn selected(&self) -> Option<&NodePath> {
        self.selection.selected()
    }

    /// Outstanding fetches whose results are still wanted.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.expansion.in_flight()
    }

    /// The outstanding fetch for `path`, if one is wanted.
    #[must_use]
    pub fn ticket_for(&self, path: &NodePath) -> Option<&FetchTicket> {
        self.expansion.ticket_for(path)
    }

    #[must_use]
    pub fn policy(&self) -> StaleFetchPolicy {
        self.expansion.policy()
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn toggle_expand(&mut self, path: &NodePath) -> Result<TreeEffects, StoreError> {
        let expansion = self.expansion.toggle_expand(&self.forest, path)?;
        self.forest = expansion.forest.clone();
        self.selection.on_children_settled(&self.forest, path);
        Ok(expansion.into())
    }

    pub fn toggle_check(&mut self, path: &NodePath) -> Result<TreeEffects, StoreError> {
        let expansion = self
            .selection
            .toggle_check(&mut self.expansion, &self.forest, path)?;
        self.forest = expansion.forest.clone();
        Ok(expansion.into())
    }

    /// Clear the selection and collapse everything. In-flight fetches keep
    /// running.
    pub fn clear_selection(&mut self) -> Result<(), StoreError> {
        self.forest = self.selection.clear_selection(&self.forest)?;
        Ok(())
    }

    /// Feed a fetch result back in.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<Jurisdiction>, SourceError>,
    ) -> Result<FetchOutcome, StoreError> {
        let completion = self
            .expansion
            .complete_fetch(&self.forest, ticket, result)?;
        self.forest = completion.forest;
        if completion.outcome != FetchOutcome::Stale {
            self.selection.on_children_settled(&self.forest, ticket.path());
        }
        Ok(completion.outcome)
    }

    /// Forget every outstanding fetch (session teardown).
    pub fn cancel_all(&mut self) -> Vec<FetchTicket> {
        self.expansion.cancel_all()
    }

    #[must_use]
    pub fn full_path(&self, path: &NodePath) -> Option<String> {
        full_path(&self.forest, path, &self.separator)
    }

    #[must_use]
    pub fn full_path_by_id(&self, id: JurisdictionId) -> Option<String> {
        full_path_by_id(&self.forest, id, &self.separator)
    }

    /// Breadcrumb of the selection, `None` when nothing is selected.
    #[must_use]
    pub fn breadcrumb(&self) -> Option<String> {
        self.selection.breadcrumb(&self.forest, &self.separator)
    }
}
