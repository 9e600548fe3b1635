#![forbid(unsafe_code)]

//! The single final selection and the breadcrumb built from it.
//!
//! Checking a node both marks it and walks the active path down to it:
//! a collapsed node is expanded through the [`ExpansionController`], so the
//! sibling-exclusive rule applies to checks as well. The selection is only
//! ever a checked node with no known children; a checked branch is just a
//! step on the path.

use tracing::debug;

use crate::expansion::{Expansion, ExpansionController, collapse_subtree};
use crate::forest::{Forest, StoreError};
use crate::jurisdiction::JurisdictionId;
use crate::node::NodeState;
use crate::path::NodePath;

/// Separator used between ancestor names in a breadcrumb.
pub const DEFAULT_SEPARATOR: &str = " > ";

/// Tracks which node (if any) is the final selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: Option<NodePath>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&NodePath> {
        self.selected.as_ref()
    }

    /// Flip the check on `path`.
    ///
    /// Checking a collapsed node expands it (possibly starting a fetch).
    /// Unchecking collapses the node's loaded subtree. A checked node with no
    /// known children becomes the selection; checking a branch clears it.
    pub fn toggle_check(
        &mut self,
        controller: &mut ExpansionController,
        forest: &Forest,
        path: &NodePath,
    ) -> Result<Expansion, StoreError> {
        let node = forest
            .get(path)
            .ok_or_else(|| StoreError::UnknownNode(path.clone()))?;
        let checked = !node.is_checked();
        let next = forest.set_checked(path, checked)?;

        let expansion = if checked && !node.is_expanded() {
            controller.toggle_expand(&next, path)?
        } else if checked {
            Expansion::unchanged(&next, true)
        } else {
            Expansion::unchanged(&collapse_subtree(&next, path)?, false)
        };

        self.settle(&expansion.forest, path);
        self.reconcile(&expansion.forest);
        debug!(
            target: "jtree.select",
            path = %path,
            checked,
            selected = ?self.selected.as_ref().map(ToString::to_string),
            "check toggled"
        );
        Ok(expansion)
    }

    /// Re-apply the selection rule to `path` after its children settled
    /// (or after an expand/collapse): a checked leaf is selected, a branch
    /// never is.
    pub fn on_children_settled(&mut self, forest: &Forest, path: &NodePath) {
        self.settle(forest, path);
        self.reconcile(forest);
    }

    /// Drop a selection that no longer points at a checked leaf.
    pub fn reconcile(&mut self, forest: &Forest) {
        let valid = self
            .selected
            .as_ref()
            .and_then(|path| forest.get(path))
            .is_some_and(|node| node.is_checked() && node.is_selectable_leaf());
        if !valid && self.selected.is_some() {
            debug!(target: "jtree.select", "selection dropped");
            self.selected = None;
        }
    }

    /// Clear the selection and collapse every root's loaded subtree.
    ///
    /// Fetches already in flight are left alone; their children are still
    /// stored when they arrive.
    pub fn clear_selection(&mut self, forest: &Forest) -> Result<Forest, StoreError> {
        self.selected = None;
        let mut next = forest.clone();
        for root in forest.roots() {
            next = collapse_subtree(&next, &root)?;
        }
        debug!(target: "jtree.select", "selection cleared");
        Ok(next)
    }

    /// Breadcrumb of the current selection, or `None` if nothing is selected.
    #[must_use]
    pub fn breadcrumb(&self, forest: &Forest, separator: &str) -> Option<String> {
        full_path(forest, self.selected.as_ref()?, separator)
    }

    fn settle(&mut self, forest: &Forest, path: &NodePath) {
        let Some(node) = forest.get(path) else {
            return;
        };
        if node.is_branch() {
            if node.is_checked() {
                self.selected = None;
            }
        } else if node.is_checked() {
            self.selected = Some(path.clone());
        } else if self.selected.as_ref() == Some(path) {
            self.selected = None;
        }
    }
}

/// Ancestor names of `path` joined by `separator`, root first.
///
/// `None` if any node on the path is not loaded.
#[must_use]
pub fn full_path(forest: &Forest, path: &NodePath, separator: &str) -> Option<String> {
    let names = path
        .ancestors()
        .map(|ancestor| forest.get(&ancestor).map(NodeState::name))
        .collect::<Option<Vec<&str>>>()?;
    Some(names.join(separator))
}

/// [`full_path`] for the first node in display order carrying `id`.
///
/// Ids are only unique among siblings, so this can be ambiguous; prefer
/// [`full_path`] when the node's path is known.
#[must_use]
pub fn full_path_by_id(forest: &Forest, id: JurisdictionId, separator: &str) -> Option<String> {
    let (path, _) = forest.walk().find(|(path, _)| path.id() == id)?;
    full_path(forest, &path, separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction::Jurisdiction;

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    fn usa() -> Forest {
        Forest::from_roots(vec![Jurisdiction::new(1, "USA"), Jurisdiction::new(2, "Canada")])
            .unwrap()
            .set_children(&p("1"), vec![Jurisdiction::new(4, "California")])
            .unwrap()
            .set_children(&p("1/4"), vec![Jurisdiction::new(5, "Alameda")])
            .unwrap()
    }

    #[test]
    fn full_path_joins_names_root_first() {
        let forest = usa();
        assert_eq!(
            full_path(&forest, &p("1/4/5"), DEFAULT_SEPARATOR).as_deref(),
            Some("USA > California > Alameda")
        );
        assert_eq!(full_path(&forest, &p("2"), "/").as_deref(), Some("Canada"));
        assert_eq!(full_path(&forest, &p("1/9"), DEFAULT_SEPARATOR), None);
    }

    #[test]
    fn full_path_by_id_uses_first_match() {
        let forest = usa()
            .set_children(&p("2"), vec![Jurisdiction::new(5, "Ontario")])
            .unwrap();
        assert_eq!(
            full_path_by_id(&forest, JurisdictionId(5), DEFAULT_SEPARATOR).as_deref(),
            Some("USA > California > Alameda")
        );
        assert_eq!(full_path_by_id(&forest, JurisdictionId(99), DEFAULT_SEPARATOR), None);
    }

    #[test]
    fn checking_an_unfetched_node_selects_it_and_starts_fetch() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let exp = sel.toggle_check(&mut ctl, &usa(), &p("2")).unwrap();
        assert!(exp.fetch.is_some());
        assert_eq!(sel.selected(), Some(&p("2")));
        let node = exp.forest.get(&p("2")).unwrap();
        assert!(node.is_checked() && node.is_expanded());
    }

    #[test]
    fn checking_a_branch_clears_selection() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let forest = sel.toggle_check(&mut ctl, &usa(), &p("2")).unwrap().forest;
        assert!(sel.selected().is_some());
        let exp = sel.toggle_check(&mut ctl, &forest, &p("1")).unwrap();
        assert!(exp.fetch.is_none());
        assert_eq!(sel.selected(), None);
        assert!(!exp.forest.get(&p("2")).unwrap().is_checked());
    }

    #[test]
    fn unchecking_collapses_subtree_and_drops_selection() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let forest = sel.toggle_check(&mut ctl, &usa(), &p("1")).unwrap().forest;
        let forest = sel.toggle_check(&mut ctl, &forest, &p("1/4")).unwrap().forest;
        let forest = sel.toggle_check(&mut ctl, &forest, &p("1/4/5")).unwrap().forest;
        assert_eq!(sel.selected(), Some(&p("1/4/5")));

        let forest = sel.toggle_check(&mut ctl, &forest, &p("1")).unwrap().forest;
        assert_eq!(sel.selected(), None);
        for (_, node) in forest.subtree(&p("1")) {
            assert!(!node.is_checked() && !node.is_expanded());
        }
    }

    #[test]
    fn settled_children_turn_selection_off() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let exp = sel.toggle_check(&mut ctl, &usa(), &p("2")).unwrap();
        let ticket = exp.fetch.unwrap();
        let forest = ctl
            .complete_fetch(&exp.forest, &ticket, Ok(vec![Jurisdiction::new(7, "Ontario")]))
            .unwrap()
            .forest;
        sel.on_children_settled(&forest, &p("2"));
        assert_eq!(sel.selected(), None);
        assert!(forest.get(&p("2")).unwrap().is_checked());
    }

    #[test]
    fn settled_empty_children_keep_selection() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let exp = sel.toggle_check(&mut ctl, &usa(), &p("2")).unwrap();
        let ticket = exp.fetch.unwrap();
        let forest = ctl
            .complete_fetch(&exp.forest, &ticket, Ok(Vec::new()))
            .unwrap()
            .forest;
        sel.on_children_settled(&forest, &p("2"));
        assert_eq!(sel.selected(), Some(&p("2")));
        assert_eq!(sel.breadcrumb(&forest, DEFAULT_SEPARATOR).as_deref(), Some("Canada"));
    }

    #[test]
    fn clear_selection_collapses_every_root() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let forest = sel.toggle_check(&mut ctl, &usa(), &p("1")).unwrap().forest;
        let forest = sel.toggle_check(&mut ctl, &forest, &p("1/4")).unwrap().forest;
        let forest = sel.clear_selection(&forest).unwrap();
        assert_eq!(sel.selected(), None);
        assert_eq!(sel.breadcrumb(&forest, DEFAULT_SEPARATOR), None);
        assert!(forest.walk().all(|(_, n)| !n.is_checked() && !n.is_expanded()));
        assert!(forest.get(&p("1/4")).unwrap().is_branch());
    }

    #[test]
    fn reconcile_drops_unchecked_selection() {
        let mut ctl = ExpansionController::default();
        let mut sel = SelectionTracker::new();
        let forest = sel.toggle_check(&mut ctl, &usa(), &p("2")).unwrap().forest;
        let forest = forest.set_checked(&p("2"), false).unwrap();
        sel.reconcile(&forest);
        assert_eq!(sel.selected(), None);
    }
}
