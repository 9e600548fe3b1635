#![forbid(unsafe_code)]

//! Persistent node table: the Tree Node Store.
//!
//! [`Forest`] is an arena of [`NodeState`]s keyed by [`NodePath`], stored in
//! `im` persistent collections. Cloning a forest is O(1) and every mutation
//! returns a new snapshot that shares all untouched nodes with its input, so
//! a Presentation Adapter can hold on to an old snapshot while the
//! controllers keep producing new ones.
//!
//! # Invariants
//!
//! 1. Every key's parent path (if any) is also a key, and lists the key's id
//!    among its children.
//! 2. Sibling ids are unique (paths would collide otherwise).
//! 3. A mutation that changes nothing returns a snapshot [`ptr_eq`](Forest::ptr_eq)
//!    to its input.
//! 4. Children, once set, are never replaced or removed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use im::{HashMap, Vector};

use crate::jurisdiction::{Jurisdiction, JurisdictionId};
use crate::node::NodeState;
use crate::path::NodePath;

/// Errors from [`Forest`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("node {0} is not in the loaded forest")]
    UnknownNode(NodePath),
    #[error("duplicate jurisdiction id {id} among {scope}")]
    DuplicateSibling { scope: String, id: JurisdictionId },
    #[error("children of {0} are already loaded")]
    ChildrenAlreadyLoaded(NodePath),
}

impl StoreError {
    fn duplicate(parent: Option<&NodePath>, id: JurisdictionId) -> Self {
        let scope = match parent {
            Some(path) => format!("children of {path}"),
            None => "roots".to_string(),
        };
        Self::DuplicateSibling { scope, id }
    }
}

/// Immutable snapshot of the loaded jurisdiction forest.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Forest {
    /// Fixed once built, so every snapshot shares the one allocation.
    roots: Arc<[JurisdictionId]>,
    nodes: HashMap<NodePath, NodeState>,
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("roots", &self.roots.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Forest {
    /// Build the initial forest from the root list.
    ///
    /// Every root starts collapsed, unchecked and unfetched.
    pub fn from_roots(
        roots: impl IntoIterator<Item = Jurisdiction>,
    ) -> Result<Self, StoreError> {
        let mut ids = Vec::new();
        let mut nodes = HashMap::new();
        for jurisdiction in roots {
            let path = NodePath::root(jurisdiction.id);
            if nodes.contains_key(&path) {
                return Err(StoreError::duplicate(None, jurisdiction.id));
            }
            ids.push(jurisdiction.id);
            nodes.insert(path, NodeState::new(jurisdiction));
        }
        Ok(Self {
            roots: ids.into(),
            nodes,
        })
    }

    // ====================================================================
    // Query
    // ====================================================================

    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<&NodeState> {
        self.nodes.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Number of loaded nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root paths in source order.
    pub fn roots(&self) -> impl Iterator<Item = NodePath> + '_ {
        self.roots.iter().map(|id| NodePath::root(*id))
    }

    /// Child paths of `path` in source order, or `None` if not yet fetched
    /// (or `path` is unknown).
    #[must_use]
    pub fn children_of(&self, path: &NodePath) -> Option<Vec<NodePath>> {
        let ids = self.nodes.get(path)?.children.as_ref()?;
        Some(ids.iter().map(|id| path.child(*id)).collect())
    }

    /// Depth-first walk over every loaded node in display order.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self, self.roots().collect(), WalkMode::All, None)
    }

    /// Depth-first walk over nodes whose ancestors are all expanded.
    pub fn visible(&self) -> Walk<'_> {
        Walk::new(self, self.roots().collect(), WalkMode::Visible, None)
    }

    /// `path` and all of its loaded descendants, depth-first.
    pub fn subtree(&self, path: &NodePath) -> Walk<'_> {
        let start = if self.contains(path) {
            vec![path.clone()]
        } else {
            Vec::new()
        };
        Walk::new(self, start, WalkMode::All, None)
    }

    /// Every loaded node at `depth`, found by walking down from the roots.
    #[must_use]
    pub fn at_depth(&self, depth: usize) -> Vec<NodePath> {
        Walk::new(self, self.roots().collect(), WalkMode::All, Some(depth))
            .filter(|(path, _)| path.depth() == depth)
            .map(|(path, _)| path)
            .collect()
    }

    /// How many nodes at `depth` are currently expanded.
    #[must_use]
    pub fn expanded_count_at_depth(&self, depth: usize) -> usize {
        self.at_depth(depth)
            .iter()
            .filter(|path| self.get(path).is_some_and(NodeState::is_expanded))
            .count()
    }

    /// Deepest depth present in the loaded forest, or `None` when empty.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.nodes.keys().map(NodePath::depth).max()
    }

    /// Whether both snapshots share the same underlying storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Forest) -> bool {
        self.nodes.ptr_eq(&other.nodes) && Arc::ptr_eq(&self.roots, &other.roots)
    }

    // ====================================================================
    // Mutation (each returns a new snapshot)
    // ====================================================================

    /// Apply `f` to a copy of the node at `path` and return the resulting
    /// snapshot. Returns a clone of `self` when `f` changes nothing.
    pub fn update_node(
        &self,
        path: &NodePath,
        f: impl FnOnce(&mut NodeState),
    ) -> Result<Forest, StoreError> {
        let current = self
            .nodes
            .get(path)
            .ok_or_else(|| StoreError::UnknownNode(path.clone()))?;
        let mut next = current.clone();
        f(&mut next);
        if next == *current {
            return Ok(self.clone());
        }
        let mut forest = self.clone();
        forest.nodes.insert(path.clone(), next);
        Ok(forest)
    }

    pub fn set_loading(&self, path: &NodePath, loading: bool) -> Result<Forest, StoreError> {
        self.update_node(path, |node| node.loading_children = loading)
    }

    pub fn set_error(&self, path: &NodePath, error: bool) -> Result<Forest, StoreError> {
        self.update_node(path, |node| node.load_error = error)
    }

    pub fn set_expanded(&self, path: &NodePath, expanded: bool) -> Result<Forest, StoreError> {
        self.update_node(path, |node| node.expanded = expanded)
    }

    pub fn set_checked(&self, path: &NodePath, checked: bool) -> Result<Forest, StoreError> {
        self.update_node(path, |node| node.checked = checked)
    }

    /// Attach fetched children to `path`.
    ///
    /// Children start collapsed, unchecked and unfetched. Fails if the node
    /// already has children or the list repeats an id.
    pub fn set_children(
        &self,
        path: &NodePath,
        children: Vec<Jurisdiction>,
    ) -> Result<Forest, StoreError> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| StoreError::UnknownNode(path.clone()))?;
        if node.children.is_some() {
            return Err(StoreError::ChildrenAlreadyLoaded(path.clone()));
        }
        let mut seen = HashSet::with_capacity(children.len());
        if let Some(dup) = children.iter().find(|j| !seen.insert(j.id)) {
            return Err(StoreError::duplicate(Some(path), dup.id));
        }

        let mut forest = self.clone();
        let mut ids = Vector::new();
        for child in children {
            ids.push_back(child.id);
            forest.nodes.insert(path.child(child.id), NodeState::new(child));
        }
        let mut parent = node.clone();
        parent.children = Some(ids);
        forest.nodes.insert(path.clone(), parent);
        Ok(forest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    All,
    Visible,
}

/// Depth-first iterator over `(path, node)` pairs in display order.
pub struct Walk<'a> {
    forest: &'a Forest,
    stack: Vec<NodePath>,
    mode: WalkMode,
    max_depth: Option<usize>,
}

impl<'a> Walk<'a> {
    fn new(
        forest: &'a Forest,
        mut start: Vec<NodePath>,
        mode: WalkMode,
        max_depth: Option<usize>,
    ) -> Self {
        start.reverse();
        Self {
            forest,
            stack: start,
            mode,
            max_depth,
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (NodePath, &'a NodeState);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.stack.pop()?;
            let Some(node) = self.forest.nodes.get(&path) else {
                continue;
            };
            let descend = match self.mode {
                WalkMode::All => true,
                WalkMode::Visible => node.expanded,
            } && self.max_depth.is_none_or(|max| path.depth() < max);
            if descend {
                if let Some(children) = &node.children {
                    for id in children.iter().rev() {
                        self.stack.push(path.child(*id));
                    }
                }
            }
            return Some((path, node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    fn usa() -> Forest {
        Forest::from_roots(vec![Jurisdiction::new(1, "USA"), Jurisdiction::new(2, "Canada")])
            .unwrap()
            .set_children(
                &p("1"),
                vec![
                    Jurisdiction::new(10, "California"),
                    Jurisdiction::new(11, "Oregon"),
                ],
            )
            .unwrap()
            .set_children(&p("1/10"), vec![Jurisdiction::new(5, "Alameda")])
            .unwrap()
    }

    #[test]
    fn from_roots_keeps_order_and_defaults() {
        let forest = usa();
        let roots: Vec<NodePath> = forest.roots().collect();
        assert_eq!(roots, vec![p("1"), p("2")]);
        let canada = forest.get(&p("2")).unwrap();
        assert!(!canada.children_loaded());
        assert!(!canada.is_expanded());
    }

    #[test]
    fn from_roots_rejects_duplicate_ids() {
        let err = Forest::from_roots(vec![Jurisdiction::new(1, "A"), Jurisdiction::new(1, "B")])
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateSibling {
                scope: "roots".into(),
                id: JurisdictionId(1)
            }
        );
    }

    #[test]
    fn set_children_creates_fresh_nodes() {
        let forest = usa();
        assert_eq!(forest.len(), 5);
        assert_eq!(forest.children_of(&p("1")).unwrap(), vec![p("1/10"), p("1/11")]);
        let cal = forest.get(&p("1/10")).unwrap();
        assert_eq!(cal.name(), "California");
        assert!(cal.is_branch());
        assert!(forest.get(&p("1/11")).unwrap().children().is_none());
    }

    #[test]
    fn set_children_never_replaces() {
        let err = usa().set_children(&p("1"), Vec::new()).unwrap_err();
        assert_eq!(err, StoreError::ChildrenAlreadyLoaded(p("1")));
    }

    #[test]
    fn set_children_rejects_duplicate_siblings() {
        let forest = usa();
        let err = forest
            .set_children(
                &p("2"),
                vec![Jurisdiction::new(3, "Ontario"), Jurisdiction::new(3, "Quebec")],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSibling { .. }));
        assert!(err.to_string().contains("children of 2"));
    }

    #[test]
    fn same_id_may_repeat_across_branches() {
        let forest = usa()
            .set_children(&p("2"), vec![Jurisdiction::new(10, "Ontario")])
            .unwrap();
        assert_eq!(forest.get(&p("1/10")).unwrap().name(), "California");
        assert_eq!(forest.get(&p("2/10")).unwrap().name(), "Ontario");
    }

    #[test]
    fn unknown_node_is_an_error() {
        let err = usa().set_expanded(&p("9"), true).unwrap_err();
        assert_eq!(err, StoreError::UnknownNode(p("9")));
    }

    #[test]
    fn noop_mutation_shares_storage() {
        let forest = usa();
        let same = forest.set_expanded(&p("1"), false).unwrap();
        assert!(same.ptr_eq(&forest));

        let changed = forest.set_expanded(&p("1"), true).unwrap();
        assert!(!changed.ptr_eq(&forest));
        assert!(!forest.get(&p("1")).unwrap().is_expanded());
        assert!(changed.get(&p("1")).unwrap().is_expanded());
    }

    #[test]
    fn noop_mutation_shares_storage_with_small_root_list() {
        let forest =
            Forest::from_roots(vec![Jurisdiction::new(1, "A"), Jurisdiction::new(2, "B")]).unwrap();
        let same = forest.set_expanded(&p("1"), false).unwrap();
        assert!(same.ptr_eq(&forest));
        assert!(forest.clone().ptr_eq(&forest));

        let loaded = forest.set_children(&p("2"), Vec::new()).unwrap();
        let again = loaded.set_checked(&p("1"), false).unwrap();
        assert!(again.ptr_eq(&loaded));
        assert!(!loaded.ptr_eq(&forest));
    }

    #[test]
    fn flag_setters_touch_only_their_flag() {
        let forest = usa()
            .set_loading(&p("2"), true)
            .unwrap()
            .set_error(&p("2"), true)
            .unwrap()
            .set_checked(&p("2"), true)
            .unwrap();
        let node = forest.get(&p("2")).unwrap();
        assert!(node.is_loading_children());
        assert!(node.has_load_error());
        assert!(node.is_checked());
        assert!(!node.is_expanded());
    }

    #[test]
    fn walk_is_depth_first_in_source_order() {
        let order: Vec<String> = usa().walk().map(|(path, _)| path.to_string()).collect();
        assert_eq!(order, vec!["1", "1/10", "1/10/5", "1/11", "2"]);
    }

    #[test]
    fn visible_stops_at_collapsed_nodes() {
        let forest = usa();
        let shown: Vec<String> = forest.visible().map(|(path, _)| path.to_string()).collect();
        assert_eq!(shown, vec!["1", "2"]);

        let forest = forest.set_expanded(&p("1"), true).unwrap();
        let shown: Vec<String> = forest.visible().map(|(path, _)| path.to_string()).collect();
        assert_eq!(shown, vec!["1", "1/10", "1/11", "2"]);
    }

    #[test]
    fn at_depth_spans_all_branches() {
        let forest = usa()
            .set_children(&p("2"), vec![Jurisdiction::new(7, "Ontario")])
            .unwrap();
        assert_eq!(forest.at_depth(0), vec![p("1"), p("2")]);
        assert_eq!(forest.at_depth(1), vec![p("1/10"), p("1/11"), p("2/7")]);
        assert_eq!(forest.at_depth(2), vec![p("1/10/5")]);
        assert!(forest.at_depth(3).is_empty());
        assert_eq!(forest.max_depth(), Some(2));
    }

    #[test]
    fn subtree_includes_self_and_descendants() {
        let nodes: Vec<String> = usa()
            .subtree(&p("1/10"))
            .map(|(path, _)| path.to_string())
            .collect();
        assert_eq!(nodes, vec!["1/10", "1/10/5"]);
        assert_eq!(usa().subtree(&p("8")).count(), 0);
    }

    #[test]
    fn old_snapshot_survives_mutation() {
        let before = usa();
        let after = before.set_checked(&p("1/10/5"), true).unwrap();
        assert!(!before.get(&p("1/10/5")).unwrap().is_checked());
        assert!(after.get(&p("1/10/5")).unwrap().is_checked());
        assert_eq!(before.get(&p("1/11")), after.get(&p("1/11")));
    }
}
