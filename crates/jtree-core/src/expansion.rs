#![forbid(unsafe_code)]

//! Sibling-exclusive expansion with on-demand child fetching.
//!
//! The [`ExpansionController`] keeps a single "active path" open: expanding a
//! node at depth `d` force-collapses every other loaded node at depth `d`
//! (and their subtrees) anywhere in the forest. Expanding a node whose
//! children were never fetched marks it loading and issues a [`FetchTicket`];
//! the caller runs the fetch and reports back through
//! [`ExpansionController::complete_fetch`], which applies the result to the
//! forest current at completion time.
//!
//! # Tickets
//!
//! Each fetch gets a ticket with a fresh sequence number. The controller
//! remembers the current ticket per node; a completion carrying any other
//! ticket is stale. Under [`StaleFetchPolicy::Cancel`] a force-collapse that
//! clears a node's loading flag also forgets (and reports as cancelled) its
//! ticket, so the late result cannot land on a node that may have started a
//! newer fetch.

use std::collections::HashMap;

use tracing::debug;

use crate::forest::{Forest, StoreError};
use crate::jurisdiction::Jurisdiction;
use crate::path::NodePath;
use crate::source::SourceError;

/// What to do with a fetch whose node was force-collapsed while it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum StaleFetchPolicy {
    /// Cancel the fetch and discard its result.
    #[default]
    Cancel,
    /// Let the fetch finish and store its children if the node still has none.
    ApplyOnArrival,
}

/// Identifies one child fetch for one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    path: NodePath,
    seq: u64,
}

impl FetchTicket {
    /// Node whose children are being fetched.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Sequence number, unique per controller.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of [`ExpansionController::toggle_expand`].
#[derive(Debug, Clone)]
pub struct Expansion {
    /// The new snapshot.
    pub forest: Forest,
    /// Fetch the caller must start, if the node needs children.
    pub fetch: Option<FetchTicket>,
    /// In-flight fetches that are no longer wanted.
    pub cancelled: Vec<FetchTicket>,
    /// Whether the target node ended up expanded.
    pub expanded: bool,
}

impl Expansion {
    pub(crate) fn unchanged(forest: &Forest, expanded: bool) -> Self {
        Self {
            forest: forest.clone(),
            fetch: None,
            cancelled: Vec::new(),
            expanded,
        }
    }
}

/// How a fetch completion was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Children were stored on the node.
    Applied { children: usize },
    /// The node was marked with a load error.
    Failed { error: SourceError },
    /// The ticket was no longer current; nothing changed.
    Stale,
    /// The node already had children (an earlier fetch won); nothing stored.
    AlreadyLoaded,
}

/// Result of [`ExpansionController::complete_fetch`].
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub forest: Forest,
    pub outcome: FetchOutcome,
}

/// Expansion policy and in-flight fetch bookkeeping.
#[derive(Debug, Default)]
pub struct ExpansionController {
    policy: StaleFetchPolicy,
    in_flight: HashMap<NodePath, FetchTicket>,
    next_seq: u64,
}

impl ExpansionController {
    #[must_use]
    pub fn new(policy: StaleFetchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn policy(&self) -> StaleFetchPolicy {
        self.policy
    }

    /// Number of fetches whose results are still wanted.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// The current ticket for `path`, if a fetch is outstanding.
    #[must_use]
    pub fn ticket_for(&self, path: &NodePath) -> Option<&FetchTicket> {
        self.in_flight.get(path)
    }

    /// Toggle the expansion of `path`.
    ///
    /// 1. Every other loaded node at the same depth is force-collapsed.
    /// 2. An expanded node collapses together with its loaded subtree; its
    ///    check survives only if it is a fetched leaf.
    /// 3. Otherwise the node expands; if its children were never fetched it
    ///    is marked loading and a ticket is returned.
    ///
    /// A node that is expanded and already loading is left untouched, so a
    /// rapid double activation never starts a second fetch. An expanded node
    /// whose previous fetch failed retries instead of collapsing.
    pub fn toggle_expand(
        &mut self,
        forest: &Forest,
        path: &NodePath,
    ) -> Result<Expansion, StoreError> {
        let node = forest
            .get(path)
            .ok_or_else(|| StoreError::UnknownNode(path.clone()))?;
        if node.is_loading_children() && node.is_expanded() {
            debug!(target: "jtree.expand", path = %path, "toggle ignored: fetch in flight");
            return Ok(Expansion::unchanged(forest, true));
        }

        let mut cancelled = Vec::new();
        let mut next = forest.clone();
        for other in forest.at_depth(path.depth()) {
            if other != *path {
                next = self.force_collapse_tracked(&next, &other, &mut cancelled)?;
            }
        }

        let retry = node.is_expanded() && !node.children_loaded() && !node.is_loading_children();
        if node.is_expanded() && !retry {
            let keep_check = node.is_checked() && node.is_fetched_leaf();
            next = collapse_subtree(&next, path)?;
            if keep_check {
                next = next.set_checked(path, true)?;
            }
            debug!(target: "jtree.expand", path = %path, "collapsed");
            return Ok(Expansion {
                forest: next,
                fetch: None,
                cancelled,
                expanded: false,
            });
        }

        next = next.set_expanded(path, true)?;
        let mut fetch = None;
        if !node.children_loaded() && !node.is_loading_children() {
            next = next.update_node(path, |n| {
                n.loading_children = true;
                n.load_error = false;
            })?;
            let ticket = self.issue(path);
            debug!(
                target: "jtree.expand",
                path = %path,
                ticket = ticket.seq,
                retry,
                "expanded; fetching children"
            );
            fetch = Some(ticket);
        } else {
            debug!(target: "jtree.expand", path = %path, "expanded");
        }

        Ok(Expansion {
            forest: next,
            fetch,
            cancelled,
            expanded: true,
        })
    }

    /// Apply a fetch result to `forest` (the snapshot current now, not the
    /// one the fetch started from).
    ///
    /// A response repeating a sibling id is treated as a failed fetch.
    pub fn complete_fetch(
        &mut self,
        forest: &Forest,
        ticket: &FetchTicket,
        result: Result<Vec<Jurisdiction>, SourceError>,
    ) -> Result<FetchCompletion, StoreError> {
        let path = ticket.path();
        let current = self.in_flight.get(path) == Some(ticket);
        if current {
            self.in_flight.remove(path);
        } else if self.policy == StaleFetchPolicy::Cancel {
            debug!(target: "jtree.expand", path = %path, ticket = ticket.seq, "discarding stale fetch");
            return Ok(unchanged_completion(forest, FetchOutcome::Stale));
        }

        let node = forest
            .get(path)
            .ok_or_else(|| StoreError::UnknownNode(path.clone()))?;

        let error = match result {
            Ok(_) if node.children_loaded() => {
                let next = if current {
                    forest.set_loading(path, false)?
                } else {
                    forest.clone()
                };
                return Ok(FetchCompletion {
                    forest: next,
                    outcome: FetchOutcome::AlreadyLoaded,
                });
            }
            Ok(children) => {
                let count = children.len();
                match forest.set_children(path, children) {
                    Ok(next) => {
                        let next = if current {
                            next.update_node(path, |n| {
                                n.loading_children = false;
                                n.load_error = false;
                            })?
                        } else {
                            next
                        };
                        debug!(
                            target: "jtree.expand",
                            path = %path,
                            ticket = ticket.seq,
                            children = count,
                            "children loaded"
                        );
                        return Ok(FetchCompletion {
                            forest: next,
                            outcome: FetchOutcome::Applied { children: count },
                        });
                    }
                    Err(err @ StoreError::DuplicateSibling { .. }) => {
                        SourceError::Malformed(err.to_string())
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(error) => error,
        };

        if !current {
            return Ok(unchanged_completion(forest, FetchOutcome::Stale));
        }
        let next = forest.update_node(path, |n| {
            n.loading_children = false;
            n.load_error = true;
        })?;
        tracing::warn!(
            target: "jtree.expand",
            path = %path,
            ticket = ticket.seq,
            error = %error,
            "child fetch failed"
        );
        Ok(FetchCompletion {
            forest: next,
            outcome: FetchOutcome::Failed { error },
        })
    }

    /// Forget every outstanding fetch, returning their tickets.
    pub fn cancel_all(&mut self) -> Vec<FetchTicket> {
        let mut tickets: Vec<FetchTicket> = self.in_flight.drain().map(|(_, t)| t).collect();
        tickets.sort_by_key(FetchTicket::seq);
        tickets
    }

    fn issue(&mut self, path: &NodePath) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket {
            path: path.clone(),
            seq: self.next_seq,
        };
        self.in_flight.insert(path.clone(), ticket.clone());
        ticket
    }

    fn force_collapse_tracked(
        &mut self,
        forest: &Forest,
        path: &NodePath,
        cancelled: &mut Vec<FetchTicket>,
    ) -> Result<Forest, StoreError> {
        if self.policy == StaleFetchPolicy::Cancel {
            for (loading, _) in forest
                .subtree(path)
                .filter(|(_, node)| node.is_loading_children())
            {
                if let Some(ticket) = self.in_flight.remove(&loading) {
                    debug!(target: "jtree.expand", path = %loading, ticket = ticket.seq, "fetch cancelled by collapse");
                    cancelled.push(ticket);
                }
            }
        }
        force_collapse(forest, path)
    }
}

fn unchanged_completion(forest: &Forest, outcome: FetchOutcome) -> FetchCompletion {
    FetchCompletion {
        forest: forest.clone(),
        outcome,
    }
}

fn reset_subtree(
    forest: &Forest,
    path: &NodePath,
    clear_fetch_flags: bool,
) -> Result<Forest, StoreError> {
    let paths: Vec<NodePath> = forest.subtree(path).map(|(p, _)| p).collect();
    if paths.is_empty() {
        return Err(StoreError::UnknownNode(path.clone()));
    }
    let mut next = forest.clone();
    for p in &paths {
        next = next.update_node(p, |n| {
            n.expanded = false;
            n.checked = false;
            if clear_fetch_flags {
                n.loading_children = false;
                n.load_error = false;
            }
        })?;
    }
    Ok(next)
}

/// Unexpand and uncheck `path` and every loaded descendant.
///
/// Fetched children are kept so re-expanding needs no fetch.
pub fn collapse_subtree(forest: &Forest, path: &NodePath) -> Result<Forest, StoreError> {
    reset_subtree(forest, path, false)
}

/// [`collapse_subtree`] that also clears loading and error flags.
pub fn force_collapse(forest: &Forest, path: &NodePath) -> Result<Forest, StoreError> {
    reset_subtree(forest, path, true)
}
