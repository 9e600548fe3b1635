#![forbid(unsafe_code)]

//! Ancestor-id paths that address nodes in the forest.
//!
//! Jurisdiction ids repeat across branches (two states may both own a county
//! with id 5), so a node is keyed by the ids of every ancestor down to itself:
//! `1/4/5` is county 5 of state 4 of country 1.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::jurisdiction::JurisdictionId;

/// Separator used by [`NodePath`]'s `Display` and `FromStr` forms.
pub const PATH_DELIMITER: char = '/';

/// Non-empty sequence of ids from a root down to a node.
///
/// Backed by `Arc<[JurisdictionId]>` so clones are a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Arc<[JurisdictionId]>);

/// Error parsing a [`NodePath`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("node path is empty")]
    Empty,
    #[error("invalid path segment {segment:?} (expected an integer id)")]
    InvalidSegment { segment: String },
}

impl NodePath {
    /// Path of a root node.
    #[must_use]
    pub fn root(id: JurisdictionId) -> Self {
        Self(Arc::from([id]))
    }

    /// Build a path from ids, root first. Returns `None` for an empty sequence.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = JurisdictionId>) -> Option<Self> {
        let ids: Vec<JurisdictionId> = ids.into_iter().collect();
        if ids.is_empty() {
            None
        } else {
            Some(Self(Arc::from(ids)))
        }
    }

    /// Path of the child `id` of this node.
    #[must_use]
    pub fn child(&self, id: JurisdictionId) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        Self(Arc::from(ids))
    }

    /// Path of the parent, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(Arc::from(&self.0[..self.0.len() - 1])))
    }

    /// Id of the addressed node (the last segment).
    #[must_use]
    pub fn id(&self) -> JurisdictionId {
        // Non-empty by construction.
        self.0[self.0.len() - 1]
    }

    /// Depth of the node; roots are at depth 0.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// All ids, root first.
    #[must_use]
    pub fn ids(&self) -> &[JurisdictionId] {
        &self.0
    }

    /// Whether this path addresses a root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Whether `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// Whether `other` is `self` or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &NodePath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Every prefix of this path, from the root down to `self` inclusive.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..=self.0.len()).map(|len| Self(Arc::from(&self.0[..len])))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_DELIMITER}")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({self})")
    }
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PathParseError::Empty);
        }
        let ids = trimmed
            .split(PATH_DELIMITER)
            .map(|segment| {
                segment
                    .trim()
                    .parse::<i64>()
                    .map(JurisdictionId)
                    .map_err(|_| PathParseError::InvalidSegment {
                        segment: segment.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ids(ids).ok_or(PathParseError::Empty)
    }
}
