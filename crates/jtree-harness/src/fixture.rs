#![forbid(unsafe_code)]

//! Static jurisdiction trees loaded from JSON.
//!
//! A fixture is a nested list of records:
//!
//! ```json
//! [{"id": 1, "name": "USA", "children": [{"id": 4, "name": "California"}]}]
//! ```
//!
//! A missing `children` field means the node is a leaf. [`FixtureSource`]
//! serves such a tree through [`JurisdictionSource`], optionally sleeping
//! before each answer to imitate a remote service.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use jtree_core::{
    CancellationToken, Jurisdiction, JurisdictionId, JurisdictionSource, NodePath, SourceError,
};
use serde::{Deserialize, Serialize};
use web_time::Duration;

/// The bundled North America fixture.
pub const NORTH_AMERICA: &str = include_str!("../fixtures/north_america.json");

/// Errors from loading a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One record in a fixture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureNode {
    pub id: JurisdictionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FixtureNode>,
}

impl FixtureNode {
    fn record(&self) -> Jurisdiction {
        Jurisdiction {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// A [`JurisdictionSource`] backed by an in-memory fixture tree.
#[derive(Debug)]
pub struct FixtureSource {
    roots: Vec<FixtureNode>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureSource {
    #[must_use]
    pub fn new(roots: Vec<FixtureNode>) -> Self {
        Self {
            roots,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, FixtureError> {
        Ok(Self::new(serde_json::from_str(s)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// The bundled [`NORTH_AMERICA`] tree.
    pub fn north_america() -> Result<Self, FixtureError> {
        Self::from_json_str(NORTH_AMERICA)
    }

    /// Wait `latency` before every answer. The wait ends early with
    /// [`SourceError::Cancelled`] if the fetch is cancelled.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls answered or attempted so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn begin(&self, cancel: &CancellationToken) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            if cancel.wait_timeout(latency) {
                return Err(SourceError::Cancelled);
            }
        }
        cancel.ensure_active()
    }

    fn lookup(&self, path: &NodePath) -> Option<&FixtureNode> {
        let (first, rest) = path.ids().split_first()?;
        let mut node = self.roots.iter().find(|n| n.id == *first)?;
        for id in rest {
            node = node.children.iter().find(|n| n.id == *id)?;
        }
        Some(node)
    }
}

impl JurisdictionSource for FixtureSource {
    fn list_roots(&self, cancel: &CancellationToken) -> Result<Vec<Jurisdiction>, SourceError> {
        self.begin(cancel)?;
        Ok(self.roots.iter().map(FixtureNode::record).collect())
    }

    fn list_children(
        &self,
        parent: &NodePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<Jurisdiction>, SourceError> {
        self.begin(cancel)?;
        let node = self
            .lookup(parent)
            .ok_or_else(|| SourceError::unavailable(format!("no jurisdiction at {parent}")))?;
        Ok(node.children.iter().map(FixtureNode::record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtree_core::CancellationSource;

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn bundled_fixture_parses() {
        let source = FixtureSource::north_america().unwrap();
        let roots = source.list_roots(&CancellationToken::never()).unwrap();
        let names: Vec<&str> = roots.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["USA", "Canada", "Mexico"]);
    }

    #[test]
    fn children_follow_the_full_path() {
        let source = FixtureSource::north_america().unwrap();
        let never = CancellationToken::never();
        let ca = source.list_children(&p("1/4"), &never).unwrap();
        assert_eq!(ca[0].name, "Alameda");
        let or = source.list_children(&p("1/7"), &never).unwrap();
        assert_eq!(or, vec![Jurisdiction::new(5, "Multnomah")]);
        assert!(source.list_children(&p("1/7/5"), &never).unwrap().is_empty());
        assert_eq!(source.call_count(), 3);
    }

    #[test]
    fn unknown_path_is_unavailable() {
        let source = FixtureSource::north_america().unwrap();
        let err = source
            .list_children(&p("8"), &CancellationToken::never())
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn latency_honours_cancellation() {
        let source = FixtureSource::north_america()
            .unwrap()
            .with_latency(Duration::from_secs(30));
        let cancel = CancellationSource::new();
        cancel.cancel();
        assert_eq!(
            source.list_roots(&cancel.token()),
            Err(SourceError::Cancelled)
        );
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, r#"[{"id": 3, "name": "Ontario"}]"#).unwrap();
        let source = FixtureSource::from_file(&path).unwrap();
        let roots = source.list_roots(&CancellationToken::never()).unwrap();
        assert_eq!(roots, vec![Jurisdiction::new(3, "Ontario")]);

        let missing = FixtureSource::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, FixtureError::Io(_)));
    }

    #[test]
    fn bad_json_is_reported() {
        let err = FixtureSource::from_json_str("[{\"id\": \"x\"}]").unwrap_err();
        assert!(err.to_string().starts_with("invalid fixture JSON"));
    }
}
