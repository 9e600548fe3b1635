#![forbid(unsafe_code)]

//! A programmable [`JurisdictionSource`] for tests.
//!
//! [`ScriptedSource`] answers from a tree given up front, fails or panics on
//! demand, delays chosen paths and records every call so tests can assert
//! that a node was fetched exactly once.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use jtree_core::{CancellationToken, Jurisdiction, JurisdictionSource, NodePath, SourceError};
use web_time::Duration;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Roots,
    Children(NodePath),
}

#[derive(Debug, Default)]
struct Script {
    root_failures: VecDeque<SourceError>,
    failures: HashMap<NodePath, VecDeque<SourceError>>,
    panics: HashMap<NodePath, usize>,
    calls: Vec<SourceCall>,
}

/// Tree-shaped source with scripted failures and delays.
///
/// Paths without scripted children are leaves.
#[derive(Debug)]
pub struct ScriptedSource {
    roots: Vec<Jurisdiction>,
    children: HashMap<NodePath, Vec<Jurisdiction>>,
    delays: HashMap<NodePath, Duration>,
    script: Mutex<Script>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(roots: Vec<Jurisdiction>) -> Self {
        Self {
            roots,
            children: HashMap::new(),
            delays: HashMap::new(),
            script: Mutex::new(Script::default()),
        }
    }

    /// Answer `list_children(path)` with `children`.
    #[must_use]
    pub fn with_children(mut self, path: NodePath, children: Vec<Jurisdiction>) -> Self {
        self.children.insert(path, children);
        self
    }

    /// Sleep `delay` (cancellably) before answering for `path`.
    #[must_use]
    pub fn with_delay(mut self, path: NodePath, delay: Duration) -> Self {
        self.delays.insert(path, delay);
        self
    }

    /// Fail the next `list_roots` call with `error`.
    pub fn fail_roots(&self, error: SourceError) {
        self.lock().root_failures.push_back(error);
    }

    /// Fail the next `list_children(path)` call with `error`. Queued
    /// failures are used up one per call.
    pub fn fail_next(&self, path: NodePath, error: SourceError) {
        self.lock().failures.entry(path).or_default().push_back(error);
    }

    /// Panic inside the next `list_children(path)` call, as a broken
    /// client library would.
    pub fn panic_next(&self, path: NodePath) {
        *self.lock().panics.entry(path).or_default() += 1;
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.lock().calls.clone()
    }

    /// How many times children of `path` were requested.
    pub fn children_calls(&self, path: &NodePath) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SourceCall::Children(p) if p == path))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JurisdictionSource for ScriptedSource {
    fn list_roots(&self, cancel: &CancellationToken) -> Result<Vec<Jurisdiction>, SourceError> {
        let failure = {
            let mut script = self.lock();
            script.calls.push(SourceCall::Roots);
            script.root_failures.pop_front()
        };
        cancel.ensure_active()?;
        match failure {
            Some(error) => Err(error),
            None => Ok(self.roots.clone()),
        }
    }

    fn list_children(
        &self,
        parent: &NodePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<Jurisdiction>, SourceError> {
        let (failure, panic) = {
            let mut script = self.lock();
            script.calls.push(SourceCall::Children(parent.clone()));
            let panic = match script.panics.get_mut(parent) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            let failure = script
                .failures
                .get_mut(parent)
                .and_then(VecDeque::pop_front);
            (failure, panic)
        };
        if panic {
            panic!("scripted panic fetching children of {parent}");
        }
        if let Some(delay) = self.delays.get(parent) {
            if cancel.wait_timeout(*delay) {
                return Err(SourceError::Cancelled);
            }
        }
        cancel.ensure_active()?;
        match failure {
            Some(error) => Err(error),
            None => Ok(self.children.get(parent).cloned().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn answers_from_script_and_records_calls() {
        let source = ScriptedSource::new(vec![Jurisdiction::new(1, "USA")])
            .with_children(p("1"), vec![Jurisdiction::new(4, "California")]);
        let never = CancellationToken::never();
        assert_eq!(source.list_roots(&never).unwrap().len(), 1);
        assert_eq!(source.list_children(&p("1"), &never).unwrap()[0].name, "California");
        assert!(source.list_children(&p("1/4"), &never).unwrap().is_empty());
        assert_eq!(
            source.calls(),
            vec![
                SourceCall::Roots,
                SourceCall::Children(p("1")),
                SourceCall::Children(p("1/4"))
            ]
        );
        assert_eq!(source.children_calls(&p("1")), 1);
    }

    #[test]
    fn scripted_failures_are_consumed_once() {
        let source = ScriptedSource::new(vec![Jurisdiction::new(1, "USA")]);
        source.fail_next(p("1"), SourceError::unavailable("boom"));
        source.fail_roots(SourceError::Timeout { timeout_ms: 5 });
        let never = CancellationToken::never();
        assert!(source.list_roots(&never).is_err());
        assert!(source.list_roots(&never).is_ok());
        assert!(source.list_children(&p("1"), &never).is_err());
        assert!(source.list_children(&p("1"), &never).is_ok());
    }

    #[test]
    fn scripted_panic_fires_once() {
        let source = ScriptedSource::new(vec![Jurisdiction::new(1, "USA")]);
        source.panic_next(p("1"));
        let never = CancellationToken::never();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            source.list_children(&p("1"), &never)
        }));
        assert!(caught.is_err());
        assert!(source.list_children(&p("1"), &never).is_ok());
        assert_eq!(source.children_calls(&p("1")), 2);
    }
}
