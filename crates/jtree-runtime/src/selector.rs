#![forbid(unsafe_code)]

//! The jurisdiction selector as a [`Model`].
//!
//! [`SelectorModel`] wires a [`JurisdictionTree`] to a
//! [`JurisdictionSource`]: user intents arrive as [`SelectorMsg`]s, fetches
//! leave as [`Cmd::Task`]s keyed by their ticket, and results come back as
//! messages applied to whatever snapshot is current when they land. After
//! every update an immutable [`SelectorSnapshot`] is published through an
//! [`Observable`] for presentation code.
//!
//! # Status
//!
//! ```text
//! LoadingRoots --roots ok--> Ready
//!      |
//!      +--roots failed--> Failed   (terminal)
//! ```

use std::sync::Arc;

use jtree_core::{
    FetchOutcome, FetchTicket, Forest, Jurisdiction, JurisdictionSource, JurisdictionTree,
    NodePath, SourceError, StoreError, TreeEffects,
};
use tracing::{debug, info, warn};

use crate::config::SelectorConfig;
use crate::effect_system::{FetchKind, call_with_timeout, record_fetch_cancelled, trace_fetch};
use crate::program::{Cmd, Model, TaskSpec};
use crate::reactive::Observable;

/// Task name of the root fetch.
pub const FETCH_ROOTS: &str = "fetch_roots";
/// Task name of child fetches.
pub const FETCH_CHILDREN: &str = "fetch_children";

/// Task key for a child fetch: `children:<path>#<seq>`.
#[must_use]
pub fn task_key(ticket: &FetchTicket) -> String {
    format!("children:{}#{}", ticket.path(), ticket.seq())
}

/// Inverse of [`task_key`]: the node path and ticket sequence.
fn parse_task_key(key: &str) -> Option<(NodePath, u64)> {
    let (path, seq) = key.strip_prefix("children:")?.rsplit_once('#')?;
    Some((path.parse().ok()?, seq.parse().ok()?))
}

/// Intents and fetch results understood by [`SelectorModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorMsg {
    ToggleExpand(NodePath),
    ToggleCheck(NodePath),
    ClearSelection,
    RootsLoaded(Result<Vec<Jurisdiction>, SourceError>),
    ChildrenLoaded {
        ticket: FetchTicket,
        result: Result<Vec<Jurisdiction>, SourceError>,
    },
}

/// Where the selector is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStatus {
    LoadingRoots,
    Ready,
    /// Roots could not be loaded; nothing else will happen.
    Failed(SourceError),
}

/// Immutable view of the selector published after every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSnapshot {
    pub status: SelectorStatus,
    pub forest: Forest,
    pub selected: Option<NodePath>,
    pub breadcrumb: Option<String>,
    /// Latest child-fetch failure, until the next user intent.
    pub notice: Option<String>,
    pub in_flight: usize,
}

impl SelectorSnapshot {
    fn loading() -> Self {
        Self {
            status: SelectorStatus::LoadingRoots,
            forest: Forest::default(),
            selected: None,
            breadcrumb: None,
            notice: None,
            in_flight: 0,
        }
    }

    /// The breadcrumb, or `not_found` when nothing is selected.
    #[must_use]
    pub fn breadcrumb_or<'a>(&'a self, not_found: &'a str) -> &'a str {
        self.breadcrumb.as_deref().unwrap_or(not_found)
    }
}

/// Selector state machine driven by a [`Program`](crate::program::Program)
/// or [`ProgramSimulator`](crate::simulator::ProgramSimulator).
pub struct SelectorModel<S> {
    source: Arc<S>,
    config: SelectorConfig,
    status: SelectorStatus,
    tree: Option<JurisdictionTree>,
    notice: Option<String>,
    snapshots: Observable<SelectorSnapshot>,
}

impl<S: JurisdictionSource + 'static> SelectorModel<S> {
    pub fn new(source: S, config: SelectorConfig) -> Self {
        Self::with_shared_source(Arc::new(source), config)
    }

    pub fn with_shared_source(source: Arc<S>, config: SelectorConfig) -> Self {
        Self {
            source,
            config,
            status: SelectorStatus::LoadingRoots,
            tree: None,
            notice: None,
            snapshots: Observable::new(SelectorSnapshot::loading()),
        }
    }

    pub fn status(&self) -> &SelectorStatus {
        &self.status
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// The session, once roots have loaded.
    pub fn tree(&self) -> Option<&JurisdictionTree> {
        self.tree.as_ref()
    }

    /// Published snapshots. Subscribe to re-render on change.
    pub fn snapshots(&self) -> &Observable<SelectorSnapshot> {
        &self.snapshots
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SelectorSnapshot {
        match &self.tree {
            Some(tree) => SelectorSnapshot {
                status: self.status.clone(),
                forest: tree.forest().clone(),
                selected: tree.selected().cloned(),
                breadcrumb: tree.breadcrumb(),
                notice: self.notice.clone(),
                in_flight: tree.in_flight(),
            },
            None => SelectorSnapshot {
                status: self.status.clone(),
                ..SelectorSnapshot::loading()
            },
        }
    }

    /// Breadcrumb of the selection, or the configured "not found" text.
    pub fn breadcrumb_text(&self) -> String {
        self.tree
            .as_ref()
            .and_then(JurisdictionTree::breadcrumb)
            .unwrap_or_else(|| self.config.display.not_found.clone())
    }

    /// Full name path of `path`, or the configured "not found" text.
    pub fn full_path_text(&self, path: &NodePath) -> String {
        self.tree
            .as_ref()
            .and_then(|tree| tree.full_path(path))
            .unwrap_or_else(|| self.config.display.not_found.clone())
    }

    fn publish(&self) {
        self.snapshots.set(self.snapshot());
    }

    fn on_roots_loaded(&mut self, result: Result<Vec<Jurisdiction>, SourceError>) {
        if self.status != SelectorStatus::LoadingRoots {
            debug!(target: "jtree.program", "ignoring repeated root load");
            return;
        }
        let built = result.and_then(|roots| {
            JurisdictionTree::with_policy(roots, self.config.fetch.stale_policy)
                .map_err(|err| SourceError::Malformed(err.to_string()))
        });
        match built {
            Ok(tree) => {
                info!(target: "jtree.program", roots = tree.forest().len(), "roots loaded");
                self.tree = Some(tree.with_separator(self.config.display.separator.clone()));
                self.status = SelectorStatus::Ready;
            }
            Err(error) => {
                warn!(target: "jtree.program", error = %error, "root load failed");
                self.status = SelectorStatus::Failed(error);
            }
        }
    }

    fn on_children_loaded(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Jurisdiction>, SourceError>,
    ) {
        let Some(tree) = self.tree.as_mut() else {
            return;
        };
        match tree.complete_fetch(&ticket, result) {
            Ok(FetchOutcome::Failed { error }) => {
                self.notice = Some(format!("Error loading sub-jurisdictions: {error}"));
            }
            Ok(outcome) => {
                debug!(target: "jtree.program", path = %ticket.path(), ?outcome, "fetch settled");
            }
            Err(err) => warn!(target: "jtree.program", error = %err, "fetch result rejected"),
        }
    }

    fn on_intent(
        &mut self,
        path: Option<&NodePath>,
        op: impl FnOnce(&mut JurisdictionTree) -> Result<TreeEffects, StoreError>,
    ) -> Cmd<SelectorMsg> {
        let Some(tree) = self.tree.as_mut() else {
            debug!(target: "jtree.program", status = ?self.status, "intent ignored before roots loaded");
            return Cmd::none();
        };
        self.notice = None;
        match op(tree) {
            Ok(effects) => self.effects_to_cmd(effects),
            Err(err) => {
                warn!(
                    target: "jtree.program",
                    path = %path.map(ToString::to_string).unwrap_or_default(),
                    error = %err,
                    "intent rejected"
                );
                Cmd::none()
            }
        }
    }

    /// A child fetch task that never reported back fails its ticket, if the
    /// ticket is still the one in flight.
    fn on_child_task_lost(&mut self, key: &str, reason: &str) {
        let ticket = parse_task_key(key).and_then(|(path, seq)| {
            self.tree
                .as_ref()?
                .ticket_for(&path)
                .filter(|ticket| ticket.seq() == seq)
                .cloned()
        });
        match ticket {
            Some(ticket) => {
                self.on_children_loaded(ticket, Err(SourceError::unavailable(reason)));
            }
            None => debug!(target: "jtree.program", key, "lost task was no longer current"),
        }
    }

    fn effects_to_cmd(&self, effects: TreeEffects) -> Cmd<SelectorMsg> {
        let mut cmds = Vec::with_capacity(effects.cancelled.len() + 1);
        for ticket in &effects.cancelled {
            record_fetch_cancelled(ticket);
            cmds.push(Cmd::cancel(task_key(ticket)));
        }
        if let Some(ticket) = effects.fetch {
            cmds.push(self.fetch_children(ticket));
        }
        Cmd::batch(cmds)
    }

    fn fetch_roots(&self) -> Cmd<SelectorMsg> {
        let source = Arc::clone(&self.source);
        let timeout = self.config.fetch.timeout();
        Cmd::task(TaskSpec::new(FETCH_ROOTS).with_key("roots"), move |cancel| {
            let result = trace_fetch(FetchKind::Roots, None, None, || {
                call_with_timeout(timeout, cancel, move |cancel| source.list_roots(cancel))
            });
            SelectorMsg::RootsLoaded(result)
        })
    }

    fn fetch_children(&self, ticket: FetchTicket) -> Cmd<SelectorMsg> {
        let source = Arc::clone(&self.source);
        let timeout = self.config.fetch.timeout();
        let spec = TaskSpec::new(FETCH_CHILDREN).with_key(task_key(&ticket));
        Cmd::task(spec, move |cancel| {
            let path = ticket.path().clone();
            let result = trace_fetch(
                FetchKind::Children,
                Some(ticket.path()),
                Some(ticket.seq()),
                || {
                    call_with_timeout(timeout, cancel, move |cancel| {
                        source.list_children(&path, cancel)
                    })
                },
            );
            SelectorMsg::ChildrenLoaded { ticket, result }
        })
    }
}

impl<S: JurisdictionSource + 'static> Model for SelectorModel<S> {
    type Message = SelectorMsg;

    fn init(&mut self) -> Cmd<SelectorMsg> {
        self.publish();
        self.fetch_roots()
    }

    fn update(&mut self, msg: SelectorMsg) -> Cmd<SelectorMsg> {
        let cmd = match msg {
            SelectorMsg::ToggleExpand(path) => {
                self.on_intent(Some(&path), |tree| tree.toggle_expand(&path))
            }
            SelectorMsg::ToggleCheck(path) => {
                self.on_intent(Some(&path), |tree| tree.toggle_check(&path))
            }
            SelectorMsg::ClearSelection => self.on_intent(None, |tree| {
                tree.clear_selection()?;
                Ok(TreeEffects::default())
            }),
            SelectorMsg::RootsLoaded(result) => {
                self.on_roots_loaded(result);
                Cmd::none()
            }
            SelectorMsg::ChildrenLoaded { ticket, result } => {
                self.on_children_loaded(ticket, result);
                Cmd::none()
            }
        };
        self.publish();
        cmd
    }

    fn task_lost(&mut self, spec: &TaskSpec, reason: &str) -> Cmd<SelectorMsg> {
        match (spec.name.as_str(), spec.key.as_deref()) {
            (FETCH_ROOTS, _) => self.on_roots_loaded(Err(SourceError::unavailable(reason))),
            (FETCH_CHILDREN, Some(key)) => self.on_child_task_lost(key, reason),
            _ => return Cmd::none(),
        }
        self.publish();
        Cmd::none()
    }
}

impl<S> std::fmt::Debug for SelectorModel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorModel")
            .field("status", &self.status)
            .field("tree", &self.tree)
            .field("notice", &self.notice)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtree_core::CancellationToken;
    use std::sync::Mutex;

    /// Two roots; root 1 has one child whose fetch fails; everything else
    /// is a leaf.
    #[derive(Default)]
    struct TinySource {
        calls: Mutex<Vec<String>>,
    }

    impl JurisdictionSource for TinySource {
        fn list_roots(&self, _: &CancellationToken) -> Result<Vec<Jurisdiction>, SourceError> {
            self.calls.lock().unwrap().push("roots".into());
            Ok(vec![Jurisdiction::new(1, "USA"), Jurisdiction::new(2, "Canada")])
        }

        fn list_children(
            &self,
            parent: &NodePath,
            _: &CancellationToken,
        ) -> Result<Vec<Jurisdiction>, SourceError> {
            self.calls.lock().unwrap().push(parent.to_string());
            match parent.to_string().as_str() {
                "1" => Ok(vec![Jurisdiction::new(4, "California")]),
                "1/4" => Err(SourceError::unavailable("down")),
                _ => Ok(Vec::new()),
            }
        }
    }

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    fn run(model: &mut SelectorModel<TinySource>, cmd: Cmd<SelectorMsg>) {
        match cmd {
            Cmd::Task(_, task) => {
                let msg = task(&CancellationToken::never());
                let next = model.update(msg);
                run(model, next);
            }
            Cmd::Batch(cmds) => cmds.into_iter().for_each(|c| run(model, c)),
            _ => {}
        }
    }

    #[test]
    fn task_key_parses_back() {
        let (path, seq) = parse_task_key("children:1/4#12").unwrap();
        assert_eq!(path, p("1/4"));
        assert_eq!(seq, 12);
        assert!(parse_task_key("roots").is_none());
        assert!(parse_task_key("children:1/4").is_none());
    }

    #[test]
    fn lost_child_task_fails_the_ticket() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let cmd = model.init();
        run(&mut model, cmd);

        let Cmd::Task(spec, _) = model.update(SelectorMsg::ToggleExpand(p("2"))) else {
            panic!("expected a fetch task");
        };
        assert_eq!(model.snapshot().in_flight, 1);
        model.task_lost(&spec, "task panicked: boom");

        let snap = model.snapshot();
        assert_eq!(snap.in_flight, 0);
        let node = snap.forest.get(&p("2")).unwrap();
        assert!(node.has_load_error());
        assert!(!node.is_loading_children());
        assert!(snap.notice.unwrap().contains("boom"));

        let retry = model.update(SelectorMsg::ToggleExpand(p("2")));
        assert_eq!(retry.count_tasks(), 1);
    }

    #[test]
    fn lost_root_task_is_terminal() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let _ = model.init();
        model.task_lost(&TaskSpec::new(FETCH_ROOTS).with_key("roots"), "cannot start task thread");
        assert!(matches!(
            model.status(),
            SelectorStatus::Failed(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn intents_before_roots_are_ignored() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let _ = model.init();
        assert!(model.update(SelectorMsg::ToggleExpand(p("1"))).is_none());
        assert_eq!(model.snapshot().status, SelectorStatus::LoadingRoots);
    }

    #[test]
    fn root_failure_is_terminal() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let _ = model.init();
        model.update(SelectorMsg::RootsLoaded(Err(SourceError::unavailable("503"))));
        assert!(matches!(model.status(), SelectorStatus::Failed(_)));
        model.update(SelectorMsg::RootsLoaded(Ok(vec![Jurisdiction::new(1, "USA")])));
        assert!(matches!(model.status(), SelectorStatus::Failed(_)));
        assert!(model.tree().is_none());
    }

    #[test]
    fn duplicate_roots_fail_as_malformed() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        model.update(SelectorMsg::RootsLoaded(Ok(vec![
            Jurisdiction::new(1, "USA"),
            Jurisdiction::new(1, "USA again"),
        ])));
        assert!(matches!(
            model.status(),
            SelectorStatus::Failed(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn check_publishes_breadcrumb() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let cmd = model.init();
        run(&mut model, cmd);
        assert_eq!(model.breadcrumb_text(), "not found");

        let cmd = model.update(SelectorMsg::ToggleCheck(p("2")));
        assert_eq!(cmd.count_tasks(), 1);
        run(&mut model, cmd);
        let snap = model.snapshots().get();
        assert_eq!(snap.status, SelectorStatus::Ready);
        assert_eq!(snap.selected, Some(p("2")));
        assert_eq!(snap.breadcrumb.as_deref(), Some("Canada"));
        assert_eq!(snap.in_flight, 0);
        assert_eq!(model.full_path_text(&p("1/9")), "not found");
    }

    #[test]
    fn failed_child_fetch_sets_notice_until_next_intent() {
        let mut model = SelectorModel::new(TinySource::default(), SelectorConfig::default());
        let cmd = model.init();
        run(&mut model, cmd);
        let cmd = model.update(SelectorMsg::ToggleExpand(p("1")));
        run(&mut model, cmd);

        let cmd = model.update(SelectorMsg::ToggleExpand(p("1/4")));
        let Cmd::Task(spec, task) = cmd else {
            panic!("expected a fetch task");
        };
        assert_eq!(spec.name, FETCH_CHILDREN);
        assert!(spec.key.unwrap().starts_with("children:1/4#"));
        let msg = task(&CancellationToken::never());
        model.update(msg);

        let snap = model.snapshot();
        assert_eq!(
            snap.notice.as_deref(),
            Some("Error loading sub-jurisdictions: jurisdiction service unavailable: down")
        );
        assert!(snap.forest.get(&p("1/4")).unwrap().has_load_error());

        model.update(SelectorMsg::ClearSelection);
        assert_eq!(model.snapshot().notice, None);
        assert_eq!(
            *model.source.calls.lock().unwrap(),
            vec!["roots".to_string(), "1".to_string(), "1/4".to_string()]
        );
    }
}
