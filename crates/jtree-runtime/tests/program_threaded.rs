//! The threaded [`Program`] against latency-simulating sources.

use std::sync::Arc;
use std::thread;

use jtree_core::{Jurisdiction, NodePath};
use jtree_harness::{FixtureSource, ScriptedSource};
use jtree_runtime::{
    Program, ProgramError, SelectorConfig, SelectorModel, SelectorMsg, SelectorStatus,
};
use web_time::Duration;

const IDLE: Duration = Duration::from_secs(10);

fn p(s: &str) -> NodePath {
    s.parse().unwrap()
}

fn slow_ab(delay: Duration) -> ScriptedSource {
    ScriptedSource::new(vec![Jurisdiction::new(1, "A"), Jurisdiction::new(2, "B")])
        .with_children(p("1"), vec![Jurisdiction::new(3, "A1")])
        .with_children(p("2"), vec![Jurisdiction::new(4, "B1")])
        .with_delay(p("1"), delay)
}

#[test]
fn fixture_walkthrough_selects_a_county() {
    let source = FixtureSource::north_america()
        .unwrap()
        .with_latency(Duration::from_millis(2));
    let mut program = Program::new(SelectorModel::new(source, SelectorConfig::default()));
    program.run_until_idle(IDLE).unwrap();
    assert_eq!(program.model().status(), &SelectorStatus::Ready);

    for msg in [
        SelectorMsg::ToggleExpand(p("1")),
        SelectorMsg::ToggleExpand(p("1/4")),
        SelectorMsg::ToggleCheck(p("1/4/5")),
    ] {
        program.send(msg);
        program.run_until_idle(IDLE).unwrap();
    }

    assert_eq!(
        program.model().breadcrumb_text(),
        "USA > California > Alameda"
    );
    assert_eq!(program.outstanding(), 0);
}

#[test]
fn sibling_switch_cancels_a_slow_fetch() {
    let source = Arc::new(slow_ab(Duration::from_secs(30)));
    let mut program = Program::new(SelectorModel::with_shared_source(
        Arc::clone(&source),
        SelectorConfig::default(),
    ));
    program.run_until_idle(IDLE).unwrap();

    program.send(SelectorMsg::ToggleExpand(p("1")));
    program.send(SelectorMsg::ToggleExpand(p("2")));
    // The 30s wait ends as soon as the token is cancelled.
    program.run_until_idle(IDLE).unwrap();

    let snapshot = program.model().snapshot();
    let a = snapshot.forest.get(&p("1")).unwrap();
    assert!(a.children().is_none());
    assert!(!a.is_loading_children());
    assert!(!a.has_load_error());
    assert_eq!(snapshot.forest.children_of(&p("2")), Some(vec![p("2/4")]));
    assert_eq!(source.children_calls(&p("1")), 1);
}

#[test]
fn slow_fetch_times_out_as_load_error() {
    let source = slow_ab(Duration::from_secs(2));
    let mut config = SelectorConfig::default();
    config.fetch.timeout_ms = Some(20);
    let mut program = Program::new(SelectorModel::new(source, config));
    program.run_until_idle(IDLE).unwrap();

    program.send(SelectorMsg::ToggleExpand(p("1")));
    program.run_until_idle(IDLE).unwrap();

    let snapshot = program.model().snapshot();
    let a = snapshot.forest.get(&p("1")).unwrap();
    assert!(a.has_load_error());
    assert!(a.children().is_none());
    assert!(snapshot.notice.as_deref().is_some_and(|n| n.contains("timed out after 20ms")));
}

#[test]
fn deadline_reports_outstanding_tasks() {
    let mut program = Program::new(SelectorModel::new(
        slow_ab(Duration::from_secs(5)),
        SelectorConfig::default(),
    ));
    program.run_until_idle(IDLE).unwrap();

    program.send(SelectorMsg::ToggleExpand(p("1")));
    let err = program.run_until_idle(Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, ProgramError::Deadline { outstanding: 1, .. }));
}

#[test]
fn handle_posts_intents_from_another_thread() {
    let source = FixtureSource::north_america().unwrap();
    let mut program = Program::new(SelectorModel::new(source, SelectorConfig::default()));
    program.run_until_idle(IDLE).unwrap();

    let handle = program.handle();
    thread::spawn(move || {
        handle.send(SelectorMsg::ToggleExpand(p("2"))).unwrap();
        handle.quit().unwrap();
    })
    .join()
    .unwrap();

    program.run().unwrap();
    assert!(!program.is_running());
    let forest = program.model().snapshot().forest;
    assert!(forest.get(&p("2")).unwrap().is_expanded());
}

#[test]
fn panicking_fetch_becomes_a_retryable_load_error() {
    let source = Arc::new(slow_ab(Duration::from_millis(0)));
    source.panic_next(p("2"));
    let mut program = Program::new(SelectorModel::with_shared_source(
        Arc::clone(&source),
        SelectorConfig::default(),
    ));
    program.run_until_idle(IDLE).unwrap();

    program.send(SelectorMsg::ToggleExpand(p("2")));
    program.run_until_idle(IDLE).unwrap();
    assert_eq!(program.outstanding(), 0);

    let snapshot = program.model().snapshot();
    let b = snapshot.forest.get(&p("2")).unwrap();
    assert!(b.has_load_error());
    assert!(!b.is_loading_children());
    assert_eq!(snapshot.in_flight, 0);
    assert!(snapshot.notice.as_deref().is_some_and(|n| n.contains("task panicked")));

    program.send(SelectorMsg::ToggleExpand(p("2")));
    program.run_until_idle(IDLE).unwrap();
    let forest = program.model().snapshot().forest;
    assert_eq!(forest.children_of(&p("2")), Some(vec![p("2/4")]));
    assert_eq!(source.children_calls(&p("2")), 2);
}

#[test]
fn run_ends_when_every_handle_is_dropped() {
    let source = FixtureSource::north_america().unwrap();
    let mut program = Program::new(SelectorModel::new(source, SelectorConfig::default()));
    let handle = program.handle();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.send(SelectorMsg::ToggleExpand(p("9"))).unwrap();
    });

    let result = program.run();
    sender.join().unwrap();
    assert!(matches!(result, Err(ProgramError::Disconnected)));
    assert_eq!(program.handle_count(), 0);
    assert_eq!(program.outstanding(), 0);
    assert_eq!(program.model().status(), &SelectorStatus::Ready);
}
