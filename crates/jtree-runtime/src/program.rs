#![forbid(unsafe_code)]

//! Elm-style program loop.
//!
//! A [`Model`] owns all state and changes only inside [`Model::update`].
//! Side effects are described by [`Cmd`] values; blocking work is expressed
//! as [`Cmd::Task`], which the [`Program`] runs on a worker thread and whose
//! result comes back as a message. All model mutation therefore happens on
//! the thread that drives the program, and task results are applied in the
//! order they arrive, whatever order they were started in.
//!
//! # Example
//!
//! ```
//! use jtree_runtime::program::{Cmd, Model, Program, TaskSpec};
//! use std::time::Duration;
//!
//! struct Counter(u32);
//!
//! enum Msg {
//!     Add(u32),
//! }
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!
//!     fn init(&mut self) -> Cmd<Msg> {
//!         Cmd::task(TaskSpec::new("answer"), |_cancel| Msg::Add(42))
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         let Msg::Add(n) = msg;
//!         self.0 += n;
//!         Cmd::none()
//!     }
//! }
//!
//! let mut program = Program::new(Counter(0));
//! program.run_until_idle(Duration::from_secs(5)).unwrap();
//! assert_eq!(program.model().0, 42);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use jtree_core::{CancellationSource, CancellationToken};
use tracing::{debug, info, warn};
use web_time::{Duration, Instant};

/// The application state machine driven by a [`Program`].
pub trait Model {
    /// Messages that update the model. Task results are messages too, so
    /// they must cross threads.
    type Message: Send + 'static;

    /// Commands to run once at startup.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// The state transition function.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// A task ended without producing a message: it panicked or its thread
    /// could not be started.
    fn task_lost(&mut self, spec: &TaskSpec, reason: &str) -> Cmd<Self::Message> {
        let _ = (spec, reason);
        Cmd::none()
    }
}

/// Blocking work run off the update thread. Receives a token that is
/// cancelled when a [`Cmd::Cancel`] names the task's key.
pub type TaskFn<M> = Box<dyn FnOnce(&CancellationToken) -> M + Send + 'static>;

/// Describes a task for logs and for tests that pick tasks to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskSpec {
    /// Short, static kind of work (e.g. `"fetch_children"`).
    pub name: String,
    /// Unique handle used by [`Cmd::Cancel`].
    pub key: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Side effects returned from `init()` and `update()`.
pub enum Cmd<M> {
    /// No operation.
    None,
    /// Stop the program.
    Quit,
    /// Execute several commands.
    Batch(Vec<Cmd<M>>),
    /// Deliver a message to the model right away.
    Msg(M),
    /// Record a log line.
    Log(String),
    /// Run blocking work and deliver its result as a message.
    Task(TaskSpec, TaskFn<M>),
    /// Cancel the running task with this key. Its result is still delivered.
    Cancel(String),
}

impl<M> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Msg(_) => write!(f, "Msg(..)"),
            Self::Log(line) => f.debug_tuple("Log").field(line).finish(),
            Self::Task(spec, _) => f.debug_tuple("Task").field(spec).finish(),
            Self::Cancel(key) => f.debug_tuple("Cancel").field(key).finish(),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    #[inline]
    pub fn log(line: impl Into<String>) -> Self {
        Self::Log(line.into())
    }

    pub fn task(
        spec: TaskSpec,
        f: impl FnOnce(&CancellationToken) -> M + Send + 'static,
    ) -> Self {
        Self::Task(spec, Box::new(f))
    }

    pub fn cancel(key: impl Into<String>) -> Self {
        Self::Cancel(key.into())
    }

    /// Combine commands, collapsing empty and single-element batches.
    pub fn batch(cmds: Vec<Self>) -> Self {
        let mut cmds: Vec<Self> = cmds
            .into_iter()
            .filter(|cmd| !matches!(cmd, Self::None))
            .collect();
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => Self::Batch(cmds),
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Number of tasks anywhere in this command tree.
    #[must_use]
    pub fn count_tasks(&self) -> usize {
        match self {
            Self::Task(..) => 1,
            Self::Batch(cmds) => cmds.iter().map(Self::count_tasks).sum(),
            _ => 0,
        }
    }
}

/// Errors from driving a [`Program`].
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// Every handle was dropped with no task left to report back, so no
    /// further message can arrive.
    #[error("program channel disconnected")]
    Disconnected,
    /// `run_until_idle` gave up with work outstanding.
    #[error("program still busy after {waited_ms}ms ({outstanding} tasks outstanding)")]
    Deadline { waited_ms: u64, outstanding: usize },
}

enum Envelope<M> {
    Msg(M),
    TaskDone { key: Option<String>, msg: M },
    TaskLost { spec: TaskSpec, reason: String },
    /// The last [`ProgramHandle`] was dropped.
    HandlesGone,
    Quit,
}

/// Sends messages into a running [`Program`] from any thread.
///
/// The program counts live handles; once the last one drops and no task is
/// outstanding, [`Program::run`] returns.
pub struct ProgramHandle<M> {
    tx: mpsc::Sender<Envelope<M>>,
    live: Arc<AtomicUsize>,
}

impl<M> ProgramHandle<M> {
    fn register(tx: mpsc::Sender<Envelope<M>>, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self { tx, live }
    }
}

impl<M> Clone for ProgramHandle<M> {
    fn clone(&self) -> Self {
        Self::register(self.tx.clone(), Arc::clone(&self.live))
    }
}

impl<M> Drop for ProgramHandle<M> {
    fn drop(&mut self) {
        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.tx.send(Envelope::HandlesGone);
        }
    }
}

impl<M> fmt::Debug for ProgramHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramHandle").finish_non_exhaustive()
    }
}

impl<M: Send + 'static> ProgramHandle<M> {
    pub fn send(&self, msg: M) -> Result<(), ProgramError> {
        self.tx
            .send(Envelope::Msg(msg))
            .map_err(|_| ProgramError::Disconnected)
    }

    pub fn quit(&self) -> Result<(), ProgramError> {
        self.tx
            .send(Envelope::Quit)
            .map_err(|_| ProgramError::Disconnected)
    }
}

/// Threaded driver for a [`Model`].
pub struct Program<M: Model> {
    model: M,
    tx: mpsc::Sender<Envelope<M::Message>>,
    rx: mpsc::Receiver<Envelope<M::Message>>,
    live_handles: Arc<AtomicUsize>,
    cancel_sources: HashMap<String, CancellationSource>,
    outstanding: usize,
    initialized: bool,
    running: bool,
    logs: Vec<String>,
}

impl<M: Model> Program<M> {
    pub fn new(model: M) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            model,
            tx,
            rx,
            live_handles: Arc::new(AtomicUsize::new(0)),
            cancel_sources: HashMap::new(),
            outstanding: 0,
            initialized: false,
            running: true,
            logs: Vec::new(),
        }
    }

    pub fn handle(&self) -> ProgramHandle<M::Message> {
        ProgramHandle::register(self.tx.clone(), Arc::clone(&self.live_handles))
    }

    /// Handles currently alive.
    pub fn handle_count(&self) -> usize {
        self.live_handles.load(Ordering::Acquire)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tasks started but not yet delivered.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Lines recorded through [`Cmd::Log`].
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Run `init()` once. Called automatically by the run methods.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let cmd = self.model.init();
        self.execute(cmd);
    }

    /// Deliver a message on the current thread.
    pub fn send(&mut self, msg: M::Message) {
        self.init();
        self.dispatch(msg);
    }

    /// Process messages until [`Cmd::Quit`] or [`ProgramHandle::quit`].
    ///
    /// Returns [`ProgramError::Disconnected`] once every handle has been
    /// dropped and no task is left to report back.
    pub fn run(&mut self) -> Result<(), ProgramError> {
        self.init();
        info!(target: "jtree.program", "program started");
        while self.running {
            match self.rx.try_recv() {
                Ok(envelope) => {
                    self.handle_envelope(envelope);
                    continue;
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => return Err(ProgramError::Disconnected),
            }
            if self.outstanding == 0 && self.handle_count() == 0 {
                info!(target: "jtree.program", "all handles dropped");
                return Err(ProgramError::Disconnected);
            }
            let envelope = self.rx.recv().map_err(|_| ProgramError::Disconnected)?;
            self.handle_envelope(envelope);
        }
        info!(target: "jtree.program", "program stopped");
        Ok(())
    }

    /// Process messages until no task is outstanding and no message is
    /// queued, or `deadline` passes.
    pub fn run_until_idle(&mut self, deadline: Duration) -> Result<(), ProgramError> {
        self.init();
        let start = Instant::now();
        loop {
            while let Ok(envelope) = self.rx.try_recv() {
                self.handle_envelope(envelope);
            }
            if !self.running || self.outstanding == 0 {
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                warn!(
                    target: "jtree.program",
                    outstanding = self.outstanding,
                    "deadline reached with tasks outstanding"
                );
                return Err(ProgramError::Deadline {
                    waited_ms: elapsed.as_millis() as u64,
                    outstanding: self.outstanding,
                });
            }
            match self.rx.recv_timeout(deadline - elapsed) {
                Ok(envelope) => self.handle_envelope(envelope),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ProgramError::Disconnected);
                }
            }
        }
    }

    fn handle_envelope(&mut self, envelope: Envelope<M::Message>) {
        match envelope {
            Envelope::Msg(msg) => self.dispatch(msg),
            Envelope::TaskDone { key, msg } => {
                self.outstanding = self.outstanding.saturating_sub(1);
                if let Some(key) = key {
                    self.cancel_sources.remove(&key);
                }
                self.dispatch(msg);
            }
            Envelope::TaskLost { spec, reason } => {
                self.outstanding = self.outstanding.saturating_sub(1);
                self.lose_task(&spec, &reason);
            }
            Envelope::HandlesGone => {}
            Envelope::Quit => self.running = false,
        }
    }

    fn dispatch(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute(cmd);
    }

    fn lose_task(&mut self, spec: &TaskSpec, reason: &str) {
        if let Some(key) = &spec.key {
            self.cancel_sources.remove(key);
        }
        warn!(
            target: "jtree.program",
            task = %spec.name,
            key = spec.key.as_deref().unwrap_or(""),
            reason,
            "task lost"
        );
        if !self.running {
            return;
        }
        let cmd = self.model.task_lost(spec, reason);
        self.execute(cmd);
    }

    fn execute(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd);
                }
            }
            Cmd::Msg(msg) => self.dispatch(msg),
            Cmd::Log(line) => {
                debug!(target: "jtree.program", line = %line, "log");
                self.logs.push(line);
            }
            Cmd::Task(spec, run) => self.spawn(spec, run),
            Cmd::Cancel(key) => {
                if let Some(source) = self.cancel_sources.remove(&key) {
                    debug!(target: "jtree.program", key = %key, "task cancelled");
                    source.cancel();
                }
            }
        }
    }

    fn spawn(&mut self, spec: TaskSpec, run: TaskFn<M::Message>) {
        let source = CancellationSource::new();
        let token = source.token();
        if let Some(key) = &spec.key {
            self.cancel_sources.insert(key.clone(), source);
        }
        self.outstanding += 1;
        debug!(
            target: "jtree.program",
            task = %spec.name,
            key = spec.key.as_deref().unwrap_or(""),
            "task spawned"
        );
        let tx = self.tx.clone();
        let task_spec = spec.clone();
        let spawned = thread::Builder::new()
            .name(format!("jtree-{}", spec.name))
            .spawn(move || {
                let envelope = match catch_unwind(AssertUnwindSafe(|| run(&token))) {
                    Ok(msg) => Envelope::TaskDone {
                        key: task_spec.key,
                        msg,
                    },
                    Err(payload) => Envelope::TaskLost {
                        spec: task_spec,
                        reason: panic_reason(&*payload),
                    },
                };
                // The program may have been dropped; nothing to deliver to.
                let _ = tx.send(envelope);
            });
        if let Err(err) = spawned {
            self.outstanding -= 1;
            self.lose_task(&spec, &format!("cannot start task thread: {err}"));
        }
    }
}

/// Text of a panic payload, for [`Model::task_lost`].
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

impl<M: Model + fmt::Debug> fmt::Debug for Program<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("model", &self.model)
            .field("outstanding", &self.outstanding)
            .field("running", &self.running)
            .finish()
    }
}
