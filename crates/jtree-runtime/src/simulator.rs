#![forbid(unsafe_code)]

//! Deterministic, single-threaded driver for [`Model`]s.
//!
//! [`ProgramSimulator`] executes commands like [`Program`](crate::program::Program)
//! except that tasks are queued instead of spawned. Tests decide when each
//! task runs, and in what order, which makes out-of-order and cancelled
//! completions reproducible.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use jtree_core::CancellationSource;
use tracing::{debug, warn};

use crate::program::{Cmd, Model, TaskFn, TaskSpec, panic_reason};

/// A command as seen by the simulator, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdRecord {
    Msg,
    Log(String),
    Task(TaskSpec),
    Cancel(String),
    Quit,
}

struct QueuedTask<M> {
    spec: TaskSpec,
    source: CancellationSource,
    run: TaskFn<M>,
}

/// Headless model driver with a manual task queue.
pub struct ProgramSimulator<M: Model> {
    model: M,
    queue: VecDeque<QueuedTask<M::Message>>,
    running: bool,
    logs: Vec<String>,
    command_log: Vec<CmdRecord>,
}

impl<M: Model> ProgramSimulator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            queue: VecDeque::new(),
            running: true,
            logs: Vec::new(),
            command_log: Vec::new(),
        }
    }

    /// Run `init()` and execute its commands.
    pub fn init(&mut self) {
        let cmd = self.model.init();
        self.execute(cmd);
    }

    /// Deliver a message. Ignored once the model has quit.
    pub fn send(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute(cmd);
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

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Every command executed so far, flattened.
    pub fn command_log(&self) -> &[CmdRecord] {
        &self.command_log
    }

    /// Specs of the queued tasks, oldest first.
    pub fn pending_tasks(&self) -> Vec<&TaskSpec> {
        self.queue.iter().map(|task| &task.spec).collect()
    }

    /// Whether the queued task with `key` has been cancelled.
    pub fn is_cancelled(&self, key: &str) -> Option<bool> {
        self.queue
            .iter()
            .find(|task| task.spec.key.as_deref() == Some(key))
            .map(|task| task.source.is_cancelled())
    }

    /// Run the oldest queued task and deliver its result.
    pub fn run_next_task(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(task) => {
                self.complete(task);
                true
            }
            None => false,
        }
    }

    /// Run the oldest queued task matching `pred`.
    pub fn run_task_where(&mut self, pred: impl Fn(&TaskSpec) -> bool) -> bool {
        let Some(index) = self.queue.iter().position(|task| pred(&task.spec)) else {
            return false;
        };
        match self.queue.remove(index) {
            Some(task) => {
                self.complete(task);
                true
            }
            None => false,
        }
    }

    /// Run the newest queued task (reverse arrival order).
    pub fn run_last_task(&mut self) -> bool {
        match self.queue.pop_back() {
            Some(task) => {
                self.complete(task);
                true
            }
            None => false,
        }
    }

    /// Run queued tasks, including ones they enqueue, until none remain.
    /// Returns how many ran.
    pub fn run_all_tasks(&mut self) -> usize {
        let mut count = 0;
        while self.run_next_task() {
            count += 1;
        }
        count
    }

    fn complete(&mut self, task: QueuedTask<M::Message>) {
        debug!(target: "jtree.program", task = %task.spec.name, "simulated task run");
        let token = task.source.token();
        let run = task.run;
        match catch_unwind(AssertUnwindSafe(|| run(&token))) {
            Ok(msg) => self.send(msg),
            Err(payload) => {
                let reason = panic_reason(&*payload);
                warn!(target: "jtree.program", task = %task.spec.name, reason = %reason, "task lost");
                if self.running {
                    let cmd = self.model.task_lost(&task.spec, &reason);
                    self.execute(cmd);
                }
            }
        }
    }

    fn execute(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => {
                self.command_log.push(CmdRecord::Quit);
                self.running = false;
            }
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd);
                }
            }
            Cmd::Msg(msg) => {
                self.command_log.push(CmdRecord::Msg);
                self.send(msg);
            }
            Cmd::Log(line) => {
                self.command_log.push(CmdRecord::Log(line.clone()));
                self.logs.push(line);
            }
            Cmd::Task(spec, run) => {
                self.command_log.push(CmdRecord::Task(spec.clone()));
                self.queue.push_back(QueuedTask {
                    spec,
                    source: CancellationSource::new(),
                    run,
                });
            }
            Cmd::Cancel(key) => {
                self.command_log.push(CmdRecord::Cancel(key.clone()));
                if let Some(task) = self
                    .queue
                    .iter()
                    .find(|task| task.spec.key.as_deref() == Some(key.as_str()))
                {
                    task.source.cancel();
                }
            }
        }
    }
}
