// SPDX-License-Identifier: Apache-2.0
//! The `Dashboard`/`Task` trait contract itself (§6), independent of any
//! particular rendering.

/// Lifecycle state of one dashboard-visible task, mirroring `ActionDriver`'s
/// own state machine (§3) plus `BLOCKED`, which the engine uses for a driver
/// waiting on an unsatisfied dependency rather than actively running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Default state: enqueued but not yet started.
    Pending,
    /// Started; the action may be issuing RPC calls or running a subprocess.
    Running,
    /// Finished without signalling pass/fail; treated as success.
    Done,
    /// Finished and explicitly reported pass (tests, typically).
    Passed,
    /// Reported failed, or threw an uncaught exception.
    Failed,
    /// Not running because a dependency it needs is unavailable.
    Blocked,
}

/// Whether a task's routine completion should be reported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Silence {
    /// Only report this task if it produces output (e.g. on failure).
    Silent,
    /// Always report this task's state transitions.
    Normal,
}

/// A handle to one in-flight dashboard entry. The engine calls
/// [`Task::set_state`] on every `ActionDriver` transition and
/// [`Task::add_output`] for every chunk of logged rule output.
pub trait Task: Send {
    /// Record a state transition.
    fn set_state(&mut self, state: TaskState);
    /// Append text to this task's buffered output log.
    fn add_output(&mut self, text: &str);
}

/// A status-reporting sink. The engine begins exactly one task per
/// `ActionDriver` invocation.
pub trait Dashboard: Send + Sync {
    /// Start reporting on a new task named `verb noun` (e.g. `"compile"`,
    /// `"foo.cpp"`). `silence` controls whether routine (non-failing)
    /// completion is reported.
    fn begin_task(&self, verb: &str, noun: &str, silence: Silence) -> Box<dyn Task>;
}
