// SPDX-License-Identifier: Apache-2.0
//! A line-oriented terminal `Dashboard`, grounded on the original
//! `ConsoleDashboard`: silent tasks are only written if they produced
//! output, buffered output is flushed (and truncated past a line cap) when
//! a task reaches a terminal state, and the verb is colored by outcome.

use crate::task::{Dashboard, Silence, Task, TaskState};
use std::io::Write;
use std::sync::{Arc, Mutex};

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_CLEAR: &str = "\x1b[0m";

struct Inner<W> {
    writer: W,
    log_line_cap: Option<usize>,
    only_print_failures: bool,
}

/// A `Dashboard` that writes one line per task completion to a writer
/// (stdout by default), with buffered output indented beneath it.
pub struct ConsoleDashboard<W> {
    inner: Arc<Mutex<Inner<W>>>,
}

impl ConsoleDashboard<std::io::Stdout> {
    /// A dashboard writing to stdout. `log_line_cap` bounds how many lines
    /// of buffered output are printed per task before truncating;
    /// `only_print_failures` suppresses DONE/PASSED lines entirely.
    #[must_use]
    pub fn new(log_line_cap: Option<usize>, only_print_failures: bool) -> Self {
        Self::with_writer(std::io::stdout(), log_line_cap, only_print_failures)
    }
}

impl<W: Write + Send> ConsoleDashboard<W> {
    /// A dashboard writing to an arbitrary writer (tests use an in-memory
    /// buffer here).
    pub fn with_writer(writer: W, log_line_cap: Option<usize>, only_print_failures: bool) -> Self {
        ConsoleDashboard {
            inner: Arc::new(Mutex::new(Inner {
                writer,
                log_line_cap,
                only_print_failures,
            })),
        }
    }
}

impl<W: Write + Send + 'static> Dashboard for ConsoleDashboard<W> {
    fn begin_task(&self, verb: &str, noun: &str, silence: Silence) -> Box<dyn Task> {
        Box::new(ConsoleTask {
            inner: self.inner.clone(),
            verb: verb.to_string(),
            noun: noun.to_string(),
            silence,
            state: TaskState::Pending,
            output: String::new(),
        })
    }
}

struct ConsoleTask<W> {
    inner: Arc<Mutex<Inner<W>>>,
    verb: String,
    noun: String,
    silence: Silence,
    state: TaskState,
    output: String,
}

impl<W: Write + Send> Task for ConsoleTask<W> {
    fn set_state(&mut self, state: TaskState) {
        // Unblocking clears whatever explanation we buffered for BLOCKED.
        if self.state == TaskState::Blocked
            && matches!(state, TaskState::Pending | TaskState::Running)
        {
            self.output.clear();
        }
        self.state = state;
        match state {
            TaskState::Done => self.write_final(ANSI_CYAN, /* is_failure */ false),
            TaskState::Passed => self.write_final(ANSI_GREEN, false),
            TaskState::Failed => self.write_final(ANSI_RED, true),
            TaskState::Pending | TaskState::Running | TaskState::Blocked => {}
        }
    }

    fn add_output(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

impl<W: Write + Send> ConsoleTask<W> {
    fn write_final(&mut self, verb_color: &str, is_failure: bool) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.only_print_failures && !is_failure {
            self.output.clear();
            return;
        }
        let silent = self.silence == Silence::Silent && self.output.is_empty();
        if silent {
            return;
        }
        let _ = writeln!(
            inner.writer,
            "{verb_color}{}:{ANSI_CLEAR} {}",
            self.verb, self.noun
        );
        if !self.output.is_empty() {
            let cap = inner.log_line_cap.unwrap_or(usize::MAX);
            let mut lines = self.output.lines();
            for line in lines.by_ref().take(cap) {
                let color = line_color(line);
                let _ = match color {
                    Some(c) => writeln!(inner.writer, "  {c}{line}{ANSI_CLEAR}"),
                    None => writeln!(inner.writer, "  {line}"),
                };
            }
            if lines.next().is_some() {
                let _ = writeln!(inner.writer, "  ...(log truncated)...");
            }
            self.output.clear();
        }
        let _ = inner.writer.flush();
    }
}

/// Highlight a buffered-output line red/yellow if it looks like an error
/// or warning, the way the original's `LogFormatter` colors matched words.
fn line_color(line: &str) -> Option<&'static str> {
    let lower = line.to_ascii_lowercase();
    if ["error", "fail", "failed", "fatal"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Some(ANSI_RED)
    } else if lower.contains("warning") {
        Some(ANSI_YELLOW)
    } else {
        None
    }
}
