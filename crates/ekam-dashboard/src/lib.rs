// SPDX-License-Identifier: Apache-2.0
//! The `Dashboard`/`Task` status-reporting contract (§6) and a
//! [`console::ConsoleDashboard`] implementation of it.
//!
//! The engine creates one [`Task`] per `ActionDriver`, mirrors its state
//! transitions onto [`Task::set_state`], and forwards logged rule output
//! through [`Task::add_output`]. Everything here is an external collaborator
//! from the core's point of view: the engine only ever holds a `dyn
//! Dashboard` trait object.
#![forbid(unsafe_code)]

mod console;
mod task;

pub use console::ConsoleDashboard;
pub use task::{Dashboard, Silence, Task, TaskState};
