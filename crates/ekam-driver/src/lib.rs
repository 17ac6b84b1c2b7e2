// SPDX-License-Identifier: Apache-2.0
//! The `Action`/`ActionFactory`/`ActionContext` traits, the `ActionDriver`
//! state machine, its return procedure, and the reset cascade that
//! invalidates drivers when the graph changes under them.

mod action;
mod cascade;
mod context;
mod driver;
mod returns;
mod state;

pub use action::{Action, ActionContext, ActionFactory};
pub use cascade::{reset, DriverHost};
pub use context::ActionContextImpl;
pub use driver::ActionDriver;
pub use returns::{complete, FiredTrigger, ReturnOutcome};
pub use state::DriverState;
