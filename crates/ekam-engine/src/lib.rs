// SPDX-License-Identifier: Apache-2.0
//! The Ekam build engine: the [`Engine`] facade that ties the tagged-artifact
//! graph (`ekam-graph`), the `ActionDriver` state machine (`ekam-driver`),
//! and the scheduler (`ekam-scheduler`) into a runnable build loop, plus the
//! built-in rules every project gets for free: type extraction, install
//! execution, and exec-discovered rule plug-ins.

mod engine;
mod error;
mod exec_rule;
mod extract;
mod install;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use exec_rule::ExecRuleFactory;
pub use extract::{ExtractTypeAction, ExtractTypeActionFactory};
