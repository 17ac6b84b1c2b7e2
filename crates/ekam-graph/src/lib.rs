// SPDX-License-Identifier: Apache-2.0
//! The tagged-artifact graph: provisions, the tag index and its
//! preferred-provider tie-break, the dependency table, the trigger
//! registry, and the install table. `ekam-driver` layers the
//! `ActionDriver` state machine on top, addressing into this graph by the
//! [`DriverId`]/[`ProvisionId`]/[`FactoryId`] handles defined here.

mod dependency;
mod graph;
mod ids;
mod install;
mod provision;
mod tag_index;
mod trigger;

pub use dependency::{DependencyRow, DependencyTable};
pub use graph::Graph;
pub use ids::{DriverId, FactoryId, ProvisionId};
pub use install::{InstallDirective, InstallLocation, InstallTable};
pub use provision::Provision;
pub use tag_index::TagIndex;
pub use trigger::TriggerRegistry;
