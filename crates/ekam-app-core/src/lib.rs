// SPDX-License-Identifier: Apache-2.0
//! Application-level services shared by the engine and its CLI: the
//! run-scoped [`EngineConfig`] and the generic config storage port used to
//! persist CLI user preferences between invocations.

pub mod config;
pub mod engine_config;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use engine_config::{EngineConfig, InstallDirs};
