//! [`EngineConfig`]: the parameters a single build run is started with.
//!
//! This is constructed once per process from CLI flags (see `ekam-cli`) and
//! handed to the engine; the engine treats it as read-only for the run's
//! duration. It is never round-tripped through a [`crate::config::ConfigStore`]
//! — the engine itself is stateless between runs, per the "Persisted state"
//! note in the external-interfaces section of the spec this crate serves.
//! Only the CLI's own user preferences (e.g. last-used flags) go through
//! that path, via `ekam-config-fs`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the engine installs the build outputs it marks for installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallDirs {
    /// Destination for executable artifacts.
    pub bin: PathBuf,
    /// Destination for library artifacts.
    pub lib: PathBuf,
}

/// Parameters for one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Project root; `src/` and `tmp/` are resolved under this.
    pub root: PathBuf,
    /// Upper bound on actions with a live subprocess at once (spec §4.4, §5).
    pub max_concurrent_actions: usize,
    /// `-c`: keep watching source files and rebuild after the queue drains,
    /// instead of exiting once it's empty.
    pub continuous: bool,
    /// Absolute directories the shim passes through unrewritten
    /// (`EKAM_REMAP_BYPASS_DIRS`): `tmp/`, `bin/`, `lib/`, VCS metadata, and
    /// any user-specified ones. Distinct from the `-n` status-server flag.
    pub bypass_dirs: Vec<PathBuf>,
    /// `-l`: cap on captured output lines kept per failed action, `None`
    /// for unlimited.
    pub log_line_cap: Option<usize>,
    /// `-v` count: 0 is errors only, higher values enable progressively
    /// more `tracing` verbosity (see the logging conventions doc).
    pub verbosity: u8,
    /// Install destinations for actions that request installation.
    pub install_dirs: InstallDirs,
}

impl EngineConfig {
    /// Build a config rooted at `root` with every other field defaulted:
    /// concurrency matching available parallelism, continuous mode off,
    /// no bypass dirs beyond the ones the engine always excludes, no log
    /// cap, default verbosity, and `bin`/`lib` installed under `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> EngineConfig {
        let concurrency = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        EngineConfig {
            install_dirs: InstallDirs {
                bin: root.join("bin"),
                lib: root.join("lib"),
            },
            root,
            max_concurrent_actions: concurrency,
            continuous: false,
            bypass_dirs: Vec::new(),
            log_line_cap: None,
            verbosity: 0,
        }
    }
}
