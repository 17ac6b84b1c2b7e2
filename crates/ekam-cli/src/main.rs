// SPDX-License-Identifier: Apache-2.0
//! `ekam`: the build-by-discovery engine's command-line front end (§6).
//!
//! Scans `<root>/src` for source files, registers the built-in and
//! exec-discovered rules, and drives the engine to a fixpoint once — or,
//! under `-c`, repeatedly as the source tree changes.

mod watch;

use anyhow::{Context, Result};
use clap::Parser;
use ekam_app_core::{ConfigService, EngineConfig};
use ekam_config_fs::FsConfigStore;
use ekam_dashboard::ConsoleDashboard;
use ekam_engine::Engine;
use ekam_fs::{Artifact, ProjectLayout};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use watch::{NotifyWatcher, SourceChange, SourceWatcher};

/// Last-used flags, persisted under `<root>/.ekam/prefs.json` so a bare
/// `ekam` re-run without flags repeats the previous invocation's settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Prefs {
    jobs: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(name = "ekam", author, version, about = "Build by discovery")]
struct Args {
    /// Project root; defaults to the current directory.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Maximum number of actions with a live subprocess at once.
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Keep watching `src/` and rebuild after the queue drains, instead of
    /// exiting once it's empty.
    #[arg(short = 'c', long = "continuous")]
    continuous: bool,

    /// Run a status server on `[addr]:port` (accepted for compatibility;
    /// the status server itself is out of scope for this build).
    #[arg(short = 'n', long = "status-server", value_name = "[ADDR]:PORT")]
    status_server: Option<String>,

    /// Cap on captured output lines kept per failed action.
    #[arg(short = 'l', long = "log-lines")]
    log_lines: Option<usize>,

    /// Increase logging verbosity; repeatable.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity);

    if let Some(target) = &args.status_server {
        tracing::warn!(target = %target, "status server requested but not implemented; ignoring -n");
    }

    let root = args.root.canonicalize().with_context(|| format!("project root {} does not exist", args.root.display()))?;
    let prefs_store = FsConfigStore::new(&root).context("opening .ekam preferences store")?;
    let prefs_service = ConfigService::new(prefs_store);
    let mut prefs: Prefs = prefs_service.load("prefs").context("loading .ekam/prefs.json")?.unwrap_or_default();
    if let Some(jobs) = args.jobs {
        prefs.jobs = Some(jobs);
    }
    prefs_service.save("prefs", &prefs).context("saving .ekam/prefs.json")?;

    let mut config = EngineConfig::new(root.clone());
    if let Some(jobs) = prefs.jobs {
        config.max_concurrent_actions = jobs.max(1);
    }
    config.continuous = args.continuous;
    config.log_line_cap = args.log_lines;
    config.verbosity = args.verbosity;

    let dashboard = Box::new(ConsoleDashboard::new(config.log_line_cap, false));
    let mut engine = Engine::new(config, dashboard);

    let shim_path = locate_shim();
    if let Some(shim_path) = &shim_path {
        let rules_dir = root.join(".ekam-rules");
        if let Err(err) = engine.discover_exec_rules(&rules_dir, shim_path) {
            tracing::warn!(error = %err, "rule discovery failed");
        }
    } else {
        tracing::warn!("no remap shim found; exec-discovered rules will not be able to resolve relative paths");
    }

    let layout = ProjectLayout::new(root.clone());
    register_existing_sources(&mut engine, &layout)?;

    let mut ok = engine.run_to_fixpoint();

    if args.continuous {
        let src_root = root.join("src");
        let mut watcher = NotifyWatcher::new(&src_root).context("starting source watcher")?;
        loop {
            let changes = watcher.poll_changes(Duration::from_millis(500));
            if changes.is_empty() {
                continue;
            }
            for change in changes {
                apply_change(&mut engine, &layout, change);
            }
            ok = engine.run_to_fixpoint();
        }
    }

    std::process::exit(i32::from(!ok));
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Best-effort location of the `LD_PRELOAD` shim built alongside this
/// binary; exec-discovered rules that never touch the filesystem outside
/// their declared inputs/outputs still work without it.
fn locate_shim() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir.join("libekam_shim.so");
    candidate.exists().then_some(candidate)
}

fn register_existing_sources(engine: &mut Engine, layout: &ProjectLayout) -> Result<()> {
    let src = layout.src();
    if !src.is_directory() {
        return Ok(());
    }
    for file in walk_files(&src)? {
        engine.add_source_file(file);
    }
    Ok(())
}

fn walk_files(dir: &dyn Artifact) -> Result<Vec<Box<dyn Artifact>>> {
    let mut files = Vec::new();
    let mut stack = dir.list().context("listing source tree")?;
    while let Some(entry) = stack.pop() {
        if entry.is_directory() {
            stack.extend(entry.list().context("listing source subdirectory")?);
        } else if entry.is_file() {
            files.push(entry);
        }
    }
    Ok(files)
}

fn apply_change(engine: &mut Engine, layout: &ProjectLayout, change: SourceChange) {
    match change {
        SourceChange::Upserted(name) => {
            engine.remove_source_file(&name);
            engine.add_source_file(layout.src().relative(&name));
        }
        SourceChange::Removed(name) => engine.remove_source_file(&name),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn locate_shim_returns_none_when_absent() {
        assert!(locate_shim().is_none() || locate_shim().unwrap().exists());
    }

    #[test]
    fn walk_files_finds_nested_source_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/a/b")).unwrap();
        std::fs::write(dir.path().join("src/a/b/c.cpp"), b"x").unwrap();
        std::fs::write(dir.path().join("src/top.h"), b"x").unwrap();

        let layout = ProjectLayout::new(dir.path().to_path_buf());
        let files = walk_files(&layout.src()).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.canonical_name().to_string()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a/b/c.cpp".to_string()));
        assert!(names.contains(&"top.h".to_string()));
    }
}
