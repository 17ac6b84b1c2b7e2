//! `-c`: watch the source tree and rebuild on change (§6).
//!
//! Adapted from the `notify`-backed file watcher pattern used elsewhere in
//! the retrieval pack's TUI tooling, stripped down to a purely synchronous
//! form: the engine's event loop is single-threaded, so there is no async
//! runtime here to bridge into.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// One observed change to the source tree: a file was created/modified, or
/// removed, at the given project-relative canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    /// A file was created or its contents changed.
    Upserted(String),
    /// A file was removed.
    Removed(String),
}

/// Watches a source tree for changes, surfacing them as [`SourceChange`]s.
pub trait SourceWatcher {
    /// Block for up to `timeout`, returning whatever changes arrived.
    /// An empty vec means nothing changed within the timeout.
    fn poll_changes(&mut self, timeout: Duration) -> Vec<SourceChange>;
}

/// A [`SourceWatcher`] backed by `notify::RecommendedWatcher`, polling the
/// underlying OS mechanism (or falling back to stat-polling on platforms
/// without native file events) and funneling events through a synchronous
/// channel.
pub struct NotifyWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    src_root: PathBuf,
}

impl NotifyWatcher {
    /// Start watching `src_root` (recursively) for changes.
    pub fn new(src_root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let config = Config::default().with_poll_interval(Duration::from_millis(500));
        let mut watcher = RecommendedWatcher::new(tx, config)?;
        watcher.watch(src_root, RecursiveMode::Recursive)?;
        Ok(NotifyWatcher {
            _watcher: watcher,
            rx,
            src_root: src_root.to_path_buf(),
        })
    }

    fn canonical_name(&self, path: &Path) -> Option<String> {
        strip_root(&self.src_root, path)
    }
}

fn strip_root(src_root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(src_root).ok().map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

impl SourceWatcher for NotifyWatcher {
    fn poll_changes(&mut self, timeout: Duration) -> Vec<SourceChange> {
        let mut changes = Vec::new();
        let Ok(event) = self.rx.recv_timeout(timeout) else {
            return changes;
        };
        for event in std::iter::once(event).chain(std::iter::from_fn(|| self.rx.try_recv().ok())) {
            let Ok(event) = event else { continue };
            let change = match event.kind {
                EventKind::Remove(_) => SourceChange::Removed,
                EventKind::Create(_) | EventKind::Modify(_) => SourceChange::Upserted,
                _ => continue,
            };
            for path in &event.paths {
                if let Some(name) = self.canonical_name(path) {
                    changes.push(change(name));
                }
            }
        }
        changes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strip_root_makes_a_project_relative_canonical_name() {
        let root = Path::new("/project/src");
        assert_eq!(strip_root(root, &root.join("a/b.cpp")), Some("a/b.cpp".to_string()));
    }

    #[test]
    fn strip_root_rejects_paths_outside_the_source_tree() {
        let root = Path::new("/project/src");
        assert_eq!(strip_root(root, Path::new("/other/a.cpp")), None);
    }
}
