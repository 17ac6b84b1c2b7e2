// SPDX-License-Identifier: Apache-2.0
//! Filesystem-backed [`ConfigStore`] used by the `ekam` CLI to remember
//! user preferences (e.g. last-used flags) between invocations, under
//! `<project root>/.ekam/`. The engine core never touches this store — see
//! `ekam_app_core::engine_config`.

use ekam_app_core::{ConfigError, ConfigStore};
use std::fs;
use std::path::PathBuf;

/// Stores configs as JSON files under `<project root>/.ekam/`.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at `<project_root>/.ekam/`, creating that
    /// directory if it does not already exist.
    pub fn new(project_root: &std::path::Path) -> Result<Self, ConfigError> {
        let base = project_root.join(".ekam");
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ekam_app_core::ConfigService;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Prefs {
        last_jobs: usize,
    }

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::new(dir.path()).unwrap();
        let service = ConfigService::new(store);
        let loaded: Option<Prefs> = service.load("prefs").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::new(dir.path()).unwrap();
        let service = ConfigService::new(store);
        service.save("prefs", &Prefs { last_jobs: 4 }).unwrap();
        let loaded: Option<Prefs> = service.load("prefs").unwrap();
        assert_eq!(loaded, Some(Prefs { last_jobs: 4 }));
    }
}
