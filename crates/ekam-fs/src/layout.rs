//! Project directory layout: where source, scratch work, and installed
//! artifacts live on disk, per the shared-resources rules in spec §5.
//!
//! ```text
//! <project root>/
//!   src/   read-only source tree
//!   tmp/   one scratch subdirectory per driver, named by driver id
//!   bin/   installed executables (spec §4.2 install)
//!   lib/   installed libraries
//! ```

use crate::disk::DiskArtifact;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolved absolute paths for a project's four top-level directories.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Adopt `root` as a project root. Does not touch the filesystem.
    #[must_use]
    pub fn new(root: PathBuf) -> ProjectLayout {
        ProjectLayout { root }
    }

    /// The project root itself.
    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// The read-only source tree.
    #[must_use]
    pub fn src(&self) -> DiskArtifact {
        DiskArtifact::new(Arc::new(self.root.join("src")), ".".to_string(), true)
    }

    /// The scratch tree that holds one subdirectory per live driver.
    #[must_use]
    pub fn tmp(&self) -> DiskArtifact {
        DiskArtifact::new(Arc::new(self.root.join("tmp")), ".".to_string(), false)
    }

    /// The installed-binaries directory.
    #[must_use]
    pub fn bin(&self) -> DiskArtifact {
        DiskArtifact::new(Arc::new(self.root.join("bin")), ".".to_string(), false)
    }

    /// The installed-libraries directory.
    #[must_use]
    pub fn lib(&self) -> DiskArtifact {
        DiskArtifact::new(Arc::new(self.root.join("lib")), ".".to_string(), false)
    }

    /// A fresh, empty scratch directory for a single driver run, named by
    /// its opaque scratch id (typically the driver's numeric handle
    /// rendered as a string, so reruns of the same driver reuse prior
    /// scratch content is explicitly not implied: callers that want a
    /// clean directory should [`ScratchDir::clear`] first).
    #[must_use]
    pub fn scratch_dir(&self, scratch_id: &str) -> ScratchDir {
        ScratchDir {
            artifact: DiskArtifact::new(
                Arc::new(self.root.join("tmp").join(scratch_id)),
                ".".to_string(),
                false,
            ),
        }
    }
}

/// A single driver's private scratch space under `tmp/`.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    artifact: DiskArtifact,
}

impl ScratchDir {
    /// The artifact rooted at this scratch directory.
    #[must_use]
    pub fn artifact(&self) -> &DiskArtifact {
        &self.artifact
    }

    /// The absolute path of this scratch directory.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.artifact.absolute_path()
    }

    /// Ensure the directory exists, creating parents as needed.
    pub fn ensure(&self) -> std::io::Result<()> {
        crate::artifact::recursively_create_directory(&self.artifact)
    }

    /// Remove the directory and everything under it, if present.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.artifact.exists() {
            self.artifact.unlink()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;

    #[test]
    fn scratch_dir_is_created_under_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().to_path_buf());
        let scratch = layout.scratch_dir("driver-7");
        scratch.ensure().unwrap();
        assert!(scratch.path().starts_with(dir.path().join("tmp")));
        assert!(scratch.artifact().is_directory());
    }

    #[test]
    fn clear_removes_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().to_path_buf());
        let scratch = layout.scratch_dir("driver-1");
        scratch.ensure().unwrap();
        scratch.artifact().relative("leftover.txt").write_all(b"x").unwrap();
        scratch.clear().unwrap();
        assert!(!scratch.path().exists());
    }

    #[test]
    fn src_tree_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let layout = ProjectLayout::new(dir.path().to_path_buf());
        assert!(layout.src().write_all(b"nope").is_err());
    }
}
