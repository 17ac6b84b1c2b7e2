//! Filesystem-backed [`Artifact`] implementation.

use crate::artifact::Artifact;
use ekam_core::{canonicalize_path, Hash};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file or directory rooted at a project directory (`src/`, `tmp/`,
/// `bin/`, or `lib/`). `canonical` is the path relative to `root`, already
/// collapsed the way [`ekam_core::Tag::from_file`] collapses it; `"."`
/// denotes the root itself.
#[derive(Debug, Clone)]
pub struct DiskArtifact {
    root: Arc<PathBuf>,
    canonical: String,
    /// Source artifacts are read-only: the engine never mutates `src/`.
    read_only: bool,
}

impl DiskArtifact {
    /// Wrap `root` itself as an artifact.
    #[must_use]
    pub fn root(root: PathBuf, read_only: bool) -> DiskArtifact {
        DiskArtifact {
            root: Arc::new(root),
            canonical: ".".to_string(),
            read_only,
        }
    }

    /// Build an artifact for `canonical` (already collapsed) under `root`.
    #[must_use]
    pub fn new(root: Arc<PathBuf>, canonical: String, read_only: bool) -> DiskArtifact {
        DiskArtifact {
            root,
            canonical,
            read_only,
        }
    }

    /// The absolute path this artifact resolves to.
    #[must_use]
    pub fn absolute_path(&self) -> PathBuf {
        if self.canonical == "." {
            self.root.as_ref().clone()
        } else {
            self.root.join(&self.canonical)
        }
    }
}

impl Artifact for DiskArtifact {
    fn basename(&self) -> String {
        Path::new(&self.canonical)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.canonical.clone())
    }

    fn canonical_name(&self) -> &str {
        &self.canonical
    }

    fn parent(&self) -> Option<Box<dyn Artifact>> {
        if self.canonical == "." {
            return None;
        }
        let parent_canonical = match self.canonical.rfind('/') {
            Some(idx) => self.canonical[..idx].to_string(),
            None => ".".to_string(),
        };
        Some(Box::new(DiskArtifact::new(
            Arc::clone(&self.root),
            parent_canonical,
            self.read_only,
        )))
    }

    fn exists(&self) -> bool {
        self.absolute_path().exists()
    }

    fn is_file(&self) -> bool {
        self.absolute_path().is_file()
    }

    fn is_directory(&self) -> bool {
        self.absolute_path().is_dir()
    }

    fn content_hash(&self) -> Hash {
        match self.read_all() {
            Ok(bytes) => Hash::of(&bytes),
            Err(_) => Hash::NULL,
        }
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        fs::read(self.absolute_path())
    }

    fn write_all(&self, content: &[u8]) -> io::Result<()> {
        if self.read_only {
            tracing::warn!(artifact = %self.canonical, "refused write to read-only artifact");
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("refusing to write read-only artifact {}", self.canonical),
            ));
        }
        tracing::trace!(artifact = %self.canonical, bytes = content.len(), "write_all");
        fs::write(self.absolute_path(), content)
    }

    fn list(&self) -> io::Result<Vec<Box<dyn Artifact>>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(self.absolute_path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_canonical = if self.canonical == "." {
                name
            } else {
                format!("{}/{}", self.canonical, name)
            };
            out.push(Box::new(DiskArtifact::new(
                Arc::clone(&self.root),
                child_canonical,
                self.read_only,
            )) as Box<dyn Artifact>);
        }
        Ok(out)
    }

    fn relative(&self, path: &str) -> Box<dyn Artifact> {
        let joined = if self.canonical == "." {
            path.to_string()
        } else {
            format!("{}/{}", self.canonical, path)
        };
        Box::new(DiskArtifact::new(
            Arc::clone(&self.root),
            canonicalize_path(&joined),
            self.read_only,
        ))
    }

    fn create_directory(&self) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("refusing to create read-only artifact {}", self.canonical),
            ));
        }
        fs::create_dir(self.absolute_path())
    }

    fn link(&self, target: &dyn Artifact) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("refusing to link over read-only artifact {}", self.canonical),
            ));
        }
        let target_path = target
            .as_disk_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "non-disk link target"))?;
        let self_path = self.absolute_path();
        if self_path.exists() {
            fs::remove_file(&self_path)?;
        }
        fs::hard_link(target_path, &self_path)
    }

    fn unlink(&self) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("refusing to unlink read-only artifact {}", self.canonical),
            ));
        }
        let path = self.absolute_path();
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn clone_box(&self) -> Box<dyn Artifact> {
        Box::new(self.clone())
    }

    fn as_disk_path(&self) -> Option<PathBuf> {
        Some(self.absolute_path())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn root(dir: &tempfile::TempDir) -> Arc<PathBuf> {
        Arc::new(dir.path().to_path_buf())
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let a = DiskArtifact::new(root(&dir), "foo.txt".to_string(), false);
        a.write_all(b"hello").unwrap();
        assert!(a.exists());
        assert!(a.is_file());
        assert_eq!(a.read_all().unwrap(), b"hello");
        assert_eq!(a.content_hash(), Hash::of(b"hello"));
    }

    #[test]
    fn read_only_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = DiskArtifact::new(root(&dir), "foo.txt".to_string(), true);
        let err = a.write_all(b"nope").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(!a.exists());
    }

    #[test]
    fn missing_file_hashes_to_null() {
        let dir = tempfile::tempdir().unwrap();
        let a = DiskArtifact::new(root(&dir), "missing.txt".to_string(), false);
        assert_eq!(a.content_hash(), Hash::NULL);
    }

    #[test]
    fn parent_and_relative_compose() {
        let dir = tempfile::tempdir().unwrap();
        let r = root(&dir);
        let a = DiskArtifact::new(Arc::clone(&r), "a/b/c.txt".to_string(), false);
        let parent = a.parent().unwrap();
        assert_eq!(parent.canonical_name(), "a/b");
        let back = parent.relative("c.txt");
        assert_eq!(back.canonical_name(), "a/b/c.txt");
    }

    #[test]
    fn list_returns_children() {
        let dir = tempfile::tempdir().unwrap();
        let r = root(&dir);
        let top = DiskArtifact::new(Arc::clone(&r), ".".to_string(), false);
        top.relative("x.txt").write_all(b"x").unwrap();
        let children = top.list().unwrap();
        assert!(children.iter().any(|c| c.basename() == "x.txt"));
    }

    #[test]
    fn link_hard_links_target_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let r = root(&dir);
        let src = DiskArtifact::new(Arc::clone(&r), "src.txt".to_string(), false);
        src.write_all(b"linked").unwrap();
        let dst = DiskArtifact::new(Arc::clone(&r), "dst.txt".to_string(), false);
        dst.link(&src).unwrap();
        assert_eq!(dst.read_all().unwrap(), b"linked");
    }
}
