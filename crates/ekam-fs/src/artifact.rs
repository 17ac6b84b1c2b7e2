//! The [`Artifact`] trait: an on-disk file or directory participating in a
//! build, as described in spec §3. The engine never mutates source files;
//! nothing in this trait enforces that on its own — [`crate::disk`] enforces
//! it by refusing write-mode opens under the read-only `src/` root.

use ekam_core::Hash;
use std::fmt;
use std::io;

/// An on-disk file or directory. Implementations are expected to be cheap
/// to clone (a path plus a root reference) — see [`Artifact::clone_box`].
pub trait Artifact: fmt::Debug + Send + Sync {
    /// The last path component.
    fn basename(&self) -> String;

    /// Project-relative path, with `.`/`..`/duplicate slashes already
    /// collapsed. `"."` for the artifact tree root.
    fn canonical_name(&self) -> &str;

    /// The containing directory, or `None` at the tree root.
    fn parent(&self) -> Option<Box<dyn Artifact>>;

    /// Two artifacts are the same artifact iff their canonical names match
    /// (they are resolved against the same root by construction).
    fn identity_eq(&self, other: &dyn Artifact) -> bool {
        self.canonical_name() == other.canonical_name()
    }

    /// Whether anything exists at this path right now.
    fn exists(&self) -> bool;
    /// Whether a regular file exists at this path.
    fn is_file(&self) -> bool;
    /// Whether a directory exists at this path.
    fn is_directory(&self) -> bool;

    /// Content hash of the current bytes, or [`Hash::NULL`] if the artifact
    /// does not exist or is not a file.
    fn content_hash(&self) -> Hash;

    /// Read the full file contents.
    fn read_all(&self) -> io::Result<Vec<u8>>;
    /// Overwrite the full file contents, creating the file if needed.
    fn write_all(&self, content: &[u8]) -> io::Result<()>;

    /// List immediate children of a directory artifact.
    fn list(&self) -> io::Result<Vec<Box<dyn Artifact>>>;

    /// Resolve `path` relative to this artifact (expected to be a
    /// directory), applying the same canonicalization as [`Tag::from_file`]
    /// to the resulting canonical name.
    ///
    /// [`Tag::from_file`]: ekam_core::Tag::from_file
    fn relative(&self, path: &str) -> Box<dyn Artifact>;

    /// Create this artifact as a directory, including any missing parents.
    fn create_directory(&self) -> io::Result<()>;
    /// Hard-link `target`'s content at this artifact's path, replacing
    /// whatever (if anything) was there.
    fn link(&self, target: &dyn Artifact) -> io::Result<()>;
    /// Remove this artifact if it exists.
    fn unlink(&self) -> io::Result<()>;

    /// Clone into a fresh trait object.
    fn clone_box(&self) -> Box<dyn Artifact>;

    /// The real filesystem path backing this artifact, if it has one.
    /// [`DiskArtifact`](crate::disk::DiskArtifact) overrides this so
    /// [`Artifact::link`] can hard-link across two trait objects that both
    /// happen to be disk-backed; non-disk implementations leave it `None`.
    fn as_disk_path(&self) -> Option<std::path::PathBuf> {
        None
    }
}

impl Clone for Box<dyn Artifact> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}

/// Create every missing directory from `location` up to (but not including)
/// its already-existing ancestors, mirroring `recursivelyCreateDirectory`.
pub fn recursively_create_directory(location: &dyn Artifact) -> io::Result<()> {
    if location.is_directory() {
        return Ok(());
    }
    if let Some(parent) = location.parent() {
        recursively_create_directory(parent.as_ref())?;
    }
    location.create_directory()
}

/// Split a basename into `(stem, extension)`, extension including the dot
/// (e.g. `("foo", ".cpp")`), matching `splitExtension` in the original.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) => (name, ""), // dotfile with no extension, e.g. ".gitignore"
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_extension_basic() {
        assert_eq!(split_extension("foo.cpp"), ("foo", ".cpp"));
    }

    #[test]
    fn split_extension_none() {
        assert_eq!(split_extension("Makefile"), ("Makefile", ""));
    }

    #[test]
    fn split_extension_dotfile() {
        assert_eq!(split_extension(".gitignore"), (".gitignore", ""));
    }

    #[test]
    fn split_extension_multiple_dots_takes_last() {
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
    }
}
