//! Install-directive execution (§4.2 step 3e): a provision's install
//! directive only records *where* an artifact should land; this actually
//! hard-links it into the project's `bin/`/`lib/` directories.

use ekam_fs::{recursively_create_directory, Artifact};
use ekam_graph::InstallLocation;
use std::path::Path;

/// Hard-link `artifact` into `bin_dir`/`lib_dir` under `name`, creating the
/// destination directory if needed.
pub fn install(
    artifact: &dyn Artifact,
    location: InstallLocation,
    name: &str,
    bin_dir: &Path,
    lib_dir: &Path,
) -> std::io::Result<()> {
    let dest_root = match location {
        InstallLocation::Bin => bin_dir,
        InstallLocation::Lib => lib_dir,
    };
    let dest = ekam_fs::DiskArtifact::new(
        std::sync::Arc::new(dest_root.to_path_buf()),
        name.to_string(),
        false,
    );
    if let Some(parent) = dest.parent() {
        recursively_create_directory(parent.as_ref())?;
    }
    dest.link(artifact)
}

/// Remove a previously-installed link, if it is still there. Used when a
/// reset drops an install directive before its owning driver re-runs.
pub fn uninstall(location: InstallLocation, name: &str, bin_dir: &Path, lib_dir: &Path) -> std::io::Result<()> {
    let dest_root = match location {
        InstallLocation::Bin => bin_dir,
        InstallLocation::Lib => lib_dir,
    };
    let dest = ekam_fs::DiskArtifact::new(std::sync::Arc::new(dest_root.to_path_buf()), name.to_string(), false);
    if dest.exists() {
        dest.unlink()
    } else {
        Ok(())
    }
}
