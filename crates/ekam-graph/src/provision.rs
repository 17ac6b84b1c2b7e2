//! A [`Provision`]: one artifact contributed by one action run (or by the
//! engine itself, for source files).

use crate::ids::DriverId;
use ekam_core::{Hash, Tag};
use ekam_fs::Artifact;

/// One artifact, tagged, with the driver that produced it (`None` for a
/// source file registered directly by the engine).
#[derive(Debug)]
pub struct Provision {
    creator: Option<DriverId>,
    artifact: Box<dyn Artifact>,
    content_hash: Hash,
    tags: Vec<Tag>,
}

impl Provision {
    /// Build a provision. `content_hash` is frozen at construction time —
    /// callers recompute and replace it via [`Provision::set_content_hash`]
    /// at return-callback time, matching the "freeze now" rule in the
    /// driver's return procedure.
    #[must_use]
    pub fn new(creator: Option<DriverId>, artifact: Box<dyn Artifact>, tags: Vec<Tag>) -> Self {
        let content_hash = artifact.content_hash();
        Provision {
            creator,
            artifact,
            content_hash,
            tags,
        }
    }

    /// The driver that produced this provision, or `None` for a source file.
    #[must_use]
    pub fn creator(&self) -> Option<DriverId> {
        self.creator
    }

    /// The artifact this provision wraps.
    #[must_use]
    pub fn artifact(&self) -> &dyn Artifact {
        self.artifact.as_ref()
    }

    /// The tags this provision satisfies.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Add a tag not already present, matching repeated `provide` calls on
    /// the same artifact extending its tag set rather than creating a
    /// second provision.
    pub fn add_tag(&mut self, tag: Tag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// The content hash as of the last [`Provision::refresh_content_hash`]
    /// or construction.
    #[must_use]
    pub fn content_hash(&self) -> Hash {
        self.content_hash
    }

    /// Recompute and freeze the content hash from the artifact's current
    /// bytes. Called once, at return-callback time (§4.2 step 3b).
    pub fn refresh_content_hash(&mut self) {
        self.content_hash = self.artifact.content_hash();
    }

    /// Whether the backing artifact still exists on disk. Used to prune
    /// provisions for scratch files an action created and then deleted.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.artifact.exists()
    }
}
