//! The built-in type-extraction action: fires on every source file's
//! default tag and assigns it `canonical:`, a `file:` tag per path suffix,
//! and either `directory:*` or `filetype:<ext>`. Grounded directly on
//! `ExtractTypeAction`/`ExtractTypeActionFactory` (`ekam.cpp`).

use ekam_core::Tag;
use ekam_driver::{Action, ActionContext, ActionFactory};
use ekam_fs::{split_extension, Artifact};

/// Tags every file/directory with its canonical name, every right-truncated
/// `file:` suffix, and a type tag (`directory:*` or `filetype:.ext`).
#[derive(Debug)]
pub struct ExtractTypeAction {
    file: Box<dyn Artifact>,
}

impl ExtractTypeAction {
    /// Bind to the artifact whose tags this run will assign.
    #[must_use]
    pub fn new(file: Box<dyn Artifact>) -> Self {
        ExtractTypeAction { file }
    }
}

impl Action for ExtractTypeAction {
    fn verb(&self) -> &str {
        "scan"
    }

    fn is_silent(&self) -> bool {
        true
    }

    fn start(&mut self, ctx: &mut dyn ActionContext) {
        let mut tags = Vec::new();
        let mut name = self.file.canonical_name().to_string();

        tags.push(Tag::from_name(&format!("canonical:{name}")));

        let last_component = loop {
            tags.push(Tag::from_file(&name));
            match name.find('/') {
                Some(slash) => name = name[slash + 1..].to_string(),
                None => break name,
            }
        };

        if self.file.is_directory() {
            tags.push(Tag::from_name("directory:*"));
        } else {
            let (_, ext) = split_extension(&last_component);
            if !ext.is_empty() {
                tags.push(Tag::from_name(&format!("filetype:{ext}")));
            }
        }

        ctx.provide(self.file.clone_box(), tags);
        ctx.passed();
    }
}

/// Triggers on [`Tag::default_tag`] and always accepts.
#[derive(Debug, Default)]
pub struct ExtractTypeActionFactory;

impl ActionFactory for ExtractTypeActionFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::default_tag()]
    }

    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ExtractTypeAction::new(artifact.clone_box())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ekam_driver::{ActionContextImpl, ActionDriver};
    use ekam_fs::{DiskArtifact, ProjectLayout};
    use ekam_graph::{DriverId, Graph};
    use std::sync::Arc;

    fn run(root: &std::path::Path, canonical: &str, is_dir: bool) -> Vec<Tag> {
        let layout = ProjectLayout::new(root.to_path_buf());
        let scratch = layout.scratch_dir("1");
        scratch.ensure().unwrap();
        if is_dir {
            std::fs::create_dir_all(root.join(canonical)).unwrap();
        } else if let Some(parent) = std::path::Path::new(canonical).parent() {
            std::fs::create_dir_all(root.join(parent)).unwrap();
            std::fs::write(root.join(canonical), b"x").unwrap();
        } else {
            std::fs::write(root.join(canonical), b"x").unwrap();
        }
        let source = DiskArtifact::new(Arc::new(root.to_path_buf()), canonical.to_string(), true);
        let mut driver = ActionDriver::new(DriverId::from_raw(1), "scan".to_string(), Box::new(source.clone()), scratch);
        driver.start_running();
        let mut graph = Graph::new();
        let mut ctx = ActionContextImpl::new(&mut driver, &mut graph);
        let mut action = ExtractTypeAction::new(Box::new(source));
        action.start(&mut ctx);

        let outcome = ekam_driver::complete(&mut driver, &mut graph);
        let pid = outcome.registered[0];
        graph.provision(pid).unwrap().tags().to_vec()
    }

    #[test]
    fn tags_every_suffix_of_a_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let tags = run(dir.path(), "a/b/c.cpp", false);
        assert!(tags.contains(&Tag::from_name("canonical:a/b/c.cpp")));
        assert!(tags.contains(&Tag::from_file("a/b/c.cpp")));
        assert!(tags.contains(&Tag::from_file("b/c.cpp")));
        assert!(tags.contains(&Tag::from_file("c.cpp")));
        assert!(tags.contains(&Tag::from_name("filetype:.cpp")));
    }

    #[test]
    fn directories_get_the_directory_tag_not_a_filetype() {
        let dir = tempfile::tempdir().unwrap();
        let tags = run(dir.path(), "a/subdir", true);
        assert!(tags.contains(&Tag::from_name("directory:*")));
        assert!(!tags.iter().any(|t| *t == Tag::from_name("filetype:")));
    }

    #[test]
    fn extensionless_files_get_no_filetype_tag() {
        let dir = tempfile::tempdir().unwrap();
        let tags = run(dir.path(), "Makefile", false);
        let expected = [
            Tag::from_name("canonical:Makefile"),
            Tag::from_file("Makefile"),
        ];
        assert_eq!(tags.len(), expected.len());
        for tag in expected {
            assert!(tags.contains(&tag));
        }
    }
}
