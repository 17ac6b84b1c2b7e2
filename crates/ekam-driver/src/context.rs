//! [`ActionContextImpl`]: binds one running [`ActionDriver`] to the shared
//! [`Graph`] for the duration of a single `Action` callback (a `start()`
//! call or one RPC request dispatch).

use crate::action::{ActionContext, ActionFactory};
use crate::driver::ActionDriver;
use crate::state::DriverState;
use ekam_core::Tag;
use ekam_fs::Artifact;
use ekam_graph::{Graph, InstallLocation};

/// Short-lived adapter: every call records into `driver`'s local staging
/// area or queries `graph` directly, never holding either past the call
/// that constructed it.
pub struct ActionContextImpl<'a> {
    driver: &'a mut ActionDriver,
    graph: &'a mut Graph,
}

impl<'a> ActionContextImpl<'a> {
    /// Bind `driver` (which must be RUNNING) to `graph`.
    pub fn new(driver: &'a mut ActionDriver, graph: &'a mut Graph) -> Self {
        ActionContextImpl { driver, graph }
    }
}

impl ActionContext for ActionContextImpl<'_> {
    fn find_provider(&mut self, tag: Tag) -> Option<Box<dyn Artifact>> {
        if self.driver.state() != DriverState::Running {
            debug_assert!(false, "find_provider() on a non-running driver");
            return None;
        }
        let consumer_name = self.driver.source().canonical_name().to_string();
        let resolved = self.graph.resolve(tag, &consumer_name);
        self.graph.record_dependency(tag, self.driver.id(), resolved);
        resolved.and_then(|pid| self.graph.provision(pid)).map(|p| p.artifact().clone_box())
    }

    fn find_input(&mut self, path: &str) -> Option<Box<dyn Artifact>> {
        let base = self
            .driver
            .source()
            .parent()
            .map(|p| p.canonical_name().to_string())
            .unwrap_or_else(|| ".".to_string());
        let joined = if base == "." { path.to_string() } else { format!("{base}/{path}") };
        self.find_provider(Tag::from_file(&joined))
    }

    fn provide(&mut self, artifact: Box<dyn Artifact>, tags: Vec<Tag>) {
        self.driver.stage_provide(artifact, tags);
    }

    fn install(&mut self, artifact: &dyn Artifact, location: InstallLocation, name: String) {
        self.driver.stage_install(artifact, location, name);
    }

    fn new_output(&mut self, path: &str) -> std::io::Result<Box<dyn Artifact>> {
        let artifact = self.driver.scratch().artifact().relative(path);
        if let Some(parent) = artifact.parent() {
            ekam_fs::recursively_create_directory(parent.as_ref())?;
        }
        self.driver.stage_provide(artifact.clone_box(), vec![Tag::default_tag()]);
        Ok(artifact)
    }

    fn new_provider(&mut self, tag: Tag) -> std::io::Result<Box<dyn Artifact>> {
        let filename = format!("provider-{tag}");
        let artifact = self.driver.scratch().artifact().relative(&filename);
        if let Some(parent) = artifact.parent() {
            ekam_fs::recursively_create_directory(parent.as_ref())?;
        }
        self.driver.stage_provide(artifact.clone_box(), vec![tag]);
        Ok(artifact)
    }

    fn note_input(&mut self, path: &str) {
        let tag = Tag::from_name(&format!("absfile:{path}"));
        self.graph.record_dependency(tag, self.driver.id(), None);
    }

    fn log(&mut self, text: &str) {
        self.driver.append_log(text);
    }

    fn add_action_type(&mut self, factory: Box<dyn ActionFactory>) {
        self.driver.stage_factory(factory);
    }

    fn passed(&mut self) {
        self.driver.mark_passed();
    }

    fn failed(&mut self, message: &str) {
        self.driver.mark_failed(message);
    }

    fn done(&mut self) {
        self.driver.mark_done();
    }
}
