//! [`ActionDriver`]: the lifecycle object for one rule invocation (§3, §4.2).

use crate::action::ActionFactory;
use crate::state::DriverState;
use ekam_core::Tag;
use ekam_fs::{Artifact, ScratchDir};
use ekam_graph::{DriverId, InstallLocation};

struct PendingProvision {
    artifact: Box<dyn Artifact>,
    tags: Vec<Tag>,
}

struct PendingInstall {
    canonical_name: String,
    location: InstallLocation,
    name: String,
}

/// One invocation of an [`crate::Action`] bound to a specific source file.
/// Holds everything the action has staged (`provide`d artifacts, install
/// directives, sub-factories) until the return procedure ([`crate::complete`])
/// promotes it into the shared [`ekam_graph::Graph`].
pub struct ActionDriver {
    id: DriverId,
    state: DriverState,
    source: Box<dyn Artifact>,
    scratch: ScratchDir,
    verb: String,
    pending_provisions: Vec<PendingProvision>,
    pending_installs: Vec<PendingInstall>,
    pending_factories: Vec<Box<dyn ActionFactory>>,
    log_buffer: String,
    return_pending: bool,
    failure_message: Option<String>,
}

impl std::fmt::Debug for ActionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDriver")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("verb", &self.verb)
            .field("source", &self.source.canonical_name())
            .finish()
    }
}

impl ActionDriver {
    /// Build a driver in state PENDING for `verb` run against `source`,
    /// with `scratch` as its private `tmp/<driver>/` directory.
    #[must_use]
    pub fn new(id: DriverId, verb: String, source: Box<dyn Artifact>, scratch: ScratchDir) -> Self {
        ActionDriver {
            id,
            state: DriverState::Pending,
            source,
            scratch,
            verb,
            pending_provisions: Vec::new(),
            pending_installs: Vec::new(),
            pending_factories: Vec::new(),
            log_buffer: String::new(),
            return_pending: false,
            failure_message: None,
        }
    }

    /// This driver's handle.
    #[must_use]
    pub fn id(&self) -> DriverId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The source file this driver is bound to.
    #[must_use]
    pub fn source(&self) -> &dyn Artifact {
        self.source.as_ref()
    }

    /// This driver's scratch directory.
    #[must_use]
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// The action's verb, for dashboard display.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Accumulated log text.
    #[must_use]
    pub fn log_text(&self) -> &str {
        &self.log_buffer
    }

    /// The failure message, once FAILED.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    /// Advance PENDING → RUNNING. The scheduler calls this when starting
    /// the driver's action.
    pub fn start_running(&mut self) {
        debug_assert!(
            self.state == DriverState::Pending,
            "start_running() on driver {} in state {:?}",
            self.id,
            self.state
        );
        self.state = DriverState::Running;
    }

    /// Whether a return procedure is waiting to be dispatched (set by
    /// `passed`/`failed`, consumed by the event loop outside the action's
    /// own call stack, never synchronously — §3 "this must not run
    /// synchronously").
    #[must_use]
    pub fn return_pending(&self) -> bool {
        self.return_pending
    }

    /// Clear the "tell the event loop" bit now that it has been handled.
    pub(crate) fn clear_return_pending(&mut self) {
        self.return_pending = false;
    }

    /// Reset this driver back to a fresh PENDING state, dropping every bit
    /// of staged work. Used by the reset cascade (§4.3) and to recycle the
    /// driver object for its next run.
    pub fn reset(&mut self) {
        self.state = DriverState::Pending;
        self.pending_provisions.clear();
        self.pending_installs.clear();
        self.pending_factories.clear();
        self.log_buffer.clear();
        self.return_pending = false;
        self.failure_message = None;
    }

    // ---- ActionContext-adjacent operations, called through ActionContextImpl ----

    pub(crate) fn stage_provide(&mut self, artifact: Box<dyn Artifact>, tags: Vec<Tag>) {
        let name = artifact.canonical_name().to_string();
        if let Some(existing) = self
            .pending_provisions
            .iter_mut()
            .find(|p| p.artifact.canonical_name() == name)
        {
            for tag in tags {
                if !existing.tags.contains(&tag) {
                    existing.tags.push(tag);
                }
            }
        } else {
            self.pending_provisions.push(PendingProvision { artifact, tags });
        }
    }

    pub(crate) fn stage_install(&mut self, artifact: &dyn Artifact, location: InstallLocation, name: String) {
        let tag_name = match location {
            InstallLocation::Bin => format!("bin:{name}"),
            InstallLocation::Lib => format!("lib:{name}"),
        };
        self.stage_provide(artifact.clone_box(), vec![Tag::from_name(&tag_name)]);
        self.pending_installs.push(PendingInstall {
            canonical_name: artifact.canonical_name().to_string(),
            location,
            name,
        });
    }

    pub(crate) fn append_log(&mut self, text: &str) {
        self.log_buffer.push_str(text);
    }

    pub(crate) fn stage_factory(&mut self, factory: Box<dyn ActionFactory>) {
        self.pending_factories.push(factory);
    }

    pub(crate) fn mark_passed(&mut self) {
        if self.state == DriverState::Failed {
            return; // passed() after failed() is ignored
        }
        if self.state == DriverState::Running {
            self.state = DriverState::Passed;
            self.return_pending = true;
        }
    }

    pub(crate) fn mark_done(&mut self) {
        if self.state == DriverState::Running {
            self.state = DriverState::Done;
            self.return_pending = true;
        }
    }

    pub(crate) fn mark_failed(&mut self, message: &str) {
        if self.state == DriverState::Failed {
            return; // second call to failed() is ignored
        }
        if self.state == DriverState::Passed || self.state == DriverState::Done {
            debug_assert!(
                false,
                "failed() called on driver {} after it already reached {:?} - programming error",
                self.id, self.state
            );
            tracing::error!(driver = %self.id, prior_state = ?self.state, "failed() after terminal success state");
            return;
        }
        self.state = DriverState::Failed;
        self.failure_message = Some(message.to_string());
        self.return_pending = true;
    }

    pub(crate) fn drain_provisions(&mut self) -> Vec<(Box<dyn Artifact>, Vec<Tag>)> {
        self.pending_provisions
            .drain(..)
            .map(|p| (p.artifact, p.tags))
            .collect()
    }

    pub(crate) fn pending_installs(&self) -> impl Iterator<Item = (&str, InstallLocation, &str)> {
        self.pending_installs
            .iter()
            .map(|i| (i.canonical_name.as_str(), i.location, i.name.as_str()))
    }

    pub(crate) fn clear_installs(&mut self) {
        self.pending_installs.clear();
    }

    pub(crate) fn drain_factories(&mut self) -> Vec<Box<dyn ActionFactory>> {
        std::mem::take(&mut self.pending_factories)
    }
}
