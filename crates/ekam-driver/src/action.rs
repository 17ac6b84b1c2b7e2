//! The `Action`/`ActionFactory`/`ActionContext` traits (§4.2, §4.6) — the
//! seam between the engine and rule plug-ins (built-in or exec-discovered).

use ekam_core::Tag;
use ekam_fs::Artifact;
use ekam_graph::InstallLocation;
use std::fmt;

/// Per-run handle an [`Action`] uses to ask for inputs, declare outputs,
/// provide tags, install artifacts, emit log text, and report pass/fail.
/// Implemented by [`crate::ActionDriver`]; every method here corresponds to
/// one row of the ActionDriver operation table.
pub trait ActionContext {
    /// Resolve `tag` to its preferred provider, recording the dependency.
    fn find_provider(&mut self, tag: Tag) -> Option<Box<dyn Artifact>>;
    /// Equivalent to `find_provider(Tag::from_file(path))`, relative to
    /// this driver's scratch directory.
    fn find_input(&mut self, path: &str) -> Option<Box<dyn Artifact>>;
    /// Add (or extend the tag set of) a provision owned by this driver.
    fn provide(&mut self, artifact: Box<dyn Artifact>, tags: Vec<Tag>);
    /// Declare an install directive for an already-provided artifact.
    fn install(&mut self, artifact: &dyn Artifact, location: InstallLocation, name: String);
    /// Create a fresh scratch artifact under this driver's scratch
    /// directory, already provided with the default tag.
    fn new_output(&mut self, path: &str) -> std::io::Result<Box<dyn Artifact>>;
    /// Allocate a fresh scratch artifact named after `tag` and provide it
    /// tagged with exactly `tag` (no default tag, unlike `new_output`).
    fn new_provider(&mut self, tag: Tag) -> std::io::Result<Box<dyn Artifact>>;
    /// Record a dependency on an absolute path outside the project (e.g. a
    /// system header) without resolving or rewriting it.
    fn note_input(&mut self, path: &str);
    /// Append to the dashboard task output buffer.
    fn log(&mut self, text: &str);
    /// Register a factory that becomes visible once this driver returns.
    fn add_action_type(&mut self, factory: Box<dyn ActionFactory>);
    /// Report success (or no-op if already FAILED — see state machine doc).
    fn passed(&mut self);
    /// Report failure (no-op if already FAILED/PASSED with an active return).
    fn failed(&mut self, message: &str);
    /// Report completion without an explicit pass/fail verdict (e.g. a
    /// rule subprocess exited 0 without ever calling `passed()`) — treated
    /// as success. No-op outside RUNNING.
    fn done(&mut self);
}

/// One rule invocation bound to a specific source file.
pub trait Action: fmt::Debug + Send {
    /// Short verb shown in dashboard task titles, e.g. `"compile"`.
    fn verb(&self) -> &str;
    /// Whether a successful run should be hidden from the dashboard.
    fn is_silent(&self) -> bool {
        false
    }
    /// Begin the action. Implementations that need to run a subprocess or
    /// wait on I/O register themselves with the engine's event loop and
    /// return promptly; completion is always signalled later through
    /// [`ActionContext::passed`]/[`ActionContext::failed`], never from
    /// inside this call.
    fn start(&mut self, ctx: &mut dyn ActionContext);

    /// Called once per event-loop tick while this action remains RUNNING
    /// without having called `passed`/`failed`/`done` yet. The default
    /// does nothing, for actions that always finish inside `start`.
    /// Implementations polling a subprocess or RPC pipe check it here and
    /// call back into `ctx` once it has something to report.
    fn poll(&mut self, ctx: &mut dyn ActionContext) {
        let _ = ctx;
    }

    /// Called when the owning driver is reset (§4.3) while this action may
    /// still be suspended. Implementations holding a subprocess or other
    /// asynchronous handle must tear it down here — per §5 "Cancellation",
    /// the contract forbids any further callback after this call. The
    /// default is a no-op for actions with nothing to cancel.
    fn cancel(&mut self) {}
}

/// Discovers new [`Action`]s as provisions carrying tags of interest appear.
pub trait ActionFactory: fmt::Debug + Send + Sync {
    /// The tags whose appearance should trigger [`ActionFactory::try_make_action`].
    fn trigger_tags(&self) -> Vec<Tag>;
    /// Attempt to build an action for `artifact`, which carries `tag`.
    /// Returns `None` if this factory declines (e.g. a compiler plug-in
    /// given a header rather than a source file).
    fn try_make_action(&self, tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>>;
}
