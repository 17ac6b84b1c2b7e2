//! [`Engine`]: the facade tying the graph, the driver arena, the scheduler,
//! and the dashboard into a runnable build loop (§4, §5).
//!
//! The loop below is the single-threaded cooperative model of §5 rendered
//! as a poll loop: `start_ready` hands newly-PENDING drivers their first
//! `Action::start` call, every still-RUNNING driver gets one `Action::poll`
//! per tick, and any driver with a deferred return goes through
//! [`ekam_driver::complete`] before the next iteration begins.

use crate::error::Result;
use crate::exec_rule::ExecRuleFactory;
use crate::extract::ExtractTypeActionFactory;
use crate::install;
use ekam_app_core::EngineConfig;
use ekam_core::Tag;
use ekam_dashboard::{Dashboard, Silence, Task, TaskState};
use ekam_driver::{Action, ActionContextImpl, ActionDriver, ActionFactory, DriverHost, DriverState};
use ekam_fs::{Artifact, ProjectLayout};
use ekam_graph::{DriverId, FactoryId, Graph, InstallDirective, ProvisionId};
use ekam_scheduler::Scheduler;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

/// The build engine for one project root. Owns every piece of run state;
/// nothing here is `Clone` or shareable across threads — the event loop in
/// [`Engine::run_to_fixpoint`] is the only caller of any of its methods.
pub struct Engine {
    graph: Graph,
    scheduler: Scheduler,
    layout: ProjectLayout,
    config: EngineConfig,
    dashboard: Box<dyn Dashboard>,
    factories: FxHashMap<FactoryId, Box<dyn ActionFactory>>,
    actions: FxHashMap<DriverId, Box<dyn Action>>,
    tasks: FxHashMap<DriverId, Box<dyn Task>>,
    source_provisions: FxHashMap<String, ProvisionId>,
    failed_drivers: FxHashSet<DriverId>,
    next_driver_id: u64,
}

impl Engine {
    /// A fresh engine over `config`, with the built-in type-extraction rule
    /// already registered.
    #[must_use]
    pub fn new(config: EngineConfig, dashboard: Box<dyn Dashboard>) -> Self {
        let layout = ProjectLayout::new(config.root.clone());
        let mut engine = Engine {
            graph: Graph::new(),
            scheduler: Scheduler::new(config.max_concurrent_actions),
            layout,
            config,
            dashboard,
            factories: FxHashMap::default(),
            actions: FxHashMap::default(),
            tasks: FxHashMap::default(),
            source_provisions: FxHashMap::default(),
            failed_drivers: FxHashSet::default(),
            next_driver_id: 0,
        };
        engine.add_action_factory(Box::new(ExtractTypeActionFactory));
        engine
    }

    /// Scan `rules_dir` for exec-discovered rules and register each as a
    /// factory (§[SUPPLEMENT] rule discovery).
    pub fn discover_exec_rules(&mut self, rules_dir: &Path, shim_path: &Path) -> Result<()> {
        let discovered = ExecRuleFactory::discover(rules_dir, &self.config.bypass_dirs, shim_path)?;
        for factory in discovered {
            self.add_action_factory(Box::new(factory));
        }
        Ok(())
    }

    /// Register a factory, indexing it under its trigger tags and
    /// immediately rescanning existing provisions against it (§4.6).
    pub fn add_action_factory(&mut self, factory: Box<dyn ActionFactory>) -> FactoryId {
        let id = self.graph.alloc_factory_id();
        self.graph.register_trigger(id, &factory.trigger_tags());
        self.factories.insert(id, factory);
        self.rescan_for_new_factory(id);
        id
    }

    /// Register a source file as an engine-owned provision carrying only
    /// the default tag; everything else it gets tagged with comes from the
    /// built-in extraction action firing off that tag.
    pub fn add_source_file(&mut self, artifact: Box<dyn Artifact>) -> ProvisionId {
        let name = artifact.canonical_name().to_string();
        let pid = self.graph.alloc_provision_id();
        let provision = ekam_graph::Provision::new(None, artifact, vec![Tag::default_tag()]);
        self.graph.insert_provision(pid, provision);
        self.source_provisions.insert(name, pid);
        self.dispatch_triggers_for(pid, &[Tag::default_tag()]);
        self.invalidate_watchers(Tag::default_tag(), &FxHashSet::default());
        pid
    }

    /// Remove a previously-added source file, resetting every driver that
    /// depended on it.
    pub fn remove_source_file(&mut self, canonical_name: &str) {
        let Some(pid) = self.source_provisions.remove(canonical_name) else {
            return;
        };
        let dependents = self.graph.dependencies().drivers_depending_on(pid);
        self.graph.remove_provision(pid);
        self.graph.remove_install(pid);
        for dependent in dependents {
            self.reset_driver(dependent);
        }
    }

    /// Whether any driver is currently in the FAILED state.
    #[must_use]
    pub fn has_failed_drivers(&self) -> bool {
        !self.failed_drivers.is_empty()
    }

    /// Drive the scheduler until nothing is pending or running. Returns
    /// `true` iff no driver ended in the FAILED state.
    pub fn run_to_fixpoint(&mut self) -> bool {
        loop {
            let started = self.scheduler.start_ready();
            for &id in &started {
                self.begin_driver(id);
            }

            for id in self.scheduler.active_ids() {
                let return_pending = self.scheduler.driver(id).is_some_and(ActionDriver::return_pending);
                if !return_pending {
                    self.poll_driver(id);
                }
            }

            let awaiting = self.scheduler.drivers_awaiting_return();
            let completed_any = !awaiting.is_empty();
            for id in awaiting {
                self.complete_driver(id);
            }

            if self.scheduler.is_quiescent() {
                break;
            }
            if !completed_any && started.is_empty() && self.scheduler.active_count() > 0 {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
        !self.has_failed_drivers()
    }

    fn alloc_driver_id(&mut self) -> DriverId {
        let id = self.next_driver_id;
        self.next_driver_id += 1;
        DriverId::from_raw(id)
    }

    fn spawn_driver(
        &mut self,
        source: Box<dyn Artifact>,
        action: Box<dyn Action>,
        spawned_by: Option<FactoryId>,
    ) -> std::io::Result<DriverId> {
        let id = self.alloc_driver_id();
        let verb = action.verb().to_string();
        let silence = if action.is_silent() { Silence::Silent } else { Silence::Normal };
        let noun = source.canonical_name().to_string();
        let scratch = self.layout.scratch_dir(&id.raw().to_string());
        scratch.ensure()?;

        let driver = ActionDriver::new(id, verb.clone(), source, scratch);
        self.scheduler.enqueue(driver);
        self.actions.insert(id, action);
        if let Some(factory_id) = spawned_by {
            self.graph.note_spawned(factory_id, id);
        }
        let task = self.dashboard.begin_task(&verb, &noun, silence);
        self.tasks.insert(id, task);
        Ok(id)
    }

    fn rescan_for_new_factory(&mut self, factory_id: FactoryId) {
        let Some(trigger_tags) = self.factories.get(&factory_id).map(|f| f.trigger_tags()) else {
            return;
        };
        let pids: Vec<ProvisionId> = self.graph.all_provision_ids().collect();
        let mut to_spawn = Vec::new();
        for pid in pids {
            let Some(provision) = self.graph.provision(pid) else {
                continue;
            };
            let Some(&matched_tag) = provision.tags().iter().find(|t| trigger_tags.contains(t)) else {
                continue;
            };
            let Some(factory) = self.factories.get(&factory_id) else {
                continue;
            };
            if let Some(action) = factory.try_make_action(matched_tag, provision.artifact()) {
                to_spawn.push((provision.artifact().clone_box(), action));
            }
        }
        for (source, action) in to_spawn {
            if let Err(err) = self.spawn_driver(source, action, Some(factory_id)) {
                tracing::error!(error = %err, "failed to spawn rescanned driver");
            }
        }
    }

    fn dispatch_triggers_for(&mut self, pid: ProvisionId, tags: &[Tag]) {
        let mut to_spawn = Vec::new();
        for &tag in tags {
            let factory_ids = self.graph.factories_for_tag(tag).to_vec();
            for factory_id in factory_ids {
                let Some(factory) = self.factories.get(&factory_id) else {
                    continue;
                };
                let Some(provision) = self.graph.provision(pid) else {
                    continue;
                };
                if let Some(action) = factory.try_make_action(tag, provision.artifact()) {
                    to_spawn.push((provision.artifact().clone_box(), action, factory_id));
                }
            }
        }
        for (source, action, factory_id) in to_spawn {
            if let Err(err) = self.spawn_driver(source, action, Some(factory_id)) {
                tracing::error!(error = %err, "failed to spawn triggered driver");
            }
        }
    }

    /// Reset `id` and its transitive cascade, canceling each action's
    /// in-flight work, reverting its dashboard task to PENDING, and
    /// removing any install link the cascade dropped from the graph.
    fn reset_driver(&mut self, id: DriverId) {
        let mut host = ResetHost {
            scheduler: &mut self.scheduler,
            removed_installs: Vec::new(),
        };
        let reset_ids = ekam_driver::reset(id, &mut host, &mut self.graph);
        let removed_installs = host.removed_installs;
        for rid in reset_ids {
            if let Some(action) = self.actions.get_mut(&rid) {
                action.cancel();
            }
            if let Some(task) = self.tasks.get_mut(&rid) {
                task.set_state(TaskState::Pending);
            }
            self.failed_drivers.remove(&rid);
        }
        for directive in removed_installs {
            if let Err(err) = install::uninstall(
                directive.location,
                &directive.name,
                &self.config.install_dirs.bin,
                &self.config.install_dirs.lib,
            ) {
                tracing::error!(error = %err, name = %directive.name, "failed to remove stale install link");
            }
        }
    }

    /// §4.3: a new provision carrying `tag` may change what every driver
    /// already watching `tag` resolves to (e.g. a "not found" lookup now
    /// has a match, or a closer match appeared). Drivers transitively
    /// depended-on by `immune`'s owner are exempt from self-invalidation.
    fn invalidate_watchers(&mut self, tag: Tag, immune: &FxHashSet<DriverId>) {
        let watchers = self.graph.dependencies().drivers_watching_tag(tag);
        for watcher in watchers {
            if immune.contains(&watcher) {
                continue;
            }
            let Some(driver) = self.scheduler.driver(watcher) else {
                continue;
            };
            let consumer_name = driver.source().canonical_name().to_string();
            let previous = self
                .graph
                .dependencies()
                .rows_for_driver(watcher)
                .filter(|row| row.tag == tag)
                .last()
                .map(|row| row.provision);
            let current = self.graph.resolve(tag, &consumer_name);
            if previous != Some(current) {
                self.reset_driver(watcher);
            }
        }
    }

    fn begin_driver(&mut self, id: DriverId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.set_state(TaskState::Running);
        }
        let Some(mut action) = self.actions.remove(&id) else {
            return;
        };
        if let Some(driver) = self.scheduler.driver_mut(id) {
            let mut ctx = ActionContextImpl::new(driver, &mut self.graph);
            action.start(&mut ctx);
        }
        self.actions.insert(id, action);
    }

    fn poll_driver(&mut self, id: DriverId) {
        let Some(mut action) = self.actions.remove(&id) else {
            return;
        };
        if let Some(driver) = self.scheduler.driver_mut(id) {
            let mut ctx = ActionContextImpl::new(driver, &mut self.graph);
            action.poll(&mut ctx);
        }
        self.actions.insert(id, action);
    }

    fn complete_driver(&mut self, id: DriverId) {
        let Some(driver) = self.scheduler.driver_mut(id) else {
            return;
        };
        let outcome = ekam_driver::complete(driver, &mut self.graph);
        let log_text = self
            .scheduler
            .driver(id)
            .map(|d| d.log_text().to_string())
            .unwrap_or_default();

        if let Some(task) = self.tasks.get_mut(&id) {
            if !log_text.is_empty() {
                task.add_output(&log_text);
            }
            match outcome.state {
                DriverState::Done => task.set_state(TaskState::Done),
                DriverState::Passed => task.set_state(TaskState::Passed),
                DriverState::Failed => {
                    if let Some(msg) = &outcome.failure_message {
                        task.add_output(msg);
                        task.add_output("\n");
                    }
                    task.set_state(TaskState::Failed);
                }
                DriverState::Pending | DriverState::Running => {}
            }
        }
        if outcome.state == DriverState::Failed {
            self.failed_drivers.insert(id);
        } else {
            self.failed_drivers.remove(&id);
        }

        for factory in outcome.new_factories {
            let factory_id = self.graph.alloc_factory_id();
            self.graph.register_owned_trigger(factory_id, id, &factory.trigger_tags());
            self.factories.insert(factory_id, factory);
            self.rescan_for_new_factory(factory_id);
        }

        for &pid in &outcome.registered {
            let directive = self.graph.install_directive(pid).cloned();
            let Some(directive) = directive else { continue };
            let Some(provision) = self.graph.provision(pid) else { continue };
            let artifact = provision.artifact();
            if let Err(err) = install::install(
                artifact,
                directive.location,
                &directive.name,
                &self.config.install_dirs.bin,
                &self.config.install_dirs.lib,
            ) {
                tracing::error!(error = %err, name = %directive.name, "install failed");
            }
        }

        if !outcome.registered.is_empty() {
            let mut immune = self.scheduler.transitive_dependencies(id, &self.graph);
            immune.insert(id);
            let mut tags_to_check = Vec::new();
            for &pid in &outcome.registered {
                if let Some(provision) = self.graph.provision(pid) {
                    tags_to_check.extend(provision.tags().iter().copied());
                }
            }
            tags_to_check.sort_unstable();
            tags_to_check.dedup();
            for tag in tags_to_check {
                self.invalidate_watchers(tag, &immune);
            }
        }

        for trigger in outcome.triggers {
            let spawn_info = {
                let Some(factory) = self.factories.get(&trigger.factory) else {
                    continue;
                };
                let Some(provision) = self.graph.provision(trigger.provision) else {
                    continue;
                };
                factory
                    .try_make_action(trigger.tag, provision.artifact())
                    .map(|action| (provision.artifact().clone_box(), action))
            };
            if let Some((source, action)) = spawn_info {
                if let Err(err) = self.spawn_driver(source, action, Some(trigger.factory)) {
                    tracing::error!(error = %err, "failed to spawn triggered driver");
                }
            }
        }

        // The action stays in `self.actions`, not just the driver in the
        // scheduler: a later reset can put this same driver back to
        // PENDING, and `begin_driver` needs its action to call `start` on
        // again.
        self.scheduler.mark_completed(id);
    }
}

/// Adapts the scheduler to [`DriverHost`] for one `reset` call, buffering
/// install directives the cascade drops so [`Engine::reset_driver`] can
/// remove their on-disk links after the graph mutation has settled.
struct ResetHost<'a> {
    scheduler: &'a mut Scheduler,
    removed_installs: Vec<InstallDirective>,
}

impl DriverHost for ResetHost<'_> {
    fn state(&self, id: DriverId) -> Option<DriverState> {
        self.scheduler.state(id)
    }

    fn cancel_and_requeue(&mut self, id: DriverId) {
        self.scheduler.cancel_and_requeue(id);
    }

    fn requeue_completed(&mut self, id: DriverId) {
        self.scheduler.requeue_completed(id);
    }

    fn note_install_removed(&mut self, _provision: ProvisionId, directive: InstallDirective) {
        self.removed_installs.push(directive);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ekam_dashboard::ConsoleDashboard;
    use ekam_fs::DiskArtifact;
    use std::sync::Arc;

    fn engine(root: &std::path::Path) -> Engine {
        let config = EngineConfig::new(root.to_path_buf());
        Engine::new(config, Box::new(ConsoleDashboard::new(None, true)))
    }

    #[derive(Debug)]
    struct PassAction;

    impl Action for PassAction {
        fn verb(&self) -> &str {
            "check"
        }
        fn start(&mut self, ctx: &mut dyn ekam_driver::ActionContext) {
            ctx.passed();
        }
    }

    #[derive(Debug)]
    struct PassFactory;

    impl ActionFactory for PassFactory {
        fn trigger_tags(&self) -> Vec<Tag> {
            vec![Tag::from_name("filetype:.cpp")]
        }
        fn try_make_action(&self, _tag: Tag, _artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
            Some(Box::new(PassAction))
        }
    }

    #[test]
    fn adding_a_source_file_extracts_its_type_to_fixpoint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.cpp"), b"x").unwrap();

        let mut eng = engine(dir.path());
        let root = Arc::new(dir.path().join("src"));
        let source = DiskArtifact::new(root, "a.cpp".to_string(), true);
        eng.add_source_file(Box::new(source));

        assert!(eng.run_to_fixpoint());
        assert!(!eng.has_failed_drivers());

        let pid = eng.graph.resolve(Tag::from_name("filetype:.cpp"), "consumer").unwrap();
        assert!(eng.graph.provision(pid).is_some());
    }

    #[test]
    fn a_registered_factory_fires_once_its_trigger_tag_appears() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.cpp"), b"x").unwrap();

        let mut eng = engine(dir.path());
        eng.add_action_factory(Box::new(PassFactory));
        let root = Arc::new(dir.path().join("src"));
        let source = DiskArtifact::new(root, "a.cpp".to_string(), true);
        eng.add_source_file(Box::new(source));

        assert!(eng.run_to_fixpoint());
        assert_eq!(eng.tasks.len(), 2); // extraction + PassAction
    }

    #[test]
    fn removing_a_source_file_resets_its_dependents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.cpp"), b"x").unwrap();

        let mut eng = engine(dir.path());
        eng.add_action_factory(Box::new(PassFactory));
        let root = Arc::new(dir.path().join("src"));
        let source = DiskArtifact::new(root, "a.cpp".to_string(), true);
        eng.add_source_file(Box::new(source));
        assert!(eng.run_to_fixpoint());

        eng.remove_source_file("a.cpp");
        assert!(eng.graph.resolve(Tag::from_name("filetype:.cpp"), "consumer").is_none());
    }
}
