//! [`Graph`]: owns the provision arena, the tag index, the dependency
//! table, the trigger registry, and the install table — everything in §3
//! except the `ActionDriver` state machine itself, which `ekam-driver`
//! layers on top keyed by the same [`DriverId`] handles.

use crate::dependency::DependencyTable;
use crate::ids::{DriverId, FactoryId, IdGen, ProvisionId};
use crate::install::{InstallDirective, InstallLocation, InstallTable};
use crate::provision::Provision;
use crate::tag_index::{choose_preferred, TagIndex};
use crate::trigger::TriggerRegistry;
use ekam_core::Tag;
use rustc_hash::FxHashMap;

/// The tagged-artifact graph. Single-threaded: every method takes `&mut
/// self` or a shared `&self`, with no internal locking, matching the
/// cooperative single-event-loop model (§5).
#[derive(Debug, Default)]
pub struct Graph {
    provisions: FxHashMap<ProvisionId, Provision>,
    ids: IdGen,
    tag_index: TagIndex,
    dependencies: DependencyTable,
    triggers: TriggerRegistry,
    installs: InstallTable,
}

impl Graph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`ProvisionId`] without inserting anything. Callers
    /// that need the id before the provision exists (e.g. to record an
    /// install directive in the same call) use this.
    pub fn alloc_provision_id(&mut self) -> ProvisionId {
        ProvisionId::from_raw(self.ids.next())
    }

    /// Allocate a fresh [`FactoryId`].
    pub fn alloc_factory_id(&mut self) -> FactoryId {
        FactoryId::from_raw(self.ids.next())
    }

    /// Insert `provision` under `id` (from [`Graph::alloc_provision_id`])
    /// and index it under its current tags. Not yet visible to lookups
    /// that go through [`Graph::resolve`] until this call returns — the
    /// caller controls the "becomes visible atomically" timing from §5.
    pub fn insert_provision(&mut self, id: ProvisionId, provision: Provision) {
        self.tag_index.insert(provision.tags(), id);
        self.provisions.insert(id, provision);
    }

    /// Remove and return `id`'s provision, unregistering it from the tag
    /// index. Does not touch dependency rows or install directives —
    /// callers (the reset cascade) handle those explicitly since the order
    /// matters (tags must still be readable while computing what to reset).
    pub fn remove_provision(&mut self, id: ProvisionId) -> Option<Provision> {
        let provision = self.provisions.remove(&id)?;
        self.tag_index.remove(provision.tags(), id);
        Some(provision)
    }

    /// Borrow a live provision.
    #[must_use]
    pub fn provision(&self, id: ProvisionId) -> Option<&Provision> {
        self.provisions.get(&id)
    }

    /// Mutably borrow a live provision (e.g. to add a tag or refresh its hash).
    pub fn provision_mut(&mut self, id: ProvisionId) -> Option<&mut Provision> {
        self.provisions.get_mut(&id)
    }

    /// Resolve `tag` to its preferred provision relative to
    /// `consumer_canonical_name`, applying the §4.1 tie-break. Returns
    /// `None` if no provision currently carries `tag`.
    #[must_use]
    #[allow(clippy::expect_used)] // documented panic: tag index and arena are kept in lockstep
    pub fn resolve(&self, tag: Tag, consumer_canonical_name: &str) -> Option<ProvisionId> {
        let candidates = self.tag_index.candidates(tag);
        choose_preferred(candidates, consumer_canonical_name, |id| {
            self.provisions
                .get(&id)
                .expect("tag index referenced a provision id not present in the arena")
        })
    }

    /// Record that `driver` looked up `tag` and got `provision`.
    pub fn record_dependency(&mut self, tag: Tag, driver: DriverId, provision: Option<ProvisionId>) {
        self.dependencies.record(tag, driver, provision);
    }

    /// Shared access to the dependency table (invalidation queries).
    #[must_use]
    pub fn dependencies(&self) -> &DependencyTable {
        &self.dependencies
    }

    /// Drop every dependency row belonging to `driver`.
    pub fn forget_driver_dependencies(&mut self, driver: DriverId) {
        self.dependencies.remove_driver(driver);
    }

    /// Register `factory` against `tags`.
    pub fn register_trigger(&mut self, factory: FactoryId, tags: &[Tag]) {
        self.triggers.register(factory, tags);
    }

    /// Register `factory` against `tags` as owned by `owner` (a driver's
    /// `addActionType` call, as opposed to a built-in factory).
    pub fn register_owned_trigger(&mut self, factory: FactoryId, owner: DriverId, tags: &[Tag]) {
        self.triggers.register_owned(factory, owner, tags);
    }

    /// Every factory `driver` registered via `addActionType`.
    #[must_use]
    pub fn factories_owned_by(&self, driver: DriverId) -> Vec<FactoryId> {
        self.triggers.factories_owned_by(driver)
    }

    /// Every currently-registered provision created by `driver`.
    #[must_use]
    pub fn provisions_owned_by(&self, driver: DriverId) -> Vec<ProvisionId> {
        self.provisions
            .iter()
            .filter(|(_, p)| p.creator() == Some(driver))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Unregister `factory` from every tag.
    pub fn unregister_factory(&mut self, factory: FactoryId) {
        self.triggers.unregister(factory);
    }

    /// Record that `factory` spawned `driver`.
    pub fn note_spawned(&mut self, factory: FactoryId, driver: DriverId) {
        self.triggers.note_spawned(factory, driver);
    }

    /// Every driver `factory` has spawned.
    #[must_use]
    pub fn spawned_by(&self, factory: FactoryId) -> &[DriverId] {
        self.triggers.spawned_by(factory)
    }

    /// Factories registered against `tag`.
    #[must_use]
    pub fn factories_for_tag(&self, tag: Tag) -> &[FactoryId] {
        self.triggers.factories_for_tag(tag)
    }

    /// Declare (or replace) the install directive for `provision`.
    pub fn declare_install(&mut self, provision: ProvisionId, location: InstallLocation, name: String) {
        self.installs.declare(provision, location, name);
    }

    /// The install directive for `provision`, if any.
    #[must_use]
    pub fn install_directive(&self, provision: ProvisionId) -> Option<&InstallDirective> {
        self.installs.directive_for(provision)
    }

    /// Drop the install directive for `provision`.
    pub fn remove_install(&mut self, provision: ProvisionId) {
        self.installs.remove(provision);
    }

    /// Every provision id currently registered, for a full rescan (§4.6
    /// `rescanForNewFactory`).
    pub fn all_provision_ids(&self) -> impl Iterator<Item = ProvisionId> + '_ {
        self.provisions.keys().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ekam_fs::DiskArtifact;
    use std::sync::Arc;

    fn artifact(root: &std::path::Path, name: &str) -> Box<dyn ekam_fs::Artifact> {
        Box::new(DiskArtifact::new(
            Arc::new(root.to_path_buf()),
            name.to_string(),
            false,
        ))
    }

    #[test]
    fn resolve_prefers_longest_common_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("near.h"), b"x").unwrap();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("a/b/far.h"), b"x").unwrap();

        let mut graph = Graph::new();
        let tag = Tag::from_name("header:thing.h");

        let near_id = graph.alloc_provision_id();
        graph.insert_provision(
            near_id,
            Provision::new(None, artifact(root, "near.h"), vec![tag]),
        );
        let far_id = graph.alloc_provision_id();
        graph.insert_provision(
            far_id,
            Provision::new(None, artifact(root, "a/b/far.h"), vec![tag]),
        );

        let resolved = graph.resolve(tag, "a/b/consumer.c").unwrap();
        assert_eq!(resolved, far_id);
    }

    #[test]
    fn remove_provision_makes_tag_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("x.h"), b"x").unwrap();
        let mut graph = Graph::new();
        let tag = Tag::from_name("header:x.h");
        let id = graph.alloc_provision_id();
        graph.insert_provision(id, Provision::new(None, artifact(root, "x.h"), vec![tag]));
        assert!(graph.resolve(tag, "consumer.c").is_some());
        graph.remove_provision(id);
        assert!(graph.resolve(tag, "consumer.c").is_none());
    }

    #[test]
    fn dependency_rows_survive_until_driver_forgotten() {
        let mut graph = Graph::new();
        let tag = Tag::from_name("file:*");
        let driver = DriverId::from_raw(1);
        graph.record_dependency(tag, driver, None);
        assert_eq!(graph.dependencies().drivers_watching_tag(tag), vec![driver]);
        graph.forget_driver_dependencies(driver);
        assert!(graph.dependencies().drivers_watching_tag(tag).is_empty());
    }
}
