//! `TriggerRegistry`: the set of (tag, factory) rows that fire a new action
//! when a matching provision appears (§3, §4.6).

use crate::ids::{DriverId, FactoryId};
use ekam_core::Tag;
use rustc_hash::FxHashMap;

/// Tag → registered factories, plus the reverse index from factory → the
/// drivers it has spawned (used by the reset cascade's step 4: resetting a
/// driver that called `addActionType` must reset every action that factory
/// created).
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    by_tag: FxHashMap<Tag, Vec<FactoryId>>,
    spawned_by_factory: FxHashMap<FactoryId, Vec<DriverId>>,
    owner: FxHashMap<FactoryId, DriverId>,
}

impl TriggerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` against every tag in `tags`. Built-in factories
    /// (not registered by any driver's `addActionType`) have no owner.
    pub fn register(&mut self, factory: FactoryId, tags: &[Tag]) {
        for &tag in tags {
            self.by_tag.entry(tag).or_default().push(factory);
        }
        self.spawned_by_factory.entry(factory).or_default();
    }

    /// Like [`TriggerRegistry::register`], additionally recording that
    /// `owner` registered this factory — the reset cascade looks this up
    /// to unregister factories owned by a driver being reset (§4.3 step 4).
    pub fn register_owned(&mut self, factory: FactoryId, owner: DriverId, tags: &[Tag]) {
        self.register(factory, tags);
        self.owner.insert(factory, owner);
    }

    /// Every factory registered by `driver` via `addActionType`.
    #[must_use]
    pub fn factories_owned_by(&self, driver: DriverId) -> Vec<FactoryId> {
        let mut out: Vec<FactoryId> = self
            .owner
            .iter()
            .filter(|&(_, &owner)| owner == driver)
            .map(|(&factory, _)| factory)
            .collect();
        out.sort_unstable();
        out
    }

    /// Remove `factory` from every tag it was registered for.
    pub fn unregister(&mut self, factory: FactoryId) {
        for factories in self.by_tag.values_mut() {
            factories.retain(|&f| f != factory);
        }
        self.by_tag.retain(|_, factories| !factories.is_empty());
        self.spawned_by_factory.remove(&factory);
        self.owner.remove(&factory);
    }

    /// Factories registered for `tag`, in registration order (ordering
    /// guarantee from §5: triggers fire in tag-enumeration order).
    #[must_use]
    pub fn factories_for_tag(&self, tag: Tag) -> &[FactoryId] {
        self.by_tag.get(&tag).map_or(&[], Vec::as_slice)
    }

    /// Record that `factory` spawned `driver`, so a later reset of the
    /// driver that registered `factory` can find it.
    pub fn note_spawned(&mut self, factory: FactoryId, driver: DriverId) {
        self.spawned_by_factory.entry(factory).or_default().push(driver);
    }

    /// Every driver `factory` has spawned.
    #[must_use]
    pub fn spawned_by(&self, factory: FactoryId) -> &[DriverId] {
        self.spawned_by_factory.get(&factory).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregister_drops_empty_tag_buckets() {
        let mut reg = TriggerRegistry::new();
        let tag = Tag::from_name("filetype:.cpp");
        let factory = FactoryId::from_raw(1);
        reg.register(factory, &[tag]);
        assert_eq!(reg.factories_for_tag(tag), &[factory]);
        reg.unregister(factory);
        assert!(reg.factories_for_tag(tag).is_empty());
    }

    #[test]
    fn spawned_by_tracks_driver_handles() {
        let mut reg = TriggerRegistry::new();
        let factory = FactoryId::from_raw(1);
        let driver = DriverId::from_raw(9);
        reg.register(factory, &[]);
        reg.note_spawned(factory, driver);
        assert_eq!(reg.spawned_by(factory), &[driver]);
    }
}
