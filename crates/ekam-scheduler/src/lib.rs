// SPDX-License-Identifier: Apache-2.0
//! The scheduler: a FIFO pending queue, an active set bounded by
//! `max_concurrent_actions`, the driver arena, and the transitive
//! dependency walk the return procedure needs to decide which provisions
//! are immune to self-invalidation (§4.4).

use ekam_driver::{DriverHost, DriverState};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub use ekam_driver::ActionDriver;
pub use ekam_graph::DriverId;

/// Owns every live [`ActionDriver`] and the pending/active queues over them.
/// Single-threaded: the engine's event loop is the only caller.
pub struct Scheduler {
    capacity: usize,
    pending: VecDeque<DriverId>,
    active: Vec<DriverId>,
    completed: FxHashSet<DriverId>,
    drivers: FxHashMap<DriverId, ActionDriver>,
}

impl Scheduler {
    /// A scheduler that runs at most `capacity` drivers concurrently.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Scheduler {
            capacity: capacity.max(1),
            pending: VecDeque::new(),
            active: Vec::new(),
            completed: FxHashSet::default(),
            drivers: FxHashMap::default(),
        }
    }

    /// Add a freshly-constructed (PENDING) driver to the tail of the queue.
    pub fn enqueue(&mut self, driver: ActionDriver) {
        let id = driver.id();
        self.pending.push_back(id);
        self.drivers.insert(id, driver);
    }

    /// Borrow a driver by id.
    #[must_use]
    pub fn driver(&self, id: DriverId) -> Option<&ActionDriver> {
        self.drivers.get(&id)
    }

    /// Mutably borrow a driver by id.
    pub fn driver_mut(&mut self, id: DriverId) -> Option<&mut ActionDriver> {
        self.drivers.get_mut(&id)
    }

    /// How many drivers are currently RUNNING.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Every driver currently RUNNING, in scheduling order. Used by the
    /// engine to poll actions that suspended rather than returning
    /// immediately (§5 "Driver start() may return immediately with a
    /// pending-operation handle").
    #[must_use]
    pub fn active_ids(&self) -> Vec<DriverId> {
        self.active.clone()
    }

    /// Whether there is nothing left to do: no pending work and nothing
    /// in flight (the condition a one-shot run exits on, per §6).
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Start as many PENDING drivers as the concurrency cap allows, in
    /// FIFO order. Returns the ids that transitioned PENDING → RUNNING, for
    /// the caller to invoke the bound `Action::start` on (§4.4 scheduling rule).
    pub fn start_ready(&mut self) -> Vec<DriverId> {
        let mut started = Vec::new();
        while self.active.len() < self.capacity {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            if let Some(driver) = self.drivers.get_mut(&id) {
                driver.start_running();
                self.active.push(id);
                started.push(id);
            }
        }
        started
    }

    /// Move `id` from the active set to the completed table. The caller is
    /// expected to have already run [`ekam_driver::complete`] against this
    /// driver's graph-visible effects; this only updates queue membership.
    pub fn mark_completed(&mut self, id: DriverId) {
        self.active.retain(|&active_id| active_id != id);
        self.completed.insert(id);
    }

    /// Every driver currently RUNNING with a pending return (§3 "deferred
    /// returned callback"), ready for [`ekam_driver::complete`].
    pub fn drivers_awaiting_return(&self) -> Vec<DriverId> {
        self.active
            .iter()
            .copied()
            .filter(|&id| self.drivers.get(&id).is_some_and(ActionDriver::return_pending))
            .collect()
    }

    /// The direct dependencies of `id`: the creator of each chosen
    /// provision in its dependency rows (§4.4 "transitive-dependency
    /// computation").
    fn direct_dependencies(&self, id: DriverId, graph: &ekam_graph::Graph) -> Vec<DriverId> {
        graph
            .dependencies()
            .rows_for_driver(id)
            .filter_map(|row| row.provision)
            .filter_map(|pid| graph.provision(pid))
            .filter_map(ekam_graph::Provision::creator)
            .collect()
    }

    /// The full transitive closure of `id`'s dependencies, terminating on
    /// already-seen drivers (§4.4).
    #[must_use]
    pub fn transitive_dependencies(&self, id: DriverId, graph: &ekam_graph::Graph) -> FxHashSet<DriverId> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for dep in self.direct_dependencies(current, graph) {
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        seen
    }
}

impl DriverHost for Scheduler {
    fn state(&self, id: DriverId) -> Option<DriverState> {
        self.drivers.get(&id).map(ActionDriver::state)
    }

    fn cancel_and_requeue(&mut self, id: DriverId) {
        self.active.retain(|&active_id| active_id != id);
        if let Some(driver) = self.drivers.get_mut(&id) {
            driver.reset();
        }
        self.pending.push_back(id);
    }

    fn requeue_completed(&mut self, id: DriverId) {
        self.completed.remove(&id);
        if let Some(driver) = self.drivers.get_mut(&id) {
            driver.reset();
        }
        self.pending.push_back(id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ekam_fs::{DiskArtifact, ProjectLayout};
    use std::sync::Arc;

    fn make_driver(id: u64, root: &std::path::Path, name: &str) -> ActionDriver {
        let layout = ProjectLayout::new(root.to_path_buf());
        let scratch = layout.scratch_dir(&id.to_string());
        scratch.ensure().unwrap();
        let source = DiskArtifact::new(Arc::new(root.to_path_buf()), name.to_string(), true);
        ActionDriver::new(DriverId::from_raw(id), "test".to_string(), Box::new(source), scratch)
    }

    #[test]
    fn start_ready_respects_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = Scheduler::new(1);
        scheduler.enqueue(make_driver(1, dir.path(), "a.txt"));
        scheduler.enqueue(make_driver(2, dir.path(), "b.txt"));

        let started = scheduler.start_ready();
        assert_eq!(started, vec![DriverId::from_raw(1)]);
        assert_eq!(scheduler.active_count(), 1);

        let started_again = scheduler.start_ready();
        assert!(started_again.is_empty());
    }

    #[test]
    fn reset_requeues_at_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = Scheduler::new(2);
        scheduler.enqueue(make_driver(1, dir.path(), "a.txt"));
        scheduler.enqueue(make_driver(2, dir.path(), "b.txt"));
        scheduler.start_ready();
        scheduler.cancel_and_requeue(DriverId::from_raw(1));
        let started = scheduler.start_ready();
        assert_eq!(started, vec![DriverId::from_raw(1)]);
    }
}
