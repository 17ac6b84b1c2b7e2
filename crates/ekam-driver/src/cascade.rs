//! The reset cascade (§4.3): invalidating a driver because a provision it
//! depended on disappeared or changed, and everything that must follow
//! transitively from that.

use crate::state::DriverState;
use ekam_graph::{DriverId, Graph, InstallDirective, ProvisionId};
use rustc_hash::FxHashSet;

/// Host operations the cascade needs from whatever owns the driver arena
/// (`ekam-scheduler`), kept separate so `ekam-driver` does not need to
/// depend on the scheduler's queue types.
pub trait DriverHost {
    /// This driver's current state, or `None` if the id is unknown (already
    /// reset and since reused, or never existed).
    fn state(&self, id: DriverId) -> Option<DriverState>;
    /// Cancel in-flight work and reset a RUNNING driver back to PENDING at
    /// the tail of the scheduler queue.
    fn cancel_and_requeue(&mut self, id: DriverId);
    /// Reset a completed (DONE/PASSED/FAILED) driver back to PENDING at the
    /// tail of the scheduler queue.
    fn requeue_completed(&mut self, id: DriverId);
    /// Called just before an owned provision's install directive is dropped
    /// from the graph, so the host can remove the corresponding on-disk
    /// link (§6 scenario "if Z is reset, the link is removed before Z
    /// re-runs"). Default is a no-op for hosts with no install side-table.
    fn note_install_removed(&mut self, provision: ProvisionId, directive: InstallDirective) {
        let _ = (provision, directive);
    }
}

/// Reset `id` and every driver transitively invalidated by that reset.
/// Returns every driver id that was reset, including `id` itself, in the
/// order resets were applied. Idempotent per call: a driver reachable by
/// more than one path is only reset once.
pub fn reset(id: DriverId, host: &mut dyn DriverHost, graph: &mut Graph) -> Vec<DriverId> {
    let mut visited = FxHashSet::default();
    let mut order = Vec::new();
    reset_inner(id, host, graph, &mut visited, &mut order);
    order
}

fn reset_inner(
    id: DriverId,
    host: &mut dyn DriverHost,
    graph: &mut Graph,
    visited: &mut FxHashSet<DriverId>,
    order: &mut Vec<DriverId>,
) {
    if !visited.insert(id) {
        return;
    }

    match host.state(id) {
        Some(DriverState::Running) => host.cancel_and_requeue(id),
        Some(DriverState::Pending) => {}
        Some(DriverState::Done | DriverState::Passed | DriverState::Failed) => {
            host.requeue_completed(id);
        }
        None => return,
    }
    order.push(id);

    // Step 3: unregister every provision this driver owned, recursively
    // resetting every driver that depended on it.
    for provision in graph.provisions_owned_by(id) {
        let dependents = graph.dependencies().drivers_depending_on(provision);
        if let Some(directive) = graph.install_directive(provision).cloned() {
            host.note_install_removed(provision, directive);
        }
        graph.remove_provision(provision);
        graph.remove_install(provision);
        for dependent in dependents {
            reset_inner(dependent, host, graph, visited, order);
        }
    }

    // Step 4: unregister every factory this driver registered via
    // `addActionType`, recursively resetting everything it spawned.
    for factory in graph.factories_owned_by(id) {
        let spawned = graph.spawned_by(factory).to_vec();
        graph.unregister_factory(factory);
        for spawned_driver in spawned {
            reset_inner(spawned_driver, host, graph, visited, order);
        }
    }

    // Step 5: erase every dependency row this driver appears in.
    graph.forget_driver_dependencies(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekam_fs::DiskArtifact;
    use ekam_graph::{FactoryId, Provision};
    use std::collections::HashMap;

    struct FakeHost {
        states: HashMap<DriverId, DriverState>,
        requeued: Vec<DriverId>,
        removed_installs: Vec<(ProvisionId, InstallDirective)>,
    }

    impl DriverHost for FakeHost {
        fn state(&self, id: DriverId) -> Option<DriverState> {
            self.states.get(&id).copied()
        }

        fn cancel_and_requeue(&mut self, id: DriverId) {
            self.states.insert(id, DriverState::Pending);
            self.requeued.push(id);
        }

        fn requeue_completed(&mut self, id: DriverId) {
            self.states.insert(id, DriverState::Pending);
            self.requeued.push(id);
        }

        fn note_install_removed(&mut self, provision: ProvisionId, directive: InstallDirective) {
            self.removed_installs.push((provision, directive));
        }
    }

    #[test]
    fn reset_is_idempotent_within_one_cascade() {
        let mut graph = Graph::new();
        let a = DriverId::from_raw(1);
        let mut host = FakeHost {
            states: HashMap::from([(a, DriverState::Passed)]),
            requeued: Vec::new(),
            removed_installs: Vec::new(),
        };
        let order = reset(a, &mut host, &mut graph);
        assert_eq!(order, vec![a]);
        assert_eq!(host.requeued, vec![a]);
    }

    #[test]
    fn reset_unreachable_driver_is_a_no_op() {
        let mut graph = Graph::new();
        let mut host = FakeHost {
            states: HashMap::new(),
            requeued: Vec::new(),
            removed_installs: Vec::new(),
        };
        let order = reset(DriverId::from_raw(42), &mut host, &mut graph);
        assert!(order.is_empty());
        assert!(host.requeued.is_empty());
    }

    #[test]
    fn resetting_factory_owner_resets_spawned_drivers() {
        let mut graph = Graph::new();
        let owner = DriverId::from_raw(1);
        let spawned = DriverId::from_raw(2);
        let factory = FactoryId::from_raw(1);
        graph.register_owned_trigger(factory, owner, &[]);
        graph.note_spawned(factory, spawned);

        let mut host = FakeHost {
            states: HashMap::from([(owner, DriverState::Done), (spawned, DriverState::Done)]),
            requeued: Vec::new(),
            removed_installs: Vec::new(),
        };
        let order = reset(owner, &mut host, &mut graph);
        assert!(order.contains(&owner));
        assert!(order.contains(&spawned));
    }

    #[test]
    fn resetting_an_owner_reports_its_install_directive_before_dropping_it() {
        let mut graph = Graph::new();
        let owner = DriverId::from_raw(1);
        let pid = graph.alloc_provision_id();
        let artifact: Box<dyn ekam_fs::Artifact> =
            Box::new(DiskArtifact::new(std::sync::Arc::new(std::path::PathBuf::from("/tmp")), "out".to_string(), false));
        graph.insert_provision(pid, Provision::new(Some(owner), artifact, vec![]));
        graph.declare_install(pid, ekam_graph::InstallLocation::Bin, "mytool".to_string());

        let mut host = FakeHost {
            states: HashMap::from([(owner, DriverState::Done)]),
            requeued: Vec::new(),
            removed_installs: Vec::new(),
        };
        reset(owner, &mut host, &mut graph);

        assert_eq!(host.removed_installs.len(), 1);
        assert_eq!(host.removed_installs[0].1.name, "mytool");
        assert!(graph.install_directive(pid).is_none());
    }
}
