//! The return procedure: what happens when a RUNNING driver's deferred
//! "returned" callback fires (§4.2 "Return (post-execution) procedure").

use crate::action::ActionFactory;
use crate::driver::ActionDriver;
use crate::state::DriverState;
use ekam_graph::{FactoryId, Graph, Provision, ProvisionId};

/// One trigger fired by a provision this driver just registered: the
/// caller looks `factory` up in its own factory table, calls
/// `try_make_action(tag, artifact)`, and enqueues whatever action it
/// returns under a fresh driver (§4.2 step 3d).
#[derive(Debug, Clone, Copy)]
pub struct FiredTrigger {
    /// The factory to invoke.
    pub factory: FactoryId,
    /// The tag that matched.
    pub tag: ekam_core::Tag,
    /// The provision carrying that tag.
    pub provision: ProvisionId,
}

/// What the return procedure produced, for the scheduler/engine to act on.
pub struct ReturnOutcome {
    /// Final state: DONE, PASSED, or FAILED.
    pub state: DriverState,
    /// Provisions newly registered into the graph (empty on failure).
    pub registered: Vec<ProvisionId>,
    /// Triggers to dispatch (empty on failure).
    pub triggers: Vec<FiredTrigger>,
    /// Factories registered via `addActionType`, to be added to the
    /// trigger registry and rescanned (empty on failure).
    pub new_factories: Vec<Box<dyn ActionFactory>>,
    /// The failure message, if `state == FAILED`.
    pub failure_message: Option<String>,
}

/// Run the return procedure for `driver`, which must have
/// [`ActionDriver::return_pending`] set. Mutates `graph` to register
/// surviving provisions and clears the driver's staging area.
pub fn complete(driver: &mut ActionDriver, graph: &mut Graph) -> ReturnOutcome {
    debug_assert!(driver.return_pending(), "complete() called without a pending return");
    driver.clear_return_pending();

    match driver.state() {
        DriverState::Failed => {
            // Drop provisions/installs/outputs; keep dependency rows so
            // later changes can still wake this driver (§4.2 step 2).
            driver.drain_provisions();
            driver.clear_installs();
            driver.drain_factories();
            ReturnOutcome {
                state: DriverState::Failed,
                registered: Vec::new(),
                triggers: Vec::new(),
                new_factories: Vec::new(),
                failure_message: driver.failure_message().map(str::to_string),
            }
        }
        DriverState::Done | DriverState::Passed => {
            let state = driver.state();
            let id = driver.id();

            // 3a: prune provisions whose artifact vanished; 3b: freeze the
            // content hash now.
            let mut registered = Vec::new();
            for (artifact, tags) in driver.drain_provisions() {
                if !artifact.exists() {
                    continue;
                }
                let pid = graph.alloc_provision_id();
                let mut provision = Provision::new(Some(id), artifact, tags);
                provision.refresh_content_hash();
                graph.insert_provision(pid, provision);
                registered.push(pid);
            }

            // Install directives are matched to their provision by
            // canonical name now that every surviving provision has an id.
            let pending_installs: Vec<(String, ekam_graph::InstallLocation, String)> = driver
                .pending_installs()
                .map(|(name, loc, install_name)| (name.to_string(), loc, install_name.to_string()))
                .collect();
            driver.clear_installs();
            for (canonical_name, location, name) in pending_installs {
                if let Some(&pid) = registered
                    .iter()
                    .find(|&&pid| graph.provision(pid).is_some_and(|p| p.artifact().canonical_name() == canonical_name))
                {
                    graph.declare_install(pid, location, name);
                }
            }

            // 3d: every tag a registered provision carries may fire
            // triggers, in tag-enumeration order (§5 ordering guarantee).
            let mut triggers = Vec::new();
            for &pid in &registered {
                let Some(tags) = graph.provision(pid).map(|p| p.tags().to_vec()) else {
                    continue;
                };
                for tag in tags {
                    for &factory in graph.factories_for_tag(tag) {
                        triggers.push(FiredTrigger {
                            factory,
                            tag,
                            provision: pid,
                        });
                    }
                }
            }

            let new_factories = driver.drain_factories();

            ReturnOutcome {
                state,
                registered,
                triggers,
                new_factories,
                failure_message: None,
            }
        }
        DriverState::Pending | DriverState::Running => {
            debug_assert!(false, "complete() called on a non-terminal driver");
            ReturnOutcome {
                state: driver.state(),
                registered: Vec::new(),
                triggers: Vec::new(),
                new_factories: Vec::new(),
                failure_message: None,
            }
        }
    }
}
