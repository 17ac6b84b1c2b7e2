//! Install table: actions may declare `install(artifact, location, name)`;
//! recorded here as a side-table entry alongside the ordinary
//! `bin:<name>`/`lib:<name>` provision (§3 "Install table", §4.2(3e)).

use crate::ids::ProvisionId;
use rustc_hash::FxHashMap;

/// Where an installed artifact is hard-linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallLocation {
    /// The project's configured `bin` directory.
    Bin,
    /// The project's configured `lib` directory.
    Lib,
}

/// One pending or completed install directive.
#[derive(Debug, Clone)]
pub struct InstallDirective {
    /// Where to link the artifact.
    pub location: InstallLocation,
    /// The install-relative filename, e.g. `myprog`.
    pub name: String,
}

/// Provision → install directive. A provision has at most one directive;
/// re-declaring replaces it (matches `provide` extending rather than
/// duplicating a provision's tag set).
#[derive(Debug, Default)]
pub struct InstallTable {
    by_provision: FxHashMap<ProvisionId, InstallDirective>,
}

impl InstallTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) the install directive for `provision`.
    pub fn declare(&mut self, provision: ProvisionId, location: InstallLocation, name: String) {
        self.by_provision
            .insert(provision, InstallDirective { location, name });
    }

    /// The directive for `provision`, if any.
    #[must_use]
    pub fn directive_for(&self, provision: ProvisionId) -> Option<&InstallDirective> {
        self.by_provision.get(&provision)
    }

    /// Drop the directive for `provision` (a driver reset drops its installs).
    pub fn remove(&mut self, provision: ProvisionId) {
        self.by_provision.remove(&provision);
    }
}
