//! `DependencyTable`: every provider lookup an action made and which
//! provision was chosen at that time (§3, §4.2).

use crate::ids::{DriverId, ProvisionId};
use ekam_core::Tag;

/// One row: driver `driver` looked up `tag` and got `provision` (`None` for
/// a "not found" lookup, which still must be recorded — a later provider
/// appearing for that tag can invalidate the driver).
#[derive(Debug, Clone, Copy)]
pub struct DependencyRow {
    /// The tag that was looked up.
    pub tag: Tag,
    /// The driver that performed the lookup.
    pub driver: DriverId,
    /// The provision chosen at lookup time, or `None` for "not found".
    pub provision: Option<ProvisionId>,
}

/// Rows are append-only until a driver resets, at which point every row it
/// owns is dropped in one pass.
#[derive(Debug, Default)]
pub struct DependencyTable {
    rows: Vec<DependencyRow>,
}

impl DependencyTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup.
    pub fn record(&mut self, tag: Tag, driver: DriverId, provision: Option<ProvisionId>) {
        self.rows.push(DependencyRow {
            tag,
            driver,
            provision,
        });
    }

    /// Every row recorded for `driver`.
    pub fn rows_for_driver(&self, driver: DriverId) -> impl Iterator<Item = &DependencyRow> {
        self.rows.iter().filter(move |row| row.driver == driver)
    }

    /// Every distinct driver that has a row resolving to `provision`, i.e.
    /// every driver that must be reset when `provision` disappears or
    /// changes.
    pub fn drivers_depending_on(&self, provision: ProvisionId) -> Vec<DriverId> {
        let mut out: Vec<DriverId> = self
            .rows
            .iter()
            .filter(|row| row.provision == Some(provision))
            .map(|row| row.driver)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Every distinct driver with a row keyed on `tag` — used when a new
    /// provision appears carrying `tag`, since a driver that previously
    /// got "not found" (or a worse match) may now resolve differently.
    pub fn drivers_watching_tag(&self, tag: Tag) -> Vec<DriverId> {
        let mut out: Vec<DriverId> = self
            .rows
            .iter()
            .filter(|row| row.tag == tag)
            .map(|row| row.driver)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Drop every row belonging to `driver` (reset cascade step 5).
    pub fn remove_driver(&mut self, driver: DriverId) {
        self.rows.retain(|row| row.driver != driver);
    }
}
