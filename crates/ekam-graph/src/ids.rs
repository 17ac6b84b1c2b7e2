//! Stable integer handles into the graph's arenas.
//!
//! The original engine links `Provision`/`ActionDriver`/`ActionFactory`
//! objects directly by pointer. Rust's aliasing rules make that awkward for
//! a graph with cycles (a driver owns provisions; provisions reference back
//! to their creating driver; triggers reference factories that outlive the
//! drivers they spawn), so every cross-reference here is a small `Copy`
//! handle indexing into a table owned by [`crate::Graph`] or by
//! `ekam-driver`'s driver arena instead.

use std::fmt;

macro_rules! handle {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw index. Only the owning arena should call this.
            #[must_use]
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw index, for use as an arena key.
            #[must_use]
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle!(ProvisionId, "Handle to a live [`crate::Provision`].");
handle!(DriverId, "Handle to an `ActionDriver` owned by `ekam-driver`.");
handle!(FactoryId, "Handle to a registered `ActionFactory`.");

/// Monotonic handle allocator shared by the graph's arenas.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    /// A fresh, never-before-returned raw id.
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
