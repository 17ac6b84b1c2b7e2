// SPDX-License-Identifier: Apache-2.0
//! Identity primitives shared by every Ekam engine crate: [`Tag`], [`Hash`],
//! path canonicalization, and the crate-wide [`EkamError`].

mod error;
mod hash;
mod tag;

pub use error::{EkamError, Result};
pub use hash::Hash;
pub use tag::{canonicalize_path, Tag, DEFAULT_TAG_NAME};
