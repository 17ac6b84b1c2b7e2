//! Content-hash identity for provisions.
//!
//! Mirrors the role of `echo-cas::BlobHash`: a thin newtype over a 32-byte
//! BLAKE3 digest. Unlike a CAS blob hash, [`Hash::NULL`] is a distinguished
//! value distinct from the hash of any byte sequence (including the empty
//! one) — it means "no content," not "content of length zero."

use std::fmt;

/// A 256-bit content digest.
///
/// `Hash::NULL` is returned when a provider's content is absent (the file
/// was deleted between provision and hashing, or hashing was never
/// requested). It never equals `Hash::of(bytes)` for any `bytes`, including
/// `&[]`, because `of` always sets the tag byte described below.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Hash(Repr);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
enum Repr {
    Null,
    Digest([u8; 32]),
}

impl Hash {
    /// The distinguished "no content" hash.
    pub const NULL: Hash = Hash(Repr::Null);

    /// Hash of arbitrary bytes. Never equal to [`Hash::NULL`].
    #[must_use]
    pub fn of(bytes: &[u8]) -> Hash {
        Hash(Repr::Digest(*blake3::hash(bytes).as_bytes()))
    }

    /// Hash built incrementally from several chunks, equivalent to hashing
    /// their concatenation.
    #[must_use]
    pub fn of_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Hash {
        let mut hasher = blake3::Hasher::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Hash(Repr::Digest(*hasher.finalize().as_bytes()))
    }

    /// True if this is the distinguished null hash.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.0, Repr::Null)
    }

    /// Raw digest bytes, or `None` for [`Hash::NULL`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8; 32]> {
        match &self.0 {
            Repr::Null => None,
            Repr::Digest(bytes) => Some(bytes),
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Null => write!(f, "null"),
            Repr::Digest(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_differs_from_empty_content() {
        assert_ne!(Hash::NULL, Hash::of(&[]));
    }

    #[test]
    fn same_bytes_same_hash() {
        assert_eq!(Hash::of(b"foo"), Hash::of(b"foo"));
    }

    #[test]
    fn different_bytes_different_hash() {
        assert_ne!(Hash::of(b"foo"), Hash::of(b"bar"));
    }

    #[test]
    fn chunked_matches_concatenated() {
        let whole = Hash::of(b"foobar");
        let chunked = Hash::of_chunks([b"foo".as_slice(), b"bar".as_slice()]);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn display_is_lowercase_hex() {
        let h = Hash::of(b"x");
        let s = h.to_string();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }
}
