//! Symbolic dependency keys.
//!
//! A [`Tag`] is the hash of a canonical name string such as `file:src/a.cpp`
//! or `c++symbol:std::vector`. Two tags are equal iff their names hashed to
//! the same digest; the name itself is not retained (matching the original
//! `Tag` class, which only keeps a name around under an `EXTRA_DEBUG` build).

use std::fmt;

/// Every file artifact carries this tag in addition to whatever type-specific
/// tags the extraction action assigns it.
pub const DEFAULT_TAG_NAME: &str = "file:*";

/// Opaque, hash-identified dependency key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Tag {
    digest: [u8; 32],
}

impl Tag {
    /// Build a tag from an already-canonical name, e.g. `filetype:.cpp`.
    /// Unlike [`Tag::from_file`], performs no path canonicalization — callers
    /// constructing non-file tags (`bin:`, `lib:`, `header:`, ...) are
    /// expected to have already formed the right string.
    #[must_use]
    pub fn from_name(name: &str) -> Tag {
        Tag {
            digest: *blake3::hash(name.as_bytes()).as_bytes(),
        }
    }

    /// Build the `file:<canonical path>` tag for a project-relative path.
    #[must_use]
    pub fn from_file(path: &str) -> Tag {
        let mut name = String::with_capacity(path.len() + 5);
        name.push_str("file:");
        name.push_str(&canonicalize_path(path));
        Tag::from_name(&name)
    }

    /// The tag every file artifact carries regardless of type.
    #[must_use]
    pub fn default_tag() -> Tag {
        Tag::from_name(DEFAULT_TAG_NAME)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.digest[..4] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Collapse `.`, `..`, leading `./`, and duplicate `/` segments the same way
/// the original `Tag::fromFile` canonicalizer did: a pure lexical rewrite,
/// no filesystem access, no resolution of symlinks.
#[must_use]
pub fn canonicalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_dot_and_dotdot_and_dup_slashes() {
        assert_eq!(canonicalize_path("a/./b//c/../d"), "a/b/d");
    }

    #[test]
    fn leading_dot_slash_collapses() {
        assert_eq!(canonicalize_path("./src/foo.cpp"), "src/foo.cpp");
    }

    #[test]
    fn dotdot_past_root_is_ignored_not_negative() {
        assert_eq!(canonicalize_path("../../a"), "a");
    }

    #[test]
    fn from_file_canonicalizes_equal_paths_to_equal_tags() {
        assert_eq!(
            Tag::from_file("a/./b//c/../d"),
            Tag::from_file("a/b/d")
        );
    }

    #[test]
    fn from_file_distinguishes_different_paths() {
        assert_ne!(Tag::from_file("a/b"), Tag::from_file("a/c"));
    }

    #[test]
    fn default_tag_is_stable() {
        assert_eq!(Tag::default_tag(), Tag::from_name("file:*"));
    }

    proptest::proptest! {
        #[test]
        fn canonicalize_is_idempotent(path in "[a-z/.]{0,40}") {
            let once = canonicalize_path(&path);
            let twice = canonicalize_path(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
