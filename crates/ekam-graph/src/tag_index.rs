//! Multimap from [`Tag`] to the [`ProvisionId`]s that currently satisfy it,
//! plus the preferred-provider tie-break (§4.1).

use crate::ids::ProvisionId;
use crate::provision::Provision;
use ekam_core::Tag;
use rustc_hash::FxHashMap;

/// Tag → live provisions. Insertion/removal are amortised O(1); membership
/// per tag is a small `Vec` since fan-out per tag is small in practice.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_tag: FxHashMap<Tag, Vec<ProvisionId>>,
}

impl TagIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under every tag in `tags`.
    pub fn insert(&mut self, tags: &[Tag], id: ProvisionId) {
        for &tag in tags {
            let bucket = self.by_tag.entry(tag).or_default();
            if !bucket.contains(&id) {
                bucket.push(id);
            }
        }
    }

    /// Remove `id` from every tag bucket it appears in. Empty buckets are
    /// dropped so a tag with no providers costs nothing to query.
    pub fn remove(&mut self, tags: &[Tag], id: ProvisionId) {
        for tag in tags {
            if let Some(bucket) = self.by_tag.get_mut(tag) {
                bucket.retain(|&candidate| candidate != id);
                if bucket.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    /// All current candidates for `tag`, in no particular order.
    #[must_use]
    pub fn candidates(&self, tag: Tag) -> &[ProvisionId] {
        self.by_tag.get(&tag).map_or(&[], Vec::as_slice)
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn depth(canonical_name: &str) -> usize {
    canonical_name.bytes().filter(|&b| b == b'/').count()
}

/// Apply the §4.1 tie-break over `candidates`, resolving each id through
/// `lookup`, relative to `consumer_canonical_name`. Returns `None` only if
/// `candidates` is empty.
pub fn choose_preferred<'a>(
    candidates: &[ProvisionId],
    consumer_canonical_name: &str,
    lookup: impl Fn(ProvisionId) -> &'a Provision,
) -> Option<ProvisionId> {
    let mut iter = candidates.iter().copied();
    let mut best_id = iter.next()?;
    let mut best_name = lookup(best_id).artifact().canonical_name().to_string();
    let mut best_depth = depth(&best_name);
    let mut best_prefix = common_prefix_len(consumer_canonical_name, &best_name);

    for candidate_id in iter {
        let candidate = lookup(candidate_id);
        let candidate_name = candidate.artifact().canonical_name();
        let candidate_depth = depth(candidate_name);
        let candidate_prefix = common_prefix_len(consumer_canonical_name, candidate_name);

        let better = match candidate_prefix.cmp(&best_prefix) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match candidate_depth.cmp(&best_depth) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => match best_name.as_str().cmp(candidate_name) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Equal => {
                        tracing::warn!(
                            name = %best_name,
                            "two provisions share a canonical name; picking the earlier one"
                        );
                        false
                    }
                    std::cmp::Ordering::Less => false,
                },
            },
        };

        if better {
            best_id = candidate_id;
            best_name = candidate_name.to_string();
            best_depth = candidate_depth;
            best_prefix = candidate_prefix;
        }
    }

    Some(best_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provision::Provision;
    use ekam_fs::{Artifact, DiskArtifact};
    use std::sync::Arc;

    #[test]
    fn common_prefix_counts_matching_bytes() {
        assert_eq!(common_prefix_len("src/foo/bar", "src/foo/baz"), 10);
        assert_eq!(common_prefix_len("a", "b"), 0);
    }

    #[test]
    fn depth_counts_slashes() {
        assert_eq!(depth("a/b/c"), 2);
        assert_eq!(depth("a"), 0);
    }

    fn provision_named(root: &std::path::Path, name: &str) -> Provision {
        let artifact = Box::new(DiskArtifact::new(Arc::new(root.to_path_buf()), name.to_string(), false));
        Provision::new(None, artifact, vec![])
    }

    proptest::proptest! {
        /// §8 "preferred-provider stability": the winner among a fixed set of
        /// candidate names depends only on the set, never on the order they
        /// were registered or handed to `choose_preferred`.
        #[test]
        fn choose_preferred_is_order_independent(
            names in proptest::collection::hash_set("[a-z]{1,3}(/[a-z]{1,3}){0,3}", 2..6),
            consumer in "[a-z]{1,3}(/[a-z]{1,3}){0,3}",
        ) {
            let dir = tempfile::tempdir().unwrap();
            let names: Vec<String> = names.into_iter().collect();
            let provisions: Vec<Provision> = names.iter().map(|n| provision_named(dir.path(), n)).collect();
            let ids: Vec<ProvisionId> = (0..provisions.len()).map(|i| ProvisionId::from_raw(i as u64)).collect();
            let lookup = |id: ProvisionId| &provisions[id.raw() as usize];

            let baseline = choose_preferred(&ids, &consumer, lookup).unwrap();
            let baseline_name = lookup(baseline).artifact().canonical_name().to_string();

            let mut shuffled = ids.clone();
            shuffled.reverse();
            let reversed = choose_preferred(&shuffled, &consumer, lookup).unwrap();
            let reversed_name = lookup(reversed).artifact().canonical_name().to_string();

            proptest::prop_assert_eq!(baseline_name, reversed_name);
        }
    }
}
