//! Hierarchical keys for the versioned key space.
//!
//! A [`Key`] is an ordered, non-empty sequence of string segments naming one
//! addressable item (e.g. a table path like `tables/t1`). Keys compare
//! element-wise, lexicographically, which is the order used both for
//! fan-out bucket assignment and for entry ordering within a fragment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An ordered, non-empty sequence of path segments.
///
/// The derived `Ord` is element-wise lexicographic over the segments, so
/// `["a"] < ["a", "a"] < ["b"]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    segments: Vec<String>,
}

impl Key {
    /// Build a key from segments.
    ///
    /// Rejects an empty segment list, empty segments, and segments
    /// containing `/` (reserved by the path syntax).
    pub fn new(segments: Vec<String>) -> Result<Self, TypeError> {
        if segments.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(TypeError::EmptySegment { index });
            }
            if segment.contains('/') {
                return Err(TypeError::InvalidSegment {
                    segment: segment.clone(),
                    reason: "must not contain '/'".into(),
                });
            }
        }
        Ok(Self { segments })
    }

    /// Parse a key from its `a/b/c` path form.
    pub fn from_path(path: &str) -> Result<Self, TypeError> {
        Self::new(path.split('/').map(str::to_string).collect())
    }

    /// The key's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Deterministic fan-out bucket for this key at the top index tier.
    ///
    /// Shorthand for [`Key::hash_bucket_at`] with level 0.
    pub fn hash_bucket(&self, bucket_count: usize) -> usize {
        self.hash_bucket_at(0, bucket_count)
    }

    /// Deterministic fan-out bucket for this key at a given index tier.
    ///
    /// Each tier consumes one base-`bucket_count` digit of the routing
    /// hash, so keys that share a bucket at one tier spread out again at
    /// the tier below it. `bucket_count` must be non-zero.
    pub fn hash_bucket_at(&self, level: usize, bucket_count: usize) -> usize {
        let base = bucket_count as u128;
        let digit = match base.checked_pow(level as u32) {
            // Levels deep enough to exhaust the hash route to bucket 0.
            None => 0,
            Some(divisor) => (u128::from(self.routing_hash()) / divisor) % base,
        };
        digit as usize
    }

    /// The 64-bit routing hash buckets are carved from.
    ///
    /// Derived from a BLAKE3 hash over the length-framed segments, so the
    /// assignment is stable across processes and versions (never the std
    /// hasher, whose keys are randomized per process).
    fn routing_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        for segment in &self.segments {
            hasher.update(&(segment.len() as u32).to_le_bytes());
            hasher.update(segment.as_bytes());
        }
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> Key {
        Key::from_path(path).unwrap()
    }

    #[test]
    fn from_path_splits_segments() {
        let k = key("tables/region/t1");
        assert_eq!(k.segments(), &["tables", "region", "t1"]);
    }

    #[test]
    fn display_joins_segments() {
        assert_eq!(key("tables/t1").to_string(), "tables/t1");
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(Key::new(vec![]), Err(TypeError::EmptyKey));
    }

    #[test]
    fn empty_segment_rejected() {
        assert_eq!(
            Key::from_path("tables//t1"),
            Err(TypeError::EmptySegment { index: 1 })
        );
        assert!(Key::from_path("").is_err());
    }

    #[test]
    fn slash_in_segment_rejected() {
        let err = Key::new(vec!["a/b".to_string()]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidSegment { .. }));
    }

    #[test]
    fn ordering_is_element_wise() {
        assert!(key("a") < key("a/a"));
        assert!(key("a/b") < key("b"));
        assert!(key("tables/t1") < key("tables/t2"));
        assert!(key("tables/t10") > key("tables/t1"));
    }

    #[test]
    fn hash_bucket_is_deterministic_and_in_range() {
        let k = key("tables/t1");
        let bucket = k.hash_bucket(32);
        assert_eq!(bucket, k.hash_bucket(32));
        assert!(bucket < 32);
    }

    #[test]
    fn hash_bucket_spreads_keys() {
        // Not a distribution test, just a sanity check that the bucket
        // assignment is not constant.
        let buckets: std::collections::HashSet<usize> = (0..64)
            .map(|i| key(&format!("tables/t{i}")).hash_bucket(16))
            .collect();
        assert!(buckets.len() > 1);
    }

    #[test]
    fn framing_distinguishes_segment_boundaries() {
        assert_ne!(
            key("ab/c").hash_bucket(1 << 16),
            key("a/bc").hash_bucket(1 << 16)
        );
    }

    #[test]
    fn level_zero_matches_hash_bucket() {
        let k = key("tables/t1");
        assert_eq!(k.hash_bucket(32), k.hash_bucket_at(0, 32));
    }

    #[test]
    fn tiers_separate_keys_that_share_a_bucket() {
        // By pigeonhole, 17 keys over 16 buckets contain a colliding pair.
        let keys: Vec<Key> = (0..17).map(|i| key(&format!("tables/t{i}"))).collect();
        let mut pair = None;
        'outer: for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                if a.hash_bucket(16) == b.hash_bucket(16) {
                    pair = Some((a, b));
                    break 'outer;
                }
            }
        }
        let (a, b) = pair.expect("pigeonhole collision");
        // The full routing hash is 64 bits, so 16 base-16 digits cover it;
        // two distinct keys cannot agree on all of them.
        let separated =
            (0..16).any(|level| a.hash_bucket_at(level, 16) != b.hash_bucket_at(level, 16));
        assert!(separated, "{a} and {b} share every tier bucket");
    }

    #[test]
    fn deep_levels_exhaust_the_route() {
        let k = key("tables/t1");
        assert_eq!(k.hash_bucket_at(200, 1 << 16), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let k = key("tables/t1");
        let json = serde_json::to_string(&k).unwrap();
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(k, parsed);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn segment() -> impl Strategy<Value = String> {
            "[a-z0-9_.]{1,8}"
        }

        proptest! {
            #[test]
            fn bucket_always_in_range(
                segments in proptest::collection::vec(segment(), 1..5),
                count in 1usize..512,
                level in 0usize..20,
            ) {
                let k = Key::new(segments).unwrap();
                prop_assert!(k.hash_bucket(count) < count);
                prop_assert!(k.hash_bucket_at(level, count) < count);
            }

            #[test]
            fn path_form_roundtrips(segments in proptest::collection::vec(segment(), 1..5)) {
                let k = Key::new(segments).unwrap();
                prop_assert_eq!(Key::from_path(&k.to_string()).unwrap(), k);
            }

            #[test]
            fn ordering_matches_segment_ordering(
                a in proptest::collection::vec(segment(), 1..5),
                b in proptest::collection::vec(segment(), 1..5),
            ) {
                let ka = Key::new(a.clone()).unwrap();
                let kb = Key::new(b.clone()).unwrap();
                prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
            }
        }
    }
}
