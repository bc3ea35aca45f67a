use crate::id::Id;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"tvs-fragment-v1"`) that is
/// prepended to every hash computation. This prevents cross-kind collisions:
/// a Fragment and an Index whose canonical bytes happen to be identical
/// still produce different Ids.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for fragment entities (tier 3).
    pub const FRAGMENT: Self = Self {
        domain: "tvs-fragment-v1",
    };
    /// Hasher for index entities (tier 2).
    pub const INDEX: Self = Self {
        domain: "tvs-index-v1",
    };
    /// Hasher for commit entities (tier 1).
    pub const COMMIT: Self = Self {
        domain: "tvs-commit-v1",
    };
    /// Hasher for commit metadata entities.
    pub const METADATA: Self = Self {
        domain: "tvs-metadata-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Id {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Id::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected Id.
    pub fn verify(&self, data: &[u8], expected: &Id) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"canonical bytes";
        assert_eq!(
            ContentHasher::FRAGMENT.hash(data),
            ContentHasher::FRAGMENT.hash(data)
        );
    }

    #[test]
    fn different_domains_produce_different_ids() {
        let data = b"same content";
        let fragment = ContentHasher::FRAGMENT.hash(data);
        let index = ContentHasher::INDEX.hash(data);
        let commit = ContentHasher::COMMIT.hash(data);
        let metadata = ContentHasher::METADATA.hash(data);
        assert_ne!(fragment, index);
        assert_ne!(fragment, commit);
        assert_ne!(index, commit);
        assert_ne!(commit, metadata);
    }

    #[test]
    fn verify_correct_data() {
        let data = b"verify me";
        let id = ContentHasher::COMMIT.hash(data);
        assert!(ContentHasher::COMMIT.verify(data, &id));
    }

    #[test]
    fn verify_incorrect_data() {
        let id = ContentHasher::COMMIT.hash(b"original");
        assert!(!ContentHasher::COMMIT.verify(b"tampered", &id));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("tvs-custom-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::FRAGMENT.hash(b"data"));
        assert_eq!(hasher.domain(), "tvs-custom-v1");
    }
}
