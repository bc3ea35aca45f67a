//! The persisted entity types of the tiered tree.
//!
//! Three tiers make up one version of the key space: a [`CommitNode`] points
//! at the tree root, an [`IndexNode`] fans out by key hash, and a
//! [`Fragment`] holds an ordered run of keys. [`CommitMetadata`] is stored
//! as its own entity so commit nodes stay small. All four are immutable
//! once persisted and addressed by the BLAKE3 hash of their canonical
//! bytes, domain-separated per kind.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tvs_types::{ContentHasher, Id, Key, WithPayload};

use crate::error::{ModelError, ModelResult};

/// The kind of entity stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Leaf tier: ordered key entries.
    Fragment,
    /// Fan-out tier: fixed-width bucket array.
    Index,
    /// Graph tier: parent pointer, tree root, and the applied deltas.
    Commit,
    /// Author/message/timestamp record referenced by a commit.
    Metadata,
}

impl EntityKind {
    /// One-byte tag for framed record forms.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Fragment => 0,
            Self::Index => 1,
            Self::Commit => 2,
            Self::Metadata => 3,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Fragment),
            1 => Some(Self::Index),
            2 => Some(Self::Commit),
            3 => Some(Self::Metadata),
            _ => None,
        }
    }

    /// The domain-separated hasher for this kind.
    pub fn hasher(self) -> &'static ContentHasher {
        match self {
            Self::Fragment => &ContentHasher::FRAGMENT,
            Self::Index => &ContentHasher::INDEX,
            Self::Commit => &ContentHasher::COMMIT,
            Self::Metadata => &ContentHasher::METADATA,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment => write!(f, "fragment"),
            Self::Index => write!(f, "index"),
            Self::Commit => write!(f, "commit"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fragment" => Ok(Self::Fragment),
            "index" => Ok(Self::Index),
            "commit" => Ok(Self::Commit),
            "metadata" => Ok(Self::Metadata),
            other => Err(ModelError::Serialization(format!(
                "unknown entity kind {other:?}"
            ))),
        }
    }
}

/// Typed pointer into the tree: a bucket holds either a nested index or a
/// leaf fragment, never an untyped id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeRef {
    Fragment(Id),
    Index(Id),
}

impl TreeRef {
    pub fn id(self) -> Id {
        match self {
            Self::Fragment(id) | Self::Index(id) => id,
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::Fragment(_) => EntityKind::Fragment,
            Self::Index(_) => EntityKind::Index,
        }
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// One key in a fragment, paired with the tagged content id it maps to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key: Key,
    pub content: WithPayload<Id>,
}

impl KeyEntry {
    pub fn new(key: Key, content: WithPayload<Id>) -> Self {
        Self { key, content }
    }
}

/// Leaf tier: an ordered run of keys with their content ids.
///
/// Fragments are size-agnostic; the capacity bound is enforced by the
/// commit algorithm so a stored fragment can always be read back
/// regardless of the active configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    entries: Vec<KeyEntry>,
}

impl Fragment {
    /// Build a fragment from entries, sorted by key for deterministic
    /// hashing. Callers keep keys unique.
    pub fn new(mut entries: Vec<KeyEntry>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Binary-search lookup by key.
    pub fn get(&self, key: &Key) -> Option<&WithPayload<Id>> {
        self.entries
            .binary_search_by(|entry| entry.key.cmp(key))
            .ok()
            .map(|i| &self.entries[i].content)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// IndexNode
// ---------------------------------------------------------------------------

/// Fan-out tier: a fixed-width array of optional child references.
///
/// Bucket selection uses [`Key::hash_bucket_at`] with this node's own
/// width and tree tier, so trees written under a different configured
/// width stay readable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    buckets: Vec<Option<TreeRef>>,
}

impl IndexNode {
    pub fn new(buckets: Vec<Option<TreeRef>>) -> Self {
        Self { buckets }
    }

    /// An index with `bucket_count` vacant buckets.
    pub fn empty(bucket_count: usize) -> Self {
        Self {
            buckets: vec![None; bucket_count],
        }
    }

    pub fn buckets(&self) -> &[Option<TreeRef>] {
        &self.buckets
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn child(&self, bucket: usize) -> Option<TreeRef> {
        self.buckets.get(bucket).copied().flatten()
    }

    /// Replace one bucket. Callers index within `bucket_count`.
    pub fn set_child(&mut self, bucket: usize, child: Option<TreeRef>) {
        self.buckets[bucket] = child;
    }

    /// Occupied buckets with their positions.
    pub fn children(&self) -> impl Iterator<Item = (usize, TreeRef)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|r| (i, r)))
    }

    pub fn is_vacant(&self) -> bool {
        self.buckets.iter().all(Option::is_none)
    }
}

// ---------------------------------------------------------------------------
// CommitNode
// ---------------------------------------------------------------------------

/// Stored per-commit delta, replayable by log readers without tree diffing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Put { key: Key, content: WithPayload<Id> },
    Delete { key: Key },
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Graph tier: one node of the commit history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNode {
    /// Parent commit, `None` for a root commit.
    pub parent: Option<Id>,
    /// Content id of this commit's [`CommitMetadata`].
    pub metadata: Id,
    /// Root of the key tree as of this commit.
    pub tree: TreeRef,
    /// The deltas this commit applied, in operation order.
    pub mutations: Vec<Mutation>,
}

// ---------------------------------------------------------------------------
// CommitMetadata
// ---------------------------------------------------------------------------

/// Who, when, and why for a commit.
///
/// Stored as its own content-addressed entity so commit nodes stay small
/// and metadata can be fetched without the tree. `properties` carries
/// free-form annotations; a `BTreeMap` keeps canonical bytes deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub author: String,
    pub message: String,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub properties: BTreeMap<String, String>,
}

impl CommitMetadata {
    /// Metadata stamped with the current wall-clock time.
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            timestamp_ms: now_ms(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Closed union over the four persisted entity types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    Fragment(Fragment),
    Index(IndexNode),
    Commit(CommitNode),
    Metadata(CommitMetadata),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Fragment(_) => EntityKind::Fragment,
            Self::Index(_) => EntityKind::Index,
            Self::Commit(_) => EntityKind::Commit,
            Self::Metadata(_) => EntityKind::Metadata,
        }
    }

    /// The canonical serialized form used for content addressing.
    ///
    /// Always bincode of the typed value, independent of any backend's
    /// record shape, so heterogeneous stores agree on ids.
    pub fn canonical_bytes(&self) -> ModelResult<Vec<u8>> {
        let bytes = match self {
            Self::Fragment(f) => bincode::serialize(f),
            Self::Index(i) => bincode::serialize(i),
            Self::Commit(c) => bincode::serialize(c),
            Self::Metadata(m) => bincode::serialize(m),
        };
        bytes.map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Compute the content-addressed id for this entity.
    ///
    /// Uses the domain-separated hasher for the entity's kind, so two
    /// entities of different kinds never share an id even with identical
    /// canonical bytes.
    pub fn compute_id(&self) -> ModelResult<Id> {
        let bytes = self.canonical_bytes()?;
        Ok(self.kind().hasher().hash(&bytes))
    }

    pub fn into_fragment(self) -> ModelResult<Fragment> {
        match self {
            Self::Fragment(f) => Ok(f),
            other => Err(kind_mismatch(EntityKind::Fragment, &other)),
        }
    }

    pub fn into_index(self) -> ModelResult<IndexNode> {
        match self {
            Self::Index(i) => Ok(i),
            other => Err(kind_mismatch(EntityKind::Index, &other)),
        }
    }

    pub fn into_commit(self) -> ModelResult<CommitNode> {
        match self {
            Self::Commit(c) => Ok(c),
            other => Err(kind_mismatch(EntityKind::Commit, &other)),
        }
    }

    pub fn into_metadata(self) -> ModelResult<CommitMetadata> {
        match self {
            Self::Metadata(m) => Ok(m),
            other => Err(kind_mismatch(EntityKind::Metadata, &other)),
        }
    }
}

fn kind_mismatch(expected: EntityKind, actual: &Entity) -> ModelError {
    ModelError::KindMismatch {
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvs_types::Payload;

    fn oid(byte: u8) -> Id {
        Id::from([byte; 32])
    }

    fn key(path: &str) -> Key {
        Key::from_path(path).unwrap()
    }

    fn entry(path: &str, byte: u8) -> KeyEntry {
        KeyEntry::new(key(path), WithPayload::new(Payload::new(1), oid(byte)))
    }

    #[test]
    fn fragment_entries_sorted() {
        let fragment = Fragment::new(vec![
            entry("tables/zebra", 1),
            entry("tables/alpha", 2),
            entry("tables/middle", 3),
        ]);
        let keys: Vec<String> = fragment
            .entries()
            .iter()
            .map(|e| e.key.to_string())
            .collect();
        assert_eq!(keys, ["tables/alpha", "tables/middle", "tables/zebra"]);
    }

    #[test]
    fn fragment_lookup() {
        let fragment = Fragment::new(vec![entry("a", 1), entry("b", 2), entry("c", 3)]);
        assert_eq!(fragment.get(&key("b")).unwrap().value, oid(2));
        assert!(fragment.get(&key("missing")).is_none());
        assert!(fragment.contains(&key("a")));
        assert_eq!(fragment.len(), 3);
    }

    #[test]
    fn empty_fragment() {
        let fragment = Fragment::empty();
        assert!(fragment.is_empty());
        assert!(fragment.get(&key("a")).is_none());
    }

    #[test]
    fn index_children() {
        let mut index = IndexNode::empty(4);
        assert!(index.is_vacant());
        index.set_child(2, Some(TreeRef::Fragment(oid(9))));
        assert_eq!(index.child(2), Some(TreeRef::Fragment(oid(9))));
        assert_eq!(index.child(0), None);
        assert_eq!(index.child(100), None);
        let children: Vec<_> = index.children().collect();
        assert_eq!(children, vec![(2, TreeRef::Fragment(oid(9)))]);
    }

    #[test]
    fn tree_ref_accessors() {
        let r = TreeRef::Index(oid(5));
        assert_eq!(r.id(), oid(5));
        assert_eq!(r.kind(), EntityKind::Index);
        assert_eq!(TreeRef::Fragment(oid(5)).kind(), EntityKind::Fragment);
    }

    #[test]
    fn entity_id_deterministic() {
        let fragment = Entity::Fragment(Fragment::new(vec![entry("a", 1)]));
        assert_eq!(
            fragment.compute_id().unwrap(),
            fragment.compute_id().unwrap()
        );
    }

    #[test]
    fn identical_bytes_different_kinds_never_collide() {
        // An empty fragment and a zero-bucket index serialize to the same
        // canonical bytes (an empty list); domain separation must still
        // keep their ids apart.
        let fragment = Entity::Fragment(Fragment::empty());
        let index = Entity::Index(IndexNode::new(vec![]));
        assert_eq!(
            fragment.canonical_bytes().unwrap(),
            index.canonical_bytes().unwrap()
        );
        assert_ne!(
            fragment.compute_id().unwrap(),
            index.compute_id().unwrap()
        );
    }

    #[test]
    fn entity_id_changes_with_content() {
        let a = Entity::Fragment(Fragment::new(vec![entry("a", 1)]));
        let b = Entity::Fragment(Fragment::new(vec![entry("a", 2)]));
        assert_ne!(a.compute_id().unwrap(), b.compute_id().unwrap());
    }

    #[test]
    fn into_typed_entity() {
        let entity = Entity::Fragment(Fragment::empty());
        assert!(entity.clone().into_fragment().is_ok());
        let err = entity.into_commit().unwrap_err();
        assert_eq!(
            err,
            ModelError::KindMismatch {
                expected: EntityKind::Commit,
                actual: EntityKind::Fragment,
            }
        );
    }

    #[test]
    fn kind_tag_roundtrip() {
        for kind in [
            EntityKind::Fragment,
            EntityKind::Index,
            EntityKind::Commit,
            EntityKind::Metadata,
        ] {
            assert_eq!(EntityKind::from_tag(kind.tag()), Some(kind));
            assert_eq!(kind.to_string().parse::<EntityKind>().unwrap(), kind);
        }
        assert_eq!(EntityKind::from_tag(17), None);
        assert!("blob".parse::<EntityKind>().is_err());
    }

    #[test]
    fn metadata_properties() {
        let meta = CommitMetadata::new("alice", "create table")
            .with_property("engine", "iceberg")
            .with_property("job", "nightly");
        assert_eq!(meta.properties.len(), 2);
        assert_eq!(meta.properties["engine"], "iceberg");
        assert!(meta.timestamp_ms > 0);
    }

    #[test]
    fn mutation_key_accessor() {
        let put = Mutation::Put {
            key: key("a"),
            content: WithPayload::untagged(oid(1)),
        };
        let del = Mutation::Delete { key: key("b") };
        assert_eq!(put.key(), &key("a"));
        assert_eq!(del.key(), &key("b"));
    }
}
