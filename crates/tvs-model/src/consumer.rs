//! The consumer/producer marshalling protocol.
//!
//! Backends never touch the typed entities directly. A backend implements
//! the consumer traits to marshal attribute-by-attribute into its native
//! record shape, and replays stored records back through the same traits
//! into the typed builders. Attributes are set-once: a builder records a
//! repeated attribute as a defect at call time (first defect wins) and
//! fails at `finalize()`, never deferring a malformed entity to read time.

use std::collections::BTreeMap;

use tvs_types::Id;

use crate::entity::{
    CommitMetadata, CommitNode, Entity, EntityKind, Fragment, IndexNode, KeyEntry, Mutation,
    TreeRef,
};
use crate::error::{ModelError, ModelResult};

// Attribute presence bits, one per attribute across all builders.
const ID: u16 = 1 << 0;
const ENTRIES: u16 = 1 << 1;
const BUCKETS: u16 = 1 << 2;
const PARENT: u16 = 1 << 3;
const METADATA: u16 = 1 << 4;
const TREE: u16 = 1 << 5;
const MUTATIONS: u16 = 1 << 6;
const AUTHOR: u16 = 1 << 7;
const MESSAGE: u16 = 1 << 8;
const TIMESTAMP: u16 = 1 << 9;
const PROPERTIES: u16 = 1 << 10;

/// Attribute sink shared by every entity consumer.
///
/// The content id travels with record forms that embed it (read path);
/// producers on the write path usually skip it because the id is derived
/// from the finished entity.
pub trait EntityConsumer {
    fn id(&mut self, id: Id) -> &mut Self;
}

/// Consumer for fragment attributes.
pub trait FragmentConsumer: EntityConsumer {
    /// The fragment's key entries.
    fn entries(&mut self, entries: Vec<KeyEntry>) -> &mut Self;
}

/// Consumer for index attributes.
pub trait IndexConsumer: EntityConsumer {
    /// The full bucket array, vacant slots included.
    fn buckets(&mut self, buckets: Vec<Option<TreeRef>>) -> &mut Self;
}

/// Consumer for commit attributes.
pub trait CommitConsumer: EntityConsumer {
    /// Parent commit id. Never called for a root commit.
    fn parent(&mut self, parent: Id) -> &mut Self;
    fn metadata(&mut self, metadata: Id) -> &mut Self;
    fn tree(&mut self, tree: TreeRef) -> &mut Self;
    fn mutations(&mut self, mutations: Vec<Mutation>) -> &mut Self;
}

/// Consumer for commit-metadata attributes.
pub trait MetadataConsumer: EntityConsumer {
    fn author(&mut self, author: String) -> &mut Self;
    fn message(&mut self, message: String) -> &mut Self;
    fn timestamp_ms(&mut self, timestamp_ms: u64) -> &mut Self;
    /// Free-form annotations. Optional; defaults to an empty map.
    fn properties(&mut self, properties: BTreeMap<String, String>) -> &mut Self;
}

// ---------------------------------------------------------------------------
// Producers
// ---------------------------------------------------------------------------

impl Fragment {
    /// Replay this fragment into any consumer, one attribute at a time.
    pub fn produce<C: FragmentConsumer + ?Sized>(&self, consumer: &mut C) {
        consumer.entries(self.entries().to_vec());
    }
}

impl IndexNode {
    /// Replay this index into any consumer.
    pub fn produce<C: IndexConsumer + ?Sized>(&self, consumer: &mut C) {
        consumer.buckets(self.buckets().to_vec());
    }
}

impl CommitNode {
    /// Replay this commit into any consumer.
    pub fn produce<C: CommitConsumer + ?Sized>(&self, consumer: &mut C) {
        if let Some(parent) = self.parent {
            consumer.parent(parent);
        }
        consumer
            .metadata(self.metadata)
            .tree(self.tree)
            .mutations(self.mutations.clone());
    }
}

impl CommitMetadata {
    /// Replay this metadata into any consumer.
    pub fn produce<C: MetadataConsumer + ?Sized>(&self, consumer: &mut C) {
        consumer
            .author(self.author.clone())
            .message(self.message.clone())
            .timestamp_ms(self.timestamp_ms)
            .properties(self.properties.clone());
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Presence bits plus the first defect seen.
#[derive(Debug, Default)]
struct AttrSet {
    bits: u16,
    defect: Option<ModelError>,
}

impl AttrSet {
    /// Record `bit` as set. On a repeat, records the first defect and
    /// returns `false` so the caller drops the value.
    fn mark(&mut self, kind: EntityKind, bit: u16, attribute: &'static str) -> bool {
        if self.bits & bit != 0 {
            if self.defect.is_none() {
                self.defect = Some(ModelError::DuplicateAttribute { kind, attribute });
            }
            return false;
        }
        self.bits |= bit;
        true
    }

    /// Fail with the recorded defect or any missing required attribute.
    fn finish(&mut self, kind: EntityKind, required: &[(u16, &'static str)]) -> ModelResult<()> {
        if let Some(defect) = self.defect.take() {
            return Err(defect);
        }
        let mut missing = Vec::new();
        for (bit, name) in required {
            if self.bits & *bit == 0 {
                missing.push(*name);
            }
        }
        if !missing.is_empty() {
            return Err(ModelError::IncompleteEntity {
                kind,
                missing: missing.join(", "),
            });
        }
        Ok(())
    }
}

fn missing(kind: EntityKind, attribute: &str) -> ModelError {
    ModelError::IncompleteEntity {
        kind,
        missing: attribute.to_string(),
    }
}

/// Verify a supplied id against the rebuilt entity. No-op when the
/// producer never supplied one.
fn check_id(entity: Entity, supplied: Option<Id>) -> ModelResult<Entity> {
    if let Some(expected) = supplied {
        let actual = entity.compute_id()?;
        if actual != expected {
            return Err(ModelError::IdMismatch {
                kind: entity.kind(),
                expected,
                actual,
            });
        }
    }
    Ok(entity)
}

/// Set-once builder for [`Fragment`].
#[derive(Debug, Default)]
pub struct FragmentBuilder {
    attrs: AttrSet,
    id: Option<Id>,
    entries: Vec<KeyEntry>,
}

impl FragmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the collected attributes into a [`Fragment`].
    ///
    /// Fails with the first recorded defect, with `IncompleteEntity` when
    /// a required attribute is missing, or with `IdMismatch` when a
    /// supplied id does not match the rebuilt entity.
    pub fn finalize(mut self) -> ModelResult<Fragment> {
        self.attrs
            .finish(EntityKind::Fragment, &[(ENTRIES, "entries")])?;
        check_id(Entity::Fragment(Fragment::new(self.entries)), self.id)?.into_fragment()
    }
}

impl EntityConsumer for FragmentBuilder {
    fn id(&mut self, id: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Fragment, ID, "id") {
            self.id = Some(id);
        }
        self
    }
}

impl FragmentConsumer for FragmentBuilder {
    fn entries(&mut self, entries: Vec<KeyEntry>) -> &mut Self {
        if self.attrs.mark(EntityKind::Fragment, ENTRIES, "entries") {
            self.entries = entries;
        }
        self
    }
}

/// Set-once builder for [`IndexNode`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    attrs: AttrSet,
    id: Option<Id>,
    buckets: Vec<Option<TreeRef>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalize(mut self) -> ModelResult<IndexNode> {
        self.attrs.finish(EntityKind::Index, &[(BUCKETS, "buckets")])?;
        if self.buckets.is_empty() {
            return Err(ModelError::EmptyIndex);
        }
        check_id(Entity::Index(IndexNode::new(self.buckets)), self.id)?.into_index()
    }
}

impl EntityConsumer for IndexBuilder {
    fn id(&mut self, id: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Index, ID, "id") {
            self.id = Some(id);
        }
        self
    }
}

impl IndexConsumer for IndexBuilder {
    fn buckets(&mut self, buckets: Vec<Option<TreeRef>>) -> &mut Self {
        if self.attrs.mark(EntityKind::Index, BUCKETS, "buckets") {
            self.buckets = buckets;
        }
        self
    }
}

/// Set-once builder for [`CommitNode`].
#[derive(Debug, Default)]
pub struct CommitBuilder {
    attrs: AttrSet,
    id: Option<Id>,
    parent: Option<Id>,
    metadata: Option<Id>,
    tree: Option<TreeRef>,
    mutations: Vec<Mutation>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalize(mut self) -> ModelResult<CommitNode> {
        self.attrs.finish(
            EntityKind::Commit,
            &[
                (METADATA, "metadata"),
                (TREE, "tree"),
                (MUTATIONS, "mutations"),
            ],
        )?;
        let metadata = self
            .metadata
            .ok_or_else(|| missing(EntityKind::Commit, "metadata"))?;
        let tree = self
            .tree
            .ok_or_else(|| missing(EntityKind::Commit, "tree"))?;
        let commit = CommitNode {
            parent: self.parent,
            metadata,
            tree,
            mutations: self.mutations,
        };
        check_id(Entity::Commit(commit), self.id)?.into_commit()
    }
}

impl EntityConsumer for CommitBuilder {
    fn id(&mut self, id: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Commit, ID, "id") {
            self.id = Some(id);
        }
        self
    }
}

impl CommitConsumer for CommitBuilder {
    fn parent(&mut self, parent: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Commit, PARENT, "parent") {
            self.parent = Some(parent);
        }
        self
    }

    fn metadata(&mut self, metadata: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Commit, METADATA, "metadata") {
            self.metadata = Some(metadata);
        }
        self
    }

    fn tree(&mut self, tree: TreeRef) -> &mut Self {
        if self.attrs.mark(EntityKind::Commit, TREE, "tree") {
            self.tree = Some(tree);
        }
        self
    }

    fn mutations(&mut self, mutations: Vec<Mutation>) -> &mut Self {
        if self.attrs.mark(EntityKind::Commit, MUTATIONS, "mutations") {
            self.mutations = mutations;
        }
        self
    }
}

/// Set-once builder for [`CommitMetadata`].
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    attrs: AttrSet,
    id: Option<Id>,
    author: Option<String>,
    message: Option<String>,
    timestamp_ms: Option<u64>,
    properties: BTreeMap<String, String>,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalize(mut self) -> ModelResult<CommitMetadata> {
        self.attrs.finish(
            EntityKind::Metadata,
            &[
                (AUTHOR, "author"),
                (MESSAGE, "message"),
                (TIMESTAMP, "timestamp_ms"),
            ],
        )?;
        let author = self
            .author
            .ok_or_else(|| missing(EntityKind::Metadata, "author"))?;
        let message = self
            .message
            .ok_or_else(|| missing(EntityKind::Metadata, "message"))?;
        let timestamp_ms = self
            .timestamp_ms
            .ok_or_else(|| missing(EntityKind::Metadata, "timestamp_ms"))?;
        let metadata = CommitMetadata {
            author,
            message,
            timestamp_ms,
            properties: self.properties,
        };
        check_id(Entity::Metadata(metadata), self.id)?.into_metadata()
    }
}

impl EntityConsumer for MetadataBuilder {
    fn id(&mut self, id: Id) -> &mut Self {
        if self.attrs.mark(EntityKind::Metadata, ID, "id") {
            self.id = Some(id);
        }
        self
    }
}

impl MetadataConsumer for MetadataBuilder {
    fn author(&mut self, author: String) -> &mut Self {
        if self.attrs.mark(EntityKind::Metadata, AUTHOR, "author") {
            self.author = Some(author);
        }
        self
    }

    fn message(&mut self, message: String) -> &mut Self {
        if self.attrs.mark(EntityKind::Metadata, MESSAGE, "message") {
            self.message = Some(message);
        }
        self
    }

    fn timestamp_ms(&mut self, timestamp_ms: u64) -> &mut Self {
        if self.attrs.mark(EntityKind::Metadata, TIMESTAMP, "timestamp_ms") {
            self.timestamp_ms = Some(timestamp_ms);
        }
        self
    }

    fn properties(&mut self, properties: BTreeMap<String, String>) -> &mut Self {
        if self.attrs.mark(EntityKind::Metadata, PROPERTIES, "properties") {
            self.properties = properties;
        }
        self
    }
}
