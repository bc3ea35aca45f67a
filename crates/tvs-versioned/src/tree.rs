//! Reader and writer for the tiered key tree.
//!
//! A tree hangs below a commit as either a lone fragment or an index whose
//! buckets point at fragments or further indexes. Writes rebuild only the
//! buckets a change set touches and persist children before their parents,
//! so a reader following the old root never observes a partial rewrite.

use std::collections::BTreeMap;

use tracing::debug;
use tvs_model::{
    CommitMetadata, CommitNode, Entity, EntityCodec, EntityKind, Fragment, IndexNode, KeyEntry,
    ModelError, TreeRef,
};
use tvs_store::EntityStore;
use tvs_types::{Id, Key, WithPayload};

use crate::config::StoreConfig;
use crate::error::{VersionError, VersionResult};

/// Deduplicated change set for one commit: `Some` puts, `None` deletes.
pub(crate) type Changes = BTreeMap<Key, Option<WithPayload<Id>>>;

/// Tree access over a backend and codec pair.
pub(crate) struct TreeIo<'a> {
    store: &'a dyn EntityStore,
    codec: &'a dyn EntityCodec,
    config: &'a StoreConfig,
}

impl<'a> TreeIo<'a> {
    pub(crate) fn new(
        store: &'a dyn EntityStore,
        codec: &'a dyn EntityCodec,
        config: &'a StoreConfig,
    ) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    fn load_entity(&self, kind: EntityKind, id: &Id) -> VersionResult<Entity> {
        let bytes = self
            .store
            .get(id)?
            .ok_or(VersionError::MissingEntity { kind, id: *id })?;
        Ok(self.codec.decode(kind, &bytes)?)
    }

    pub(crate) fn load_commit(&self, id: &Id) -> VersionResult<CommitNode> {
        Ok(self.load_entity(EntityKind::Commit, id)?.into_commit()?)
    }

    pub(crate) fn load_metadata(&self, id: &Id) -> VersionResult<CommitMetadata> {
        Ok(self.load_entity(EntityKind::Metadata, id)?.into_metadata()?)
    }

    pub(crate) fn load_fragment(&self, id: &Id) -> VersionResult<Fragment> {
        Ok(self.load_entity(EntityKind::Fragment, id)?.into_fragment()?)
    }

    pub(crate) fn load_index(&self, id: &Id) -> VersionResult<IndexNode> {
        let index = self.load_entity(EntityKind::Index, id)?.into_index()?;
        // A zero-width index cannot route keys; refuse it before the
        // bucket arithmetic can divide by zero.
        if index.bucket_count() == 0 {
            return Err(ModelError::EmptyIndex.into());
        }
        Ok(index)
    }

    /// Persist an entity under its content id. Re-putting an existing
    /// record is a no-op.
    pub(crate) fn store_entity(&self, entity: Entity) -> VersionResult<Id> {
        let id = entity.compute_id()?;
        let bytes = self.codec.encode(&entity)?;
        self.store.put_if_absent(&id, bytes)?;
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Content of `key` under `root`, if present.
    pub(crate) fn lookup(&self, root: TreeRef, key: &Key) -> VersionResult<Option<WithPayload<Id>>> {
        let mut node = root;
        let mut level = 0;
        loop {
            match node {
                TreeRef::Fragment(id) => {
                    return Ok(self.load_fragment(&id)?.get(key).copied());
                }
                TreeRef::Index(id) => {
                    let index = self.load_index(&id)?;
                    match index.child(key.hash_bucket_at(level, index.bucket_count())) {
                        Some(child) => {
                            node = child;
                            level += 1;
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Every entry under `root`, sorted by key.
    pub(crate) fn entries_under(&self, root: TreeRef) -> VersionResult<Vec<KeyEntry>> {
        let mut entries = Vec::new();
        self.collect_entries(root, &mut entries)?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn collect_entries(&self, node: TreeRef, out: &mut Vec<KeyEntry>) -> VersionResult<()> {
        match node {
            TreeRef::Fragment(id) => {
                out.extend(self.load_fragment(&id)?.entries().iter().cloned());
            }
            TreeRef::Index(id) => {
                let index = self.load_index(&id)?;
                let mut leaf_ids = Vec::new();
                for (_, child) in index.children() {
                    match child {
                        TreeRef::Fragment(fragment_id) => leaf_ids.push(fragment_id),
                        TreeRef::Index(_) => self.collect_entries(child, out)?,
                    }
                }
                // All leaves under one index come back in a single
                // round-trip.
                let records = self.store.get_batch(&leaf_ids)?;
                for (fragment_id, record) in leaf_ids.iter().zip(records) {
                    let bytes = record.ok_or(VersionError::MissingEntity {
                        kind: EntityKind::Fragment,
                        id: *fragment_id,
                    })?;
                    let fragment = self.codec.decode(EntityKind::Fragment, &bytes)?.into_fragment()?;
                    out.extend(fragment.entries().iter().cloned());
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rewriting
    // -----------------------------------------------------------------------

    /// Apply a change set to a tree, returning the new root.
    ///
    /// Only buckets named by the change set are rewritten; untouched
    /// siblings keep their existing refs. Every node is persisted before
    /// the node that points at it.
    pub(crate) fn apply_changes(
        &self,
        root: Option<TreeRef>,
        changes: &Changes,
    ) -> VersionResult<TreeRef> {
        match root {
            None => self.build_subtree(puts_only(changes), 1),
            Some(TreeRef::Fragment(id)) => {
                let fragment = self.load_fragment(&id)?;
                self.build_subtree(merge(&fragment, changes), 1)
            }
            Some(TreeRef::Index(id)) => self.rewrite_index(&id, changes, 1),
        }
    }

    /// Rewrite the buckets of an index that `changes` touches.
    ///
    /// Routing uses the loaded node's own width, so trees written under an
    /// older fan-out configuration stay consistent. An index never demotes
    /// back to a fragment, even when every bucket has emptied.
    fn rewrite_index(&self, id: &Id, changes: &Changes, depth: usize) -> VersionResult<TreeRef> {
        let index = self.load_index(id)?;
        let level = depth - 1;

        let mut by_bucket: BTreeMap<usize, Changes> = BTreeMap::new();
        for (key, change) in changes {
            by_bucket
                .entry(key.hash_bucket_at(level, index.bucket_count()))
                .or_default()
                .insert(key.clone(), *change);
        }

        let mut rewritten = index.clone();
        for (bucket, bucket_changes) in by_bucket {
            let child = match index.child(bucket) {
                None => {
                    let entries = puts_only(&bucket_changes);
                    if entries.is_empty() {
                        None
                    } else {
                        Some(self.build_subtree(entries, depth + 1)?)
                    }
                }
                Some(TreeRef::Fragment(fragment_id)) => {
                    let fragment = self.load_fragment(&fragment_id)?;
                    let merged = merge(&fragment, &bucket_changes);
                    if merged.is_empty() {
                        None
                    } else {
                        Some(self.build_subtree(merged, depth + 1)?)
                    }
                }
                Some(TreeRef::Index(child_id)) => {
                    Some(self.rewrite_index(&child_id, &bucket_changes, depth + 1)?)
                }
            };
            rewritten.set_child(bucket, child);
        }

        self.store_entity(Entity::Index(rewritten))
            .map(TreeRef::Index)
    }

    /// Build a subtree holding `entries`, splitting into an index when the
    /// fragment limit is exceeded and depth still allows it.
    fn build_subtree(&self, entries: Vec<KeyEntry>, depth: usize) -> VersionResult<TreeRef> {
        if entries.len() <= self.config.max_fragment_entries {
            return self
                .store_entity(Entity::Fragment(Fragment::new(entries)))
                .map(TreeRef::Fragment);
        }
        if depth >= self.config.max_depth {
            return Err(VersionError::TreeDepthExceeded {
                max_depth: self.config.max_depth,
            });
        }

        debug!(
            entries = entries.len(),
            depth = depth,
            "splitting overflowing fragment into an index"
        );
        let width = self.config.bucket_count;
        let mut groups: Vec<Vec<KeyEntry>> = vec![Vec::new(); width];
        for entry in entries {
            groups[entry.key.hash_bucket_at(depth - 1, width)].push(entry);
        }

        let mut index = IndexNode::empty(width);
        for (bucket, group) in groups.into_iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let child = self.build_subtree(group, depth + 1)?;
            index.set_child(bucket, Some(child));
        }
        self.store_entity(Entity::Index(index)).map(TreeRef::Index)
    }
}

/// Entries for the puts in a change set, in key order.
fn puts_only(changes: &Changes) -> Vec<KeyEntry> {
    changes
        .iter()
        .filter_map(|(key, change)| change.map(|content| KeyEntry::new(key.clone(), content)))
        .collect()
}

/// Fragment entries with a change set folded in, in key order.
fn merge(fragment: &Fragment, changes: &Changes) -> Vec<KeyEntry> {
    let mut entries: BTreeMap<Key, WithPayload<Id>> = fragment
        .entries()
        .iter()
        .map(|entry| (entry.key.clone(), entry.content))
        .collect();
    for (key, change) in changes {
        match change {
            Some(content) => {
                entries.insert(key.clone(), *content);
            }
            None => {
                entries.remove(key);
            }
        }
    }
    entries
        .into_iter()
        .map(|(key, content)| KeyEntry::new(key, content))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
