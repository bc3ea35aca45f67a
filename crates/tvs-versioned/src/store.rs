//! The versioned store: reference management and the commit protocol.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tvs_model::{CommitMetadata, CommitNode, Entity, EntityCodec};
use tvs_store::EntityStore;
use tvs_types::{Id, Key, WithPayload};

use crate::config::StoreConfig;
use crate::error::{VersionError, VersionResult};
use crate::tree::{Changes, TreeIo};
use crate::types::{KeyConflict, LogEntry, Operation, RefKind, ReferenceInfo, DEFAULT_BRANCH};

/// Version-controlled key space over a pluggable entity store.
///
/// All methods are synchronous and hold no locks across backend calls.
/// Writers race on the single reference swap; a failed swap surfaces as a
/// conflict carrying the fresh tip, and retrying is the caller's decision.
pub struct VersionStore {
    store: Arc<dyn EntityStore>,
    codec: Arc<dyn EntityCodec>,
    config: StoreConfig,
}

impl fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Create a store over a backend and codec. Rejects degenerate
    /// configurations.
    pub fn new(
        store: Arc<dyn EntityStore>,
        codec: Arc<dyn EntityCodec>,
        config: StoreConfig,
    ) -> VersionResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            codec,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn tree(&self) -> TreeIo<'_> {
        TreeIo::new(self.store.as_ref(), self.codec.as_ref(), &self.config)
    }

    /// Resolve a short name, preferring the branch namespace over tags.
    fn resolve(&self, name: &str) -> VersionResult<(RefKind, String, Id)> {
        for kind in [RefKind::Branch, RefKind::Tag] {
            let canonical = kind.canonical_name(name);
            if let Some(target) = self.store.get_reference(&canonical)? {
                return Ok((kind, canonical, target));
            }
        }
        Err(VersionError::ReferenceNotFound(name.to_string()))
    }

    /// The target must be a commit the store already has. The null id is
    /// the empty-branch sentinel and loads nothing.
    fn require_commit(&self, id: &Id) -> VersionResult<()> {
        if !id.is_null() {
            self.tree().load_commit(id)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Ensure the default branch exists, creating it empty when missing.
    /// Returns its current target.
    pub fn initialize(&self) -> VersionResult<Id> {
        match self.create_reference(DEFAULT_BRANCH, RefKind::Branch, None) {
            Ok(target) => Ok(target),
            Err(VersionError::ReferenceAlreadyExists(_)) => {
                Ok(self.get_reference(DEFAULT_BRANCH)?.target)
            }
            Err(err) => Err(err),
        }
    }

    /// Create a branch or tag.
    ///
    /// A branch created without a target starts empty, pointing at the
    /// null id. A tag always needs a commit to point at. Returns the
    /// initial target.
    pub fn create_reference(
        &self,
        name: &str,
        kind: RefKind,
        target: Option<Id>,
    ) -> VersionResult<Id> {
        let target = match (kind, target) {
            (RefKind::Tag, None) => {
                return Err(VersionError::TagTargetRequired(name.to_string()));
            }
            (_, Some(id)) => {
                self.require_commit(&id)?;
                id
            }
            (RefKind::Branch, None) => Id::null(),
        };

        let canonical = kind.canonical_name(name);
        let created = self
            .store
            .compare_and_swap_reference(&canonical, None, &target)?;
        if !created {
            return Err(VersionError::ReferenceAlreadyExists(name.to_string()));
        }
        debug!(reference = %canonical, target = %target.short_hex(), "created reference");
        Ok(target)
    }

    /// Resolve a short name to its reference.
    pub fn get_reference(&self, name: &str) -> VersionResult<ReferenceInfo> {
        let (kind, _, target) = self.resolve(name)?;
        Ok(ReferenceInfo {
            name: name.to_string(),
            kind,
            target,
        })
    }

    /// Every reference, branches before tags, each group sorted by name.
    pub fn list_references(&self) -> VersionResult<Vec<ReferenceInfo>> {
        let mut references = Vec::new();
        for (canonical, target) in self.store.list_references()? {
            // Names outside the two namespaces belong to other tools
            // sharing the backend.
            if let Some((kind, short)) = RefKind::parse(&canonical) {
                references.push(ReferenceInfo {
                    name: short.to_string(),
                    kind,
                    target,
                });
            }
        }
        Ok(references)
    }

    /// Move a reference to an existing commit.
    ///
    /// `expected = None` means "from wherever it is now"; the swap is
    /// still atomic against the value read here. Tags only move when the
    /// store is configured with reassignable tags.
    pub fn assign_reference(
        &self,
        name: &str,
        expected: Option<Id>,
        target: Id,
    ) -> VersionResult<()> {
        let (kind, canonical, current) = self.resolve(name)?;
        if kind == RefKind::Tag && !self.config.tags_reassignable {
            return Err(VersionError::TagImmutable(name.to_string()));
        }
        if let Some(expected) = expected {
            if current != expected {
                return Err(VersionError::ReferenceConflict {
                    name: name.to_string(),
                    expected: Some(expected),
                    current: Some(current),
                });
            }
        }
        self.require_commit(&target)?;

        let swapped = self
            .store
            .compare_and_swap_reference(&canonical, Some(&current), &target)?;
        if !swapped {
            let fresh = self.store.get_reference(&canonical)?;
            return Err(VersionError::ReferenceConflict {
                name: name.to_string(),
                expected: Some(current),
                current: fresh,
            });
        }
        debug!(reference = %canonical, target = %target.short_hex(), "assigned reference");
        Ok(())
    }

    /// Delete a reference while it still points at `expected`.
    ///
    /// Deletion is allowed for immutable tags as well; immutability
    /// prevents moving a tag, not retiring it.
    pub fn delete_reference(&self, name: &str, expected: Id) -> VersionResult<()> {
        let (_, canonical, current) = self.resolve(name)?;
        if current != expected {
            return Err(VersionError::ReferenceConflict {
                name: name.to_string(),
                expected: Some(expected),
                current: Some(current),
            });
        }
        let deleted = self.store.delete_reference(&canonical, &expected)?;
        if !deleted {
            let fresh = self.store.get_reference(&canonical)?;
            return Err(VersionError::ReferenceConflict {
                name: name.to_string(),
                expected: Some(expected),
                current: fresh,
            });
        }
        debug!(reference = %canonical, "deleted reference");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Commit a set of operations to a branch, advancing it atomically.
    ///
    /// The protocol: read the tip; verify the caller's expectation before
    /// any tree work; check per-key expectations against the tip tree,
    /// collecting every stale key; rewrite only the affected buckets;
    /// persist children before parents; swap the reference. A failed
    /// swap reports the freshly read tip and never retries. Tree nodes
    /// persisted before a failed swap stay behind as unreferenced
    /// records for garbage collection to reclaim.
    pub fn commit(
        &self,
        branch: &str,
        expected: Option<Id>,
        metadata: CommitMetadata,
        operations: Vec<Operation>,
    ) -> VersionResult<Id> {
        let canonical = RefKind::Branch.canonical_name(branch);
        let tree = self.tree();

        let tip = self
            .store
            .get_reference(&canonical)?
            .ok_or_else(|| VersionError::ReferenceNotFound(branch.to_string()))?;

        // Cheap precheck before any tree work.
        if let Some(expected) = expected {
            if tip != expected {
                return Err(VersionError::ReferenceConflict {
                    name: branch.to_string(),
                    expected: Some(expected),
                    current: Some(tip),
                });
            }
        }

        // One commit speaks about each key at most once.
        let mut changes = Changes::new();
        for operation in &operations {
            let change = match operation {
                Operation::Put { content, .. } => Some(*content),
                Operation::Delete { .. } => None,
            };
            if changes.insert(operation.key().clone(), change).is_some() {
                return Err(VersionError::DuplicateKey(operation.key().clone()));
            }
        }

        let parent = (!tip.is_null()).then_some(tip);
        let root = match parent {
            Some(id) => Some(tree.load_commit(&id)?.tree),
            None => None,
        };

        // Per-key expectations, collected so the caller sees every stale
        // key at once.
        let mut conflicts = Vec::new();
        for operation in &operations {
            if let Some(expected) = operation.expected() {
                let current = match root {
                    Some(root) => tree.lookup(root, operation.key())?.map(|found| found.value),
                    None => None,
                };
                if current != Some(expected) {
                    conflicts.push(KeyConflict {
                        key: operation.key().clone(),
                        expected: Some(expected),
                        current,
                    });
                }
            }
        }
        if !conflicts.is_empty() {
            return Err(VersionError::ValueConflict(conflicts));
        }

        let new_root = tree.apply_changes(root, &changes)?;
        let metadata_id = tree.store_entity(Entity::Metadata(metadata))?;
        let commit_id = tree.store_entity(Entity::Commit(CommitNode {
            parent,
            metadata: metadata_id,
            tree: new_root,
            mutations: operations.iter().map(Operation::to_mutation).collect(),
        }))?;

        // The single ordering point.
        let swapped = self
            .store
            .compare_and_swap_reference(&canonical, Some(&tip), &commit_id)?;
        if !swapped {
            let fresh = self.store.get_reference(&canonical)?;
            return Err(VersionError::ReferenceConflict {
                name: branch.to_string(),
                expected: Some(tip),
                current: fresh,
            });
        }

        debug!(
            branch = branch,
            commit = %commit_id.short_hex(),
            operations = operations.len(),
            "committed"
        );
        Ok(commit_id)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Content of `key` as of commit `at`. The null id reads as empty.
    pub fn value_of(&self, at: Id, key: &Key) -> VersionResult<Option<WithPayload<Id>>> {
        if at.is_null() {
            return Ok(None);
        }
        let tree = self.tree();
        let commit = tree.load_commit(&at)?;
        tree.lookup(commit.tree, key)
    }

    /// Every key as of commit `at`, sorted, each carrying its payload tag.
    pub fn keys_at(&self, at: Id) -> VersionResult<Vec<WithPayload<Key>>> {
        if at.is_null() {
            return Ok(Vec::new());
        }
        let tree = self.tree();
        let commit = tree.load_commit(&at)?;
        let entries = tree.entries_under(commit.tree)?;
        Ok(entries
            .into_iter()
            .map(|entry| WithPayload::new(entry.content.payload, entry.key))
            .collect())
    }

    /// Walk the history from `from` toward the first commit, newest
    /// first, stopping after `limit` entries when given.
    pub fn log(&self, from: Id, limit: Option<usize>) -> VersionResult<Vec<LogEntry>> {
        let tree = self.tree();
        let mut entries = Vec::new();
        let mut cursor = (!from.is_null()).then_some(from);
        while let Some(id) = cursor {
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }
            let commit = tree.load_commit(&id)?;
            let metadata = tree.load_metadata(&commit.metadata)?;
            entries.push(LogEntry {
                id,
                metadata,
                mutations: commit.mutations,
            });
            cursor = commit.parent;
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use tvs_model::{Mutation, TreeRef};
    use tvs_store::{DocumentCodec, InMemoryEntityStore, StoreError};
    use tvs_types::Payload;

    fn key(path: &str) -> Key {
        Key::from_path(path).unwrap()
    }

    fn oid(byte: u8) -> Id {
        Id::from([byte; 32])
    }

    fn content(byte: u8) -> WithPayload<Id> {
        WithPayload::untagged(oid(byte))
    }

    fn meta(message: &str) -> CommitMetadata {
        CommitMetadata::new("alice", message)
    }

    fn fixture_with(config: StoreConfig) -> VersionStore {
        VersionStore::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(DocumentCodec),
            config,
        )
        .unwrap()
    }

    fn fixture() -> VersionStore {
        fixture_with(StoreConfig::default())
    }

    /// Fixture with one branch and one commit putting `tables/t1`.
    fn fixture_with_commit() -> (VersionStore, Id) {
        let vs = fixture();
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        let c1 = vs
            .commit(
                "main",
                Some(Id::null()),
                meta("create t1"),
                vec![Operation::put(key("tables/t1"), content(1))],
            )
            .unwrap();
        (vs, c1)
    }

    // -----------------------------------------------------------------------
    // Branch lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn fresh_branch_commit_and_read_back() {
        let vs = fixture();
        let initial = vs.create_reference("main", RefKind::Branch, None).unwrap();
        assert!(initial.is_null());

        let c1 = vs
            .commit(
                "main",
                Some(Id::null()),
                meta("create t1"),
                vec![Operation::put(key("tables/t1"), content(1))],
            )
            .unwrap();

        assert_eq!(vs.get_reference("main").unwrap().target, c1);
        assert_eq!(
            vs.value_of(c1, &key("tables/t1")).unwrap(),
            Some(content(1))
        );
        assert_eq!(vs.value_of(c1, &key("tables/t2")).unwrap(), None);
    }

    #[test]
    fn initialize_is_idempotent() {
        let vs = fixture();
        assert!(vs.initialize().unwrap().is_null());
        let c1 = vs
            .commit(
                DEFAULT_BRANCH,
                None,
                meta("seed"),
                vec![Operation::put(key("tables/t1"), content(1))],
            )
            .unwrap();
        assert_eq!(vs.initialize().unwrap(), c1);
    }

    #[test]
    fn commit_requires_an_existing_branch() {
        let vs = fixture();
        assert_eq!(
            vs.commit("nope", None, meta("x"), vec![]).unwrap_err(),
            VersionError::ReferenceNotFound("nope".to_string())
        );
    }

    #[test]
    fn commit_targets_branches_only() {
        let (vs, c1) = fixture_with_commit();
        vs.create_reference("v1", RefKind::Tag, Some(c1)).unwrap();
        assert_eq!(
            vs.commit("v1", None, meta("x"), vec![]).unwrap_err(),
            VersionError::ReferenceNotFound("v1".to_string())
        );
    }

    #[test]
    fn duplicate_reference_rejected() {
        let vs = fixture();
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        assert_eq!(
            vs.create_reference("main", RefKind::Branch, None)
                .unwrap_err(),
            VersionError::ReferenceAlreadyExists("main".to_string())
        );
    }

    #[test]
    fn invalid_reference_name_rejected() {
        let vs = fixture();
        let err = vs
            .create_reference("bad..name", RefKind::Branch, None)
            .unwrap_err();
        assert!(matches!(
            err,
            VersionError::Store(StoreError::InvalidReference { .. })
        ));
    }

    #[test]
    fn history_records_parentage() {
        let (vs, c1) = fixture_with_commit();
        let c2 = vs
            .commit(
                "main",
                Some(c1),
                meta("add t2"),
                vec![Operation::put(key("tables/t2"), content(2))],
            )
            .unwrap();

        let io = vs.tree();
        assert_eq!(io.load_commit(&c1).unwrap().parent, None);
        assert_eq!(io.load_commit(&c2).unwrap().parent, Some(c1));
    }

    #[test]
    fn empty_commit_advances_history() {
        let (vs, c1) = fixture_with_commit();
        let c2 = vs.commit("main", Some(c1), meta("note"), vec![]).unwrap();
        assert_ne!(c2, c1);
        assert_eq!(vs.get_reference("main").unwrap().target, c2);
        assert_eq!(
            vs.value_of(c2, &key("tables/t1")).unwrap(),
            Some(content(1))
        );
    }

    // -----------------------------------------------------------------------
    // Conflicts
    // -----------------------------------------------------------------------

    #[test]
    fn stale_reference_expectation_is_a_conflict() {
        let (vs, c1) = fixture_with_commit();
        let err = vs
            .commit(
                "main",
                Some(Id::null()),
                meta("late"),
                vec![Operation::put(key("tables/t9"), content(9))],
            )
            .unwrap_err();
        assert_eq!(
            err,
            VersionError::ReferenceConflict {
                name: "main".to_string(),
                expected: Some(Id::null()),
                current: Some(c1),
            }
        );
    }

    #[test]
    fn per_key_conflicts_are_collected() {
        let vs = fixture();
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        vs.commit(
            "main",
            None,
            meta("seed"),
            vec![
                Operation::put(key("a"), content(1)),
                Operation::put(key("b"), content(2)),
            ],
        )
        .unwrap();

        let err = vs
            .commit(
                "main",
                None,
                meta("stale"),
                vec![
                    Operation::put_expecting(key("a"), content(10), oid(9)),
                    Operation::delete_expecting(key("b"), oid(8)),
                    Operation::put_expecting(key("c"), content(11), oid(7)),
                ],
            )
            .unwrap_err();

        assert_eq!(
            err,
            VersionError::ValueConflict(vec![
                KeyConflict {
                    key: key("a"),
                    expected: Some(oid(9)),
                    current: Some(oid(1)),
                },
                KeyConflict {
                    key: key("b"),
                    expected: Some(oid(8)),
                    current: Some(oid(2)),
                },
                KeyConflict {
                    key: key("c"),
                    expected: Some(oid(7)),
                    current: None,
                },
            ])
        );
    }

    #[test]
    fn satisfied_per_key_expectations_commit() {
        let (vs, c1) = fixture_with_commit();
        let c2 = vs
            .commit(
                "main",
                Some(c1),
                meta("update t1"),
                vec![Operation::put_expecting(
                    key("tables/t1"),
                    content(2),
                    oid(1),
                )],
            )
            .unwrap();
        assert_eq!(
            vs.value_of(c2, &key("tables/t1")).unwrap(),
            Some(content(2))
        );
    }

    #[test]
    fn duplicate_key_in_one_commit_rejected() {
        let (vs, _c1) = fixture_with_commit();
        let err = vs
            .commit(
                "main",
                None,
                meta("dup"),
                vec![
                    Operation::put(key("x"), content(1)),
                    Operation::delete(key("x")),
                ],
            )
            .unwrap_err();
        assert_eq!(err, VersionError::DuplicateKey(key("x")));
    }

    #[test]
    fn racing_committers_converge_by_retrying() {
        let vs = Arc::new(fixture());
        vs.create_reference("main", RefKind::Branch, None).unwrap();

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let vs = Arc::clone(&vs);
                thread::spawn(move || {
                    let k = key(&format!("tables/t{i}"));
                    loop {
                        let result = vs.commit(
                            "main",
                            None,
                            CommitMetadata::new("bot", format!("add t{i}")),
                            vec![Operation::put(k.clone(), content(i + 1))],
                        );
                        match result {
                            Ok(id) => return id,
                            Err(VersionError::ReferenceConflict { .. }) => continue,
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("committer panicked");
        }

        let tip = vs.get_reference("main").unwrap().target;
        assert_eq!(vs.keys_at(tip).unwrap().len(), 4);
        assert_eq!(vs.log(tip, None).unwrap().len(), 4);
    }

    // -----------------------------------------------------------------------
    // Log
    // -----------------------------------------------------------------------

    #[test]
    fn log_walks_newest_first() {
        let (vs, c1) = fixture_with_commit();
        let c2 = vs
            .commit(
                "main",
                Some(c1),
                meta("add t2"),
                vec![Operation::put(key("tables/t2"), content(2))],
            )
            .unwrap();
        let c3 = vs
            .commit(
                "main",
                Some(c2),
                meta("drop t1"),
                vec![Operation::delete(key("tables/t1"))],
            )
            .unwrap();

        let history = vs.log(c3, None).unwrap();
        assert_eq!(
            history.iter().map(|entry| entry.id).collect::<Vec<_>>(),
            vec![c3, c2, c1]
        );
        assert_eq!(
            history[0].mutations,
            vec![Mutation::Delete {
                key: key("tables/t1")
            }]
        );
        assert_eq!(history[2].metadata.message, "create t1");

        let limited = vs.log(c3, Some(2)).unwrap();
        assert_eq!(
            limited.iter().map(|entry| entry.id).collect::<Vec<_>>(),
            vec![c3, c2]
        );
    }

    #[test]
    fn metadata_round_trips_through_commits() {
        let vs = fixture();
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        let annotated = CommitMetadata::new("carol", "import")
            .with_property("job-id", "1234")
            .with_property("source", "etl");
        let c1 = vs
            .commit(
                "main",
                None,
                annotated,
                vec![Operation::put(key("tables/t1"), content(1))],
            )
            .unwrap();

        let history = vs.log(c1, None).unwrap();
        let metadata = &history[0].metadata;
        assert_eq!(metadata.author, "carol");
        assert_eq!(metadata.message, "import");
        assert_eq!(metadata.properties["job-id"], "1234");
        assert_eq!(metadata.properties["source"], "etl");
        assert!(metadata.timestamp_ms > 0);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[test]
    fn reads_at_the_null_id_are_empty() {
        let vs = fixture();
        assert_eq!(vs.value_of(Id::null(), &key("a")).unwrap(), None);
        assert!(vs.keys_at(Id::null()).unwrap().is_empty());
        assert!(vs.log(Id::null(), None).unwrap().is_empty());
    }

    #[test]
    fn old_commits_stay_readable() {
        let (vs, c1) = fixture_with_commit();
        let c2 = vs
            .commit(
                "main",
                Some(c1),
                meta("update t1"),
                vec![Operation::put(key("tables/t1"), content(2))],
            )
            .unwrap();

        assert_eq!(
            vs.value_of(c1, &key("tables/t1")).unwrap(),
            Some(content(1))
        );
        assert_eq!(
            vs.value_of(c2, &key("tables/t1")).unwrap(),
            Some(content(2))
        );
    }

    #[test]
    fn keys_at_enumerates_sorted_with_payloads() {
        let vs = fixture();
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        let c1 = vs
            .commit(
                "main",
                None,
                meta("seed"),
                vec![
                    Operation::put(key("tables/b"), WithPayload::new(Payload::new(2), oid(2))),
                    Operation::put(key("tables/a"), WithPayload::new(Payload::new(1), oid(1))),
                ],
            )
            .unwrap();

        let keys = vs.keys_at(c1).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].value, key("tables/a"));
        assert_eq!(keys[0].payload, Payload::new(1));
        assert_eq!(keys[1].value, key("tables/b"));
        assert_eq!(keys[1].payload, Payload::new(2));
    }

    #[test]
    fn large_commits_split_and_stay_readable() {
        let vs = fixture_with(StoreConfig {
            bucket_count: 8,
            max_fragment_entries: 4,
            max_depth: 6,
            tags_reassignable: false,
        });
        vs.create_reference("main", RefKind::Branch, None).unwrap();

        let operations: Vec<Operation> = (0..20u8)
            .map(|i| Operation::put(key(&format!("tables/t{i}")), content(i + 1)))
            .collect();
        let c1 = vs.commit("main", None, meta("bulk load"), operations).unwrap();

        assert!(matches!(
            vs.tree().load_commit(&c1).unwrap().tree,
            TreeRef::Index(_)
        ));
        for i in 0..20u8 {
            assert_eq!(
                vs.value_of(c1, &key(&format!("tables/t{i}"))).unwrap(),
                Some(content(i + 1))
            );
        }
        assert_eq!(vs.keys_at(c1).unwrap().len(), 20);

        let c2 = vs
            .commit(
                "main",
                Some(c1),
                meta("touch one"),
                vec![Operation::put(key("tables/t3"), content(99))],
            )
            .unwrap();
        assert_eq!(
            vs.value_of(c2, &key("tables/t3")).unwrap(),
            Some(content(99))
        );
        assert_eq!(
            vs.value_of(c2, &key("tables/t4")).unwrap(),
            Some(content(5))
        );
        assert_eq!(vs.keys_at(c2).unwrap().len(), 20);
    }

    // -----------------------------------------------------------------------
    // Tags and assignment
    // -----------------------------------------------------------------------

    #[test]
    fn tag_requires_a_target() {
        let vs = fixture();
        assert_eq!(
            vs.create_reference("v1", RefKind::Tag, None).unwrap_err(),
            VersionError::TagTargetRequired("v1".to_string())
        );
    }

    #[test]
    fn tag_target_must_exist() {
        let vs = fixture();
        let err = vs
            .create_reference("v1", RefKind::Tag, Some(oid(5)))
            .unwrap_err();
        assert!(matches!(err, VersionError::MissingEntity { .. }));
    }

    #[test]
    fn tags_are_immutable_by_default() {
        let (vs, c1) = fixture_with_commit();
        vs.create_reference("v1", RefKind::Tag, Some(c1)).unwrap();
        let c2 = vs.commit("main", Some(c1), meta("more"), vec![]).unwrap();

        assert_eq!(
            vs.assign_reference("v1", None, c2).unwrap_err(),
            VersionError::TagImmutable("v1".to_string())
        );

        // Retiring a tag is still allowed.
        vs.delete_reference("v1", c1).unwrap();
        assert_eq!(
            vs.get_reference("v1").unwrap_err(),
            VersionError::ReferenceNotFound("v1".to_string())
        );
    }

    #[test]
    fn tags_move_when_policy_allows() {
        let vs = fixture_with(StoreConfig::with_mutable_tags());
        vs.create_reference("main", RefKind::Branch, None).unwrap();
        let c1 = vs
            .commit(
                "main",
                None,
                meta("one"),
                vec![Operation::put(key("a"), content(1))],
            )
            .unwrap();
        let c2 = vs.commit("main", Some(c1), meta("two"), vec![]).unwrap();

        vs.create_reference("v1", RefKind::Tag, Some(c1)).unwrap();
        vs.assign_reference("v1", Some(c1), c2).unwrap();
        assert_eq!(vs.get_reference("v1").unwrap().target, c2);
    }

    #[test]
    fn branches_move_with_expectation_checks() {
        let (vs, c1) = fixture_with_commit();
        vs.create_reference("dev", RefKind::Branch, None).unwrap();

        vs.assign_reference("dev", Some(Id::null()), c1).unwrap();
        assert_eq!(vs.get_reference("dev").unwrap().target, c1);

        let err = vs.assign_reference("dev", Some(Id::null()), c1).unwrap_err();
        assert_eq!(
            err,
            VersionError::ReferenceConflict {
                name: "dev".to_string(),
                expected: Some(Id::null()),
                current: Some(c1),
            }
        );
    }

    #[test]
    fn assignment_target_must_exist() {
        let (vs, _c1) = fixture_with_commit();
        let err = vs.assign_reference("main", None, oid(9)).unwrap_err();
        assert!(matches!(err, VersionError::MissingEntity { .. }));
    }

    #[test]
    fn delete_requires_the_expected_tip() {
        let (vs, c1) = fixture_with_commit();
        let err = vs.delete_reference("main", Id::null()).unwrap_err();
        assert_eq!(
            err,
            VersionError::ReferenceConflict {
                name: "main".to_string(),
                expected: Some(Id::null()),
                current: Some(c1),
            }
        );

        vs.delete_reference("main", c1).unwrap();
        assert_eq!(
            vs.get_reference("main").unwrap_err(),
            VersionError::ReferenceNotFound("main".to_string())
        );
    }

    #[test]
    fn list_is_grouped_and_sorted() {
        let (vs, c1) = fixture_with_commit();
        vs.create_reference("beta", RefKind::Branch, None).unwrap();
        vs.create_reference("alpha", RefKind::Branch, None).unwrap();
        vs.create_reference("v2", RefKind::Tag, Some(c1)).unwrap();
        vs.create_reference("v1", RefKind::Tag, Some(c1)).unwrap();

        let listed: Vec<(String, RefKind)> = vs
            .list_references()
            .unwrap()
            .into_iter()
            .map(|reference| (reference.name, reference.kind))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("alpha".to_string(), RefKind::Branch),
                ("beta".to_string(), RefKind::Branch),
                ("main".to_string(), RefKind::Branch),
                ("v1".to_string(), RefKind::Tag),
                ("v2".to_string(), RefKind::Tag),
            ]
        );
    }

    #[test]
    fn branch_shadows_tag_on_name_resolution() {
        let (vs, c1) = fixture_with_commit();
        vs.create_reference("shared", RefKind::Tag, Some(c1)).unwrap();
        vs.create_reference("shared", RefKind::Branch, None).unwrap();
        assert_eq!(vs.get_reference("shared").unwrap().kind, RefKind::Branch);
    }
}
