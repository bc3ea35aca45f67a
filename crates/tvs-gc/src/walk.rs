//! Reachability walk over the commit graph.
//!
//! Starting from the reference targets, every commit and its metadata stay
//! reachable for the whole parent chain; history must survive collection.
//! Trees are heavier, so a commit's tree is only expanded when the commit
//! is itself a root or its metadata timestamp is at or after the caller's
//! boundary. Anything the walk does not reach is a candidate for deletion,
//! which stays the caller's job.

use std::collections::HashSet;

use tracing::debug;
use tvs_model::{CommitMetadata, CommitNode, Entity, EntityCodec, EntityKind, TreeRef};
use tvs_store::EntityStore;
use tvs_types::Id;

use crate::error::{GcError, GcResult};

/// Outcome of a reachability walk.
#[derive(Debug, Clone)]
pub struct ReachabilityReport {
    reachable: HashSet<Id>,
    /// Distinct commits the walk visited.
    pub commits_visited: usize,
    /// Trees opened because their commit was a root or young enough.
    pub trees_expanded: usize,
}

impl ReachabilityReport {
    pub fn contains(&self, id: &Id) -> bool {
        self.reachable.contains(id)
    }

    pub fn reachable(&self) -> &HashSet<Id> {
        &self.reachable
    }

    pub fn len(&self) -> usize {
        self.reachable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reachable.is_empty()
    }
}

/// Walk the graph from `roots` and report every reachable record id.
///
/// `roots` are reference targets; null ids (empty branches) are skipped.
/// `boundary_ms` is the metadata timestamp at or above which a non-root
/// commit's tree is still expanded.
pub fn collect_reachable(
    store: &dyn EntityStore,
    codec: &dyn EntityCodec,
    roots: &[Id],
    boundary_ms: u64,
) -> GcResult<ReachabilityReport> {
    let mut walk = Walk {
        store,
        codec,
        reachable: HashSet::new(),
        visited: HashSet::new(),
        expanded: HashSet::new(),
        commits_visited: 0,
        trees_expanded: 0,
    };
    for root in roots {
        walk.walk_chain(*root, boundary_ms)?;
    }
    debug!(
        roots = roots.len(),
        commits = walk.commits_visited,
        trees = walk.trees_expanded,
        reachable = walk.reachable.len(),
        "reachability walk finished"
    );
    Ok(ReachabilityReport {
        reachable: walk.reachable,
        commits_visited: walk.commits_visited,
        trees_expanded: walk.trees_expanded,
    })
}

struct Walk<'a> {
    store: &'a dyn EntityStore,
    codec: &'a dyn EntityCodec,
    reachable: HashSet<Id>,
    /// Commits whose chain has been walked.
    visited: HashSet<Id>,
    /// Commits whose tree has been opened.
    expanded: HashSet<Id>,
    commits_visited: usize,
    trees_expanded: usize,
}

impl Walk<'_> {
    fn walk_chain(&mut self, root: Id, boundary_ms: u64) -> GcResult<()> {
        if root.is_null() {
            return Ok(());
        }
        let mut cursor = root;
        let mut is_root = true;
        loop {
            if self.visited.contains(&cursor) {
                // The chain above is already covered, but a root still
                // forces its tree open.
                if is_root && !self.expanded.contains(&cursor) {
                    let commit = self.load_commit(&cursor)?;
                    self.expand_tree(commit.tree)?;
                    self.expanded.insert(cursor);
                    self.trees_expanded += 1;
                }
                return Ok(());
            }
            self.visited.insert(cursor);
            self.commits_visited += 1;

            let commit = self.load_commit(&cursor)?;
            self.reachable.insert(cursor);
            self.reachable.insert(commit.metadata);
            let metadata = self.load_metadata(&commit.metadata)?;

            if is_root || metadata.timestamp_ms >= boundary_ms {
                self.expand_tree(commit.tree)?;
                self.expanded.insert(cursor);
                self.trees_expanded += 1;
            }

            match commit.parent {
                Some(parent) => {
                    cursor = parent;
                    is_root = false;
                }
                None => return Ok(()),
            }
        }
    }

    /// Mark a tree node and everything below it. Shared subtrees are
    /// walked once.
    fn expand_tree(&mut self, node: TreeRef) -> GcResult<()> {
        if !self.reachable.insert(node.id()) {
            return Ok(());
        }
        if let TreeRef::Index(id) = node {
            let index = self
                .load_entity(EntityKind::Index, &id)?
                .into_index()?;
            for (_, child) in index.children() {
                self.expand_tree(child)?;
            }
        }
        Ok(())
    }

    fn load_entity(&self, kind: EntityKind, id: &Id) -> GcResult<Entity> {
        let bytes = self
            .store
            .get(id)?
            .ok_or(GcError::MissingEntity { kind, id: *id })?;
        Ok(self.codec.decode(kind, &bytes)?)
    }

    fn load_commit(&self, id: &Id) -> GcResult<CommitNode> {
        Ok(self.load_entity(EntityKind::Commit, id)?.into_commit()?)
    }

    fn load_metadata(&self, id: &Id) -> GcResult<CommitMetadata> {
        Ok(self.load_entity(EntityKind::Metadata, id)?.into_metadata()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
