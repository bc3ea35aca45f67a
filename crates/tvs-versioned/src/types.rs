use std::fmt;

use serde::{Deserialize, Serialize};
use tvs_model::{CommitMetadata, Mutation};
use tvs_types::{Id, Key, WithPayload};

/// Branch every new store starts from by convention.
pub const DEFAULT_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// The two reference kinds, distinguished by canonical-name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Branch,
    Tag,
}

impl RefKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Branch => "refs/heads/",
            Self::Tag => "refs/tags/",
        }
    }

    /// Canonical stored name for a short reference name.
    pub fn canonical_name(self, short: &str) -> String {
        format!("{}{}", self.prefix(), short)
    }

    /// Split a canonical name back into kind and short name.
    ///
    /// Names outside the two namespaces return `None`; they belong to
    /// other tools sharing the backend.
    pub fn parse(canonical: &str) -> Option<(RefKind, &str)> {
        if let Some(short) = canonical.strip_prefix(Self::Branch.prefix()) {
            Some((Self::Branch, short))
        } else {
            canonical
                .strip_prefix(Self::Tag.prefix())
                .map(|short| (Self::Tag, short))
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// A reference with its resolved target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    /// Short name, without the `refs/...` prefix.
    pub name: String,
    pub kind: RefKind,
    /// Target commit; the null id for a branch with no commits yet.
    pub target: Id,
}

// ---------------------------------------------------------------------------
// Commit operations
// ---------------------------------------------------------------------------

/// One requested change to one key, with an optional optimistic check.
///
/// The `expected` field is the caller's claim about the content id the key
/// currently maps to. When set, the commit fails with a value conflict
/// unless the claim still holds at the branch tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Put {
        key: Key,
        content: WithPayload<Id>,
        expected: Option<Id>,
    },
    Delete {
        key: Key,
        expected: Option<Id>,
    },
}

impl Operation {
    /// Unconditional put.
    pub fn put(key: Key, content: WithPayload<Id>) -> Self {
        Self::Put {
            key,
            content,
            expected: None,
        }
    }

    /// Put that fails unless the key currently maps to `expected`.
    pub fn put_expecting(key: Key, content: WithPayload<Id>, expected: Id) -> Self {
        Self::Put {
            key,
            content,
            expected: Some(expected),
        }
    }

    /// Unconditional delete. Deleting an absent key is a no-op.
    pub fn delete(key: Key) -> Self {
        Self::Delete {
            key,
            expected: None,
        }
    }

    /// Delete that fails unless the key currently maps to `expected`.
    pub fn delete_expecting(key: Key, expected: Id) -> Self {
        Self::Delete {
            key,
            expected: Some(expected),
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    pub fn expected(&self) -> Option<Id> {
        match self {
            Self::Put { expected, .. } | Self::Delete { expected, .. } => *expected,
        }
    }

    /// The stored form of this operation, with the expectation stripped.
    pub fn to_mutation(&self) -> Mutation {
        match self {
            Self::Put { key, content, .. } => Mutation::Put {
                key: key.clone(),
                content: *content,
            },
            Self::Delete { key, .. } => Mutation::Delete { key: key.clone() },
        }
    }
}

/// A stale per-key expectation, reported with the state that was actually
/// found at the branch tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: Key,
    /// Content id the caller expected; `None` means "expected absent".
    pub expected: Option<Id>,
    /// Content id found at the tip; `None` means the key is absent.
    pub current: Option<Id>,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// One commit as seen by the log reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Id,
    pub metadata: CommitMetadata,
    /// The deltas recorded by this commit, expectations stripped.
    pub mutations: Vec<Mutation>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
