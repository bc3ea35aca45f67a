use serde::{Deserialize, Serialize};

use crate::error::{VersionError, VersionResult};

/// Tree-shape and policy settings for a version store.
///
/// The shape fields apply to nodes written by this store. Stored nodes
/// carry their own fan-out width, so trees written under an older
/// configuration stay readable after a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Fan-out width of index nodes created by this store.
    pub bucket_count: usize,
    /// Entries a fragment may hold before it is split into an index.
    pub max_fragment_entries: usize,
    /// Maximum tree tiers below a commit. A value of 1 permits a lone
    /// fragment; each further tier adds one level of index nodes.
    pub max_depth: usize,
    /// When `true`, tags can be reassigned after creation.
    pub tags_reassignable: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket_count: 32,
            max_fragment_entries: 128,
            max_depth: 2,
            tags_reassignable: false,
        }
    }
}

impl StoreConfig {
    /// Defaults with reassignable tags.
    pub fn with_mutable_tags() -> Self {
        Self {
            tags_reassignable: true,
            ..Default::default()
        }
    }

    /// Reject shapes the commit algorithm cannot split against.
    pub fn validate(&self) -> VersionResult<()> {
        if self.bucket_count < 2 {
            return Err(VersionError::InvalidConfig(format!(
                "bucket_count must be at least 2, got {}",
                self.bucket_count
            )));
        }
        if self.max_fragment_entries == 0 {
            return Err(VersionError::InvalidConfig(
                "max_fragment_entries must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(VersionError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
