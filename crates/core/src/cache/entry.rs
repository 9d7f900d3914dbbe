use std::collections::BTreeSet;

use serde_json::Value;

use super::Tag;

/// Lifecycle of a cache entry's latest request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Uninitialized,
    Pending,
    Fulfilled,
    Rejected,
}

/// A single cached query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Arguments the query was called with, as serialized for the key.
    pub args: Value,
    /// Last fulfilled value. Kept while a refetch is pending or after it fails.
    pub data: Option<Value>,
    pub status: QueryStatus,
    pub error: Option<String>,
    /// Set by tag invalidation; the next access refetches.
    pub stale: bool,
    /// Set when an invalidation lands while a request is in flight, so the
    /// result it brings back is stored stale.
    pub invalidated_while_pending: bool,
    pub subscribers: usize,
    pub tags: BTreeSet<Tag>,
}

impl CacheEntry {
    pub fn new(args: Value) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Returns true if the entry can be served without a request.
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Fulfilled && !self.stale && self.data.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// Returns true if any of the entry's tags is hit by invalidating `tag`.
    pub fn carries(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|provided| tag.matches(provided))
    }
}
