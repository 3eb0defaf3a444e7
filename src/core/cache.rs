//! Most-recent snapshot cache
//!
//! Holds at most one snapshot, keyed by the parameters that produced it.
//! Owned by the caller; nothing here is global.

use std::sync::Arc;

use super::snapshot::RepoSnapshot;

/// Request parameters that determine snapshot contents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub target: String,
    pub branch: Option<String>,
    pub max_files: usize,
    pub tree_cap: usize,
}

/// Single-slot snapshot cache
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entry: Option<(SnapshotKey, Arc<RepoSnapshot>)>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot for `key`, if it is the most recent one
    pub fn get(&self, key: &SnapshotKey) -> Option<Arc<RepoSnapshot>> {
        match &self.entry {
            Some((cached, snapshot)) if cached == key => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    /// Replace whatever was cached
    pub fn put(&mut self, key: SnapshotKey, snapshot: Arc<RepoSnapshot>) {
        self.entry = Some((key, snapshot));
    }

    /// Drop the cached snapshot so the next run refetches
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
