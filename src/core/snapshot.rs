//! Repository snapshot data model

use chrono::{DateTime, Utc};

/// Identity of the repository being distilled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub description: String,
}

/// Kind of entry returned by a tree listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
}

/// One entry of a repository tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl PathEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Raw tree as reported by a source
#[derive(Debug, Clone, Default)]
pub struct TreeListing {
    pub entries: Vec<PathEntry>,
    /// Set when the source itself cut the listing short
    pub upstream_truncated: bool,
}

impl TreeListing {
    /// Blob paths in listing order
    pub fn blob_paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Blob)
            .map(|e| e.path.clone())
            .collect()
    }
}

/// Full text of one fetched file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// What the fetch saw and dropped, kept so cached runs report the same counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub tree_entries: usize,
    pub excluded: usize,
    pub eligible: usize,
    pub fetch_failures: usize,
}

/// Everything fetched for one request. Never mutated once built.
#[derive(Debug, Clone)]
pub struct RepoSnapshot {
    pub info: RepoInfo,
    pub tree: Vec<String>,
    pub is_truncated: bool,
    pub readme: String,
    pub dependencies: String,
    pub source_files: Vec<SourceFile>,
    pub fetch_stats: FetchStats,
    pub fetched_at: DateTime<Utc>,
}

impl RepoSnapshot {
    pub fn selected_paths(&self) -> Vec<String> {
        self.source_files.iter().map(|f| f.path.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_paths_skip_trees() {
        let listing = TreeListing {
            entries: vec![
                PathEntry::new("src/main.rs", EntryKind::Blob),
                PathEntry {
                    path: "src".to_string(),
                    kind: EntryKind::Tree,
                },
                PathEntry::new("Cargo.toml", EntryKind::Blob),
            ],
            upstream_truncated: false,
        };
        assert_eq!(listing.blob_paths(), vec!["src/main.rs", "Cargo.toml"]);
    }
}
