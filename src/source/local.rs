//! Local checkout backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use ignore::gitignore::Gitignore;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::RepoSource;
use crate::core::filter::PathFilter;
use crate::core::snapshot::{EntryKind, PathEntry, RepoInfo, TreeListing};

/// Editor folders skipped during the walk
const EDITOR_DIRS: &[&str] = &[".idea", ".vscode"];

/// Repository on the local filesystem
pub struct LocalSource {
    root: PathBuf,
    max_file_size: u64,
    filter: PathFilter,
}

impl LocalSource {
    pub fn new(root: &Path, max_file_size_kb: u64) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Invalid path: {}", root.display()))?;

        Ok(Self {
            root,
            max_file_size: max_file_size_kb.saturating_mul(1024),
            filter: PathFilter::local(),
        })
    }

    /// Walk the root and return `/`-separated relative paths
    fn collect_entries(&self) -> Result<Vec<PathEntry>> {
        let gitignore_path = self.root.join(".gitignore");
        let gitignore = if gitignore_path.exists() {
            Gitignore::new(&gitignore_path).0
        } else {
            Gitignore::empty()
        };

        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy().into_owned();
                let is_dir = e.file_type().is_dir();

                if is_dir
                    && (self.filter.is_excluded_dir_name(&name)
                        || EDITOR_DIRS.contains(&name.as_str()))
                {
                    return false;
                }

                !gitignore.matched(e.path(), is_dir).is_ignore()
            })
        {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(r) => relative_path(r),
                Err(_) => continue,
            };
            let kind = if entry.file_type().is_dir() {
                EntryKind::Tree
            } else if entry.file_type().is_file() {
                EntryKind::Blob
            } else {
                continue;
            };

            entries.push(PathEntry::new(relative, kind));
        }

        Ok(entries)
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let candidate = self.root.join(path);
        // reject anything escaping the root via `..`
        let canonical = candidate.canonicalize().ok()?;
        canonical.starts_with(&self.root).then_some(canonical)
    }
}

#[async_trait]
impl RepoSource for LocalSource {
    async fn describe(&self) -> Result<RepoInfo> {
        let repo = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());

        Ok(RepoInfo {
            owner: "local".to_string(),
            repo,
            branch: current_branch(&self.root).unwrap_or_else(|| "local".to_string()),
            description: format!("Local repository at {}", self.root.display()),
        })
    }

    async fn list_tree(&self) -> Result<TreeListing> {
        Ok(TreeListing {
            entries: self.collect_entries()?,
            upstream_truncated: false,
        })
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let Some(full_path) = self.resolve(path) else {
            return Ok(None);
        };

        let metadata = tokio::fs::metadata(&full_path)
            .await
            .with_context(|| format!("Failed to stat {}", full_path.display()))?;
        if metadata.len() > self.max_file_size {
            debug!("Skipping {} ({} bytes)", path, metadata.len());
            return Ok(None);
        }

        let bytes = tokio::fs::read(&full_path)
            .await
            .with_context(|| format!("Failed to read {}", full_path.display()))?;

        Ok(String::from_utf8(bytes).ok())
    }

    fn path_filter(&self) -> PathFilter {
        self.filter.clone()
    }
}

fn relative_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Branch name of the enclosing git repository, if any
fn current_branch(root: &Path) -> Option<String> {
    let repo = git2::Repository::discover(root).ok()?;
    let head = repo.head().ok()?;
    head.shorthand().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (path, body) in [
            ("src/main.rs", "fn main() {}\n"),
            ("src/lib.rs", "pub mod api;\n"),
            ("README.md", "# Demo\n"),
            ("node_modules/pkg/index.js", "module.exports = 1;\n"),
            ("target/debug/out.rs", "// generated\n"),
            (".vscode/settings.json", "{}\n"),
            ("logs/app.log", "noise\n"),
        ] {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, body).unwrap();
        }
        fs::write(root.join(".gitignore"), "logs/\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_walk_prunes_heavy_and_ignored_dirs() {
        let dir = fixture();
        let source = LocalSource::new(dir.path(), 1024).unwrap();
        let blobs = source.list_tree().await.unwrap().blob_paths();

        assert!(blobs.contains(&"src/main.rs".to_string()));
        assert!(blobs.contains(&"README.md".to_string()));
        assert!(blobs.iter().all(|p| !p.starts_with("node_modules/")));
        assert!(blobs.iter().all(|p| !p.starts_with("target/")));
        assert!(blobs.iter().all(|p| !p.starts_with(".vscode/")));
        assert!(blobs.iter().all(|p| !p.starts_with("logs/")));
    }

    #[tokio::test]
    async fn test_read_file_and_readme() {
        let dir = fixture();
        let source = LocalSource::new(dir.path(), 1024).unwrap();

        assert_eq!(
            source.read_file("src/main.rs").await.unwrap().as_deref(),
            Some("fn main() {}\n")
        );
        assert_eq!(source.read_file("missing.rs").await.unwrap(), None);

        let tree = source.list_tree().await.unwrap().blob_paths();
        assert_eq!(source.read_readme(&tree).await.unwrap().as_deref(), Some("# Demo\n"));
    }

    #[tokio::test]
    async fn test_oversized_and_binary_files_skipped() {
        let dir = fixture();
        fs::write(dir.path().join("big.rs"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("blob.rs"), [0xff, 0xfe, 0x00]).unwrap();
        let source = LocalSource::new(dir.path(), 1).unwrap();

        assert_eq!(source.read_file("big.rs").await.unwrap(), None);
        assert_eq!(source.read_file("blob.rs").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_paths_outside_root_rejected() {
        let dir = fixture();
        let source = LocalSource::new(&dir.path().join("src"), 1024).unwrap();
        assert_eq!(source.read_file("../README.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_describe_without_git() {
        let dir = fixture();
        let source = LocalSource::new(dir.path(), 1024).unwrap();
        let info = source.describe().await.unwrap();
        assert_eq!(info.owner, "local");
        assert!(info.description.starts_with("Local repository at "));
    }
}
