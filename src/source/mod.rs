//! Repository backends
//!
//! A [`RepoSource`] lists a tree and reads files. The pipeline only sees the
//! trait, so GitHub and local checkouts go through the same selection logic.

pub mod github;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::filter::PathFilter;
use crate::core::snapshot::{RepoInfo, TreeListing};
use crate::core::selector::is_root_readme;
use crate::error::PipelineError;

pub use github::GithubSource;
pub use local::LocalSource;

#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Repository identity. Failure aborts the run.
    async fn describe(&self) -> Result<RepoInfo>;

    /// Full tree listing. Failure aborts the run.
    async fn list_tree(&self) -> Result<TreeListing>;

    /// Read one file. `Ok(None)` means not found or unreadable as text.
    async fn read_file(&self, path: &str) -> Result<Option<String>>;

    /// Read the README, looking for a root `README.md` in `tree` by default
    async fn read_readme(&self, tree: &[String]) -> Result<Option<String>> {
        match tree.iter().find(|p| is_root_readme(p)) {
            Some(path) => self.read_file(path).await,
            None => Ok(None),
        }
    }

    /// Exclusion profile for this backend
    fn path_filter(&self) -> PathFilter {
        PathFilter::remote()
    }
}

/// What the user asked to distill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoTarget {
    Local(PathBuf),
    Github {
        owner: String,
        repo: String,
        branch: Option<String>,
    },
}

impl RepoTarget {
    /// An existing directory is a local target, anything else must name a
    /// GitHub repository.
    pub fn resolve(input: &str) -> Result<Self, PipelineError> {
        let trimmed = input.trim();
        if !trimmed.is_empty() && Path::new(trimmed).is_dir() {
            return Ok(RepoTarget::Local(PathBuf::from(trimmed)));
        }
        Self::parse_github(trimmed)
    }

    /// Parse `owner/repo[@branch]`, optionally prefixed by a github.com URL
    pub fn parse_github(input: &str) -> Result<Self, PipelineError> {
        let invalid = || PipelineError::InvalidTarget(input.to_string());

        let (slug, branch) = match input.rsplit_once('@') {
            Some((slug, branch)) if !branch.is_empty() => (slug, Some(branch.to_string())),
            Some(_) => return Err(invalid()),
            None => (input, None),
        };

        let slug = slug
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.");
        let slug = slug.strip_prefix("github.com/").unwrap_or(slug);
        let slug = slug.trim_end_matches('/');
        let slug = slug.strip_suffix(".git").unwrap_or(slug);

        let parts: Vec<&str> = slug.split('/').collect();
        match parts.as_slice() {
            [owner, repo] if is_valid_name(owner) && is_valid_name(repo) => Ok(RepoTarget::Github {
                owner: owner.to_string(),
                repo: repo.to_string(),
                branch,
            }),
            _ => Err(invalid()),
        }
    }

    /// Stable text used to key the snapshot cache
    pub fn fingerprint(&self) -> String {
        match self {
            RepoTarget::Local(path) => format!("local:{}", path.display()),
            RepoTarget::Github { owner, repo, .. } => format!("github:{}/{}", owner, repo),
        }
    }

    pub fn branch(&self) -> Option<&str> {
        match self {
            RepoTarget::Local(_) => None,
            RepoTarget::Github { branch, .. } => branch.as_deref(),
        }
    }

    /// Override the branch (ignored for local targets)
    pub fn with_branch(self, branch: Option<String>) -> Self {
        match (self, branch) {
            (RepoTarget::Github { owner, repo, .. }, Some(b)) => RepoTarget::Github {
                owner,
                repo,
                branch: Some(b),
            },
            (target, _) => target,
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
