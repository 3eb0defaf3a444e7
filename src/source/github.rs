//! GitHub REST backend
//!
//! Reads repository metadata, the recursive tree and individual files
//! through the contents API. File bodies arrive base64-encoded.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::RepoSource;
use crate::config::GithubConfig;
use crate::core::snapshot::{EntryKind, PathEntry, RepoInfo, TreeListing};

const REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BRANCH: &str = "main";
const NO_DESCRIPTION: &str = "No description provided.";

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: Option<String>,
}

/// GitHub repository source
pub struct GithubSource {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    /// Explicit branch, otherwise the default branch once known
    branch: tokio::sync::OnceCell<String>,
    requested_branch: Option<String>,
}

impl GithubSource {
    pub fn new(
        config: &GithubConfig,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("token {}", token))
                .context("GitHub token contains invalid characters")?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!("repo-distill/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: tokio::sync::OnceCell::new(),
            requested_branch: branch.map(str::to_string),
        })
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.owner, self.repo)
    }

    /// Endpoint under the repository pinned to `branch`; segments are percent-encoded
    fn ref_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
        branch: &str,
    ) -> Result<Url> {
        let mut url = Url::parse(&self.repo_url())
            .with_context(|| format!("Invalid GitHub API URL: {}", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("GitHub API URL cannot hold a path: {}", self.api_url))?
            .extend(segments);
        url.query_pairs_mut().append_pair("ref", branch);
        Ok(url)
    }

    async fn fetch_info(&self) -> Result<RepoResponse> {
        let url = self.repo_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch repo info ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse repo info")
    }

    /// Branch to read from, resolving the default branch on first use
    async fn branch(&self) -> Result<&str> {
        let branch = self
            .branch
            .get_or_try_init(|| async {
                if let Some(b) = &self.requested_branch {
                    return Ok(b.clone());
                }
                let info = self.fetch_info().await?;
                Ok::<_, anyhow::Error>(
                    info.default_branch
                        .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
                )
            })
            .await?;
        Ok(branch.as_str())
    }

    /// GET a contents-style endpoint; 404 maps to `None`
    async fn fetch_encoded(&self, url: Url) -> Result<Option<String>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                anyhow::bail!("GitHub returned {} for {}", status, url);
            }
            _ => {}
        }

        let body: ContentResponse = response
            .json()
            .await
            .context("Failed to parse contents response")?;

        body.content.map(|c| decode_content(&c)).transpose()
    }
}

#[async_trait]
impl RepoSource for GithubSource {
    async fn describe(&self) -> Result<RepoInfo> {
        let info = self.fetch_info().await?;

        let default_branch = info
            .default_branch
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let branch = self
            .branch
            .get_or_init(|| async {
                self.requested_branch
                    .clone()
                    .unwrap_or_else(|| default_branch.clone())
            })
            .await
            .clone();

        Ok(RepoInfo {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch,
            description: info
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        })
    }

    async fn list_tree(&self) -> Result<TreeListing> {
        let branch = self.branch().await?;
        let url = format!("{}/git/trees/{}?recursive=1", self.repo_url(), branch);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch tree ({}): {}", status, body);
        }

        let tree: TreeResponse = response.json().await.context("Failed to parse tree")?;
        if tree.truncated {
            warn!("GitHub truncated the tree listing for {}/{}", self.owner, self.repo);
        }

        Ok(parse_tree(tree))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let branch = self.branch().await?;
        let url = self.ref_url(std::iter::once("contents").chain(path.split('/')), branch)?;
        debug!("Fetching {}", path);
        self.fetch_encoded(url).await
    }

    async fn read_readme(&self, _tree: &[String]) -> Result<Option<String>> {
        let branch = self.branch().await?;
        let url = self.ref_url(["readme"], branch)?;
        self.fetch_encoded(url).await
    }
}

fn parse_tree(tree: TreeResponse) -> TreeListing {
    let entries = tree
        .tree
        .into_iter()
        .filter_map(|item| {
            let kind = match item.kind.as_str() {
                "blob" => EntryKind::Blob,
                "tree" => EntryKind::Tree,
                _ => return None,
            };
            Some(PathEntry::new(item.path, kind))
        })
        .collect();

    TreeListing {
        entries,
        upstream_truncated: tree.truncated,
    }
}

/// Decode a base64 payload as returned by the contents API (wrapped lines)
fn decode_content(encoded: &str) -> Result<String> {
    let cleaned: String = encoded.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .context("Invalid base64 content")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
