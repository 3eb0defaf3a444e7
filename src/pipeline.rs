//! End-to-end distillation run
//!
//! tree → filter → select → fetch → (chunk → rank) → assemble
//!
//! Fetching and embedding are sequential, so the order fixed by the
//! selector is the order files and chunks appear in the document.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ai::EmbeddingSource;
use crate::assemble::{assemble, AssembleRequest, CodeContext};
use crate::core::cache::{SnapshotCache, SnapshotKey};
use crate::core::chunker::{Chunk, Chunker};
use crate::core::selector::{self, DEPENDENCY_MANIFESTS};
use crate::core::snapshot::{FetchStats, RepoSnapshot, SourceFile};
use crate::core::tree;
use crate::error::PipelineError;
use crate::rag::{clamp_top_k, EmbeddingRanker};
use crate::source::RepoSource;

/// Receives human-readable milestones while a run progresses
pub trait ProgressSink {
    fn report(&self, message: &str);
}

/// Retrieval settings for chunk-level selection
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub query: String,
    pub top_k: usize,
    pub lines_per_chunk: usize,
    pub overlap_lines: usize,
    pub concurrency: usize,
}

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Cache fingerprint of the target
    pub target: String,
    pub branch: Option<String>,
    pub max_files: usize,
    pub tree_cap: usize,
    pub assemble: AssembleRequest,
    pub rag: Option<RagOptions>,
}

impl PipelineRequest {
    fn snapshot_key(&self) -> SnapshotKey {
        SnapshotKey {
            target: self.target.clone(),
            branch: self.branch.clone(),
            max_files: selector::clamp_limit(self.max_files),
            tree_cap: self.tree_cap,
        }
    }
}

/// Counters for everything that was skipped or dropped
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub tree_entries: usize,
    pub excluded: usize,
    pub eligible: usize,
    pub fetch_failures: usize,
    pub chunks: usize,
    pub embed_failures: usize,
    pub from_cache: bool,
}

impl RunStats {
    /// Counters recorded when the snapshot was fetched
    fn from_fetch(fetch: &FetchStats, from_cache: bool) -> Self {
        Self {
            tree_entries: fetch.tree_entries,
            excluded: fetch.excluded,
            eligible: fetch.eligible,
            fetch_failures: fetch.fetch_failures,
            from_cache,
            ..Self::default()
        }
    }
}

/// Result of a run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub document: String,
    pub is_truncated: bool,
    pub selected_files: Vec<String>,
    pub stats: RunStats,
}

/// Wires a repository source, an optional embedder and a progress sink
pub struct Pipeline<'a> {
    source: &'a dyn RepoSource,
    embedder: Option<&'a dyn EmbeddingSource>,
    progress: &'a dyn ProgressSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn RepoSource, progress: &'a dyn ProgressSink) -> Self {
        Self {
            source,
            embedder: None,
            progress,
        }
    }

    pub fn with_embedder(mut self, embedder: &'a dyn EmbeddingSource) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Run once, reusing the cached snapshot when the request matches it
    pub async fn run(
        &self,
        request: &PipelineRequest,
        cache: &mut SnapshotCache,
    ) -> Result<PipelineOutput> {
        if let Some(rag) = &request.rag {
            if rag.query.trim().is_empty() {
                return Err(PipelineError::MissingQuery.into());
            }
        }

        let key = request.snapshot_key();

        let (snapshot, from_cache) = match cache.get(&key) {
            Some(snapshot) => {
                self.progress.report("Reusing cached snapshot");
                debug!(
                    "Snapshot cache hit for {} (fetched {})",
                    key.target,
                    snapshot.fetched_at.format("%H:%M:%S")
                );
                (snapshot, true)
            }
            None => {
                let snapshot = Arc::new(self.build_snapshot(request).await?);
                cache.put(key, Arc::clone(&snapshot));
                (snapshot, false)
            }
        };
        let mut stats = RunStats::from_fetch(&snapshot.fetch_stats, from_cache);

        let document = match &request.rag {
            Some(rag) => {
                let embedder = self.embedder.ok_or_else(|| {
                    anyhow::anyhow!("Retrieval mode requested without an embedding backend")
                })?;
                let chunks = self.chunk_files(&snapshot, rag);
                stats.chunks = chunks.len();

                self.progress
                    .report(&format!("Embedding {} chunks...", chunks.len()));
                let outcome = EmbeddingRanker::new(embedder)
                    .with_concurrency(rag.concurrency)
                    .rank(chunks, &rag.query, clamp_top_k(rag.top_k))
                    .await?;
                stats.embed_failures = outcome.failed;
                debug!("{} of {} chunks embedded", outcome.embedded, stats.chunks);
                if outcome.failed > 0 {
                    warn!("{} chunks could not be embedded", outcome.failed);
                }

                assemble(&snapshot, &request.assemble, CodeContext::Chunks(&outcome.ranked))
            }
            None => assemble(&snapshot, &request.assemble, CodeContext::Files),
        };

        self.progress.report("Document assembled");

        Ok(PipelineOutput {
            document,
            is_truncated: snapshot.is_truncated,
            selected_files: snapshot.selected_paths(),
            stats,
        })
    }

    /// Fetch everything one request needs from the source
    pub async fn build_snapshot(&self, request: &PipelineRequest) -> Result<RepoSnapshot> {
        let mut stats = FetchStats::default();

        self.progress.report("Reading repository info...");
        let info = self
            .source
            .describe()
            .await
            .map_err(|e| PipelineError::TreeUnavailable(format!("{:#}", e)))?;

        self.progress.report("Listing files...");
        let listing = self
            .source
            .list_tree()
            .await
            .map_err(|e| PipelineError::TreeUnavailable(format!("{:#}", e)))?;

        let blobs = listing.blob_paths();
        stats.tree_entries = blobs.len();

        let paths = self.source.path_filter().retain_eligible(blobs);
        stats.excluded = stats.tree_entries - paths.len();
        debug!("{} paths excluded by filter", stats.excluded);

        let readme = match self.source.read_readme(&paths).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("No README found");
                String::new()
            }
            Err(e) => {
                warn!("Failed to read README: {:#}", e);
                String::new()
            }
        };

        let dependencies = self.read_manifests(&paths).await;

        let selected = selector::select(&paths, request.max_files);
        stats.eligible = paths.iter().filter(|p| selector::is_candidate(p)).count();
        self.progress.report(&format!(
            "Selected {} of {} candidate files",
            selected.len(),
            stats.eligible
        ));

        let mut source_files = Vec::with_capacity(selected.len());
        for (idx, path) in selected.iter().enumerate() {
            self.progress
                .report(&format!("Fetching {} ({}/{})", path, idx + 1, selected.len()));
            match self.source.read_file(path).await {
                Ok(Some(content)) => source_files.push(SourceFile::new(path.clone(), content)),
                Ok(None) => {
                    debug!("{} not readable as text", path);
                    stats.fetch_failures += 1;
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {:#}", path, e);
                    stats.fetch_failures += 1;
                }
            }
        }

        let budgeted = tree::budget(&paths, request.tree_cap);
        if listing.upstream_truncated {
            warn!("Tree listing was already truncated by the source");
        }

        info!(
            "Snapshot ready: {} files, {} tree entries",
            source_files.len(),
            budgeted.paths.len()
        );

        Ok(RepoSnapshot {
            info,
            tree: budgeted.paths,
            is_truncated: budgeted.is_truncated || listing.upstream_truncated,
            readme,
            dependencies,
            source_files,
            fetch_stats: stats,
            fetched_at: chrono::Utc::now(),
        })
    }

    async fn read_manifests(&self, paths: &[String]) -> String {
        let mut dependencies = String::new();

        for manifest in DEPENDENCY_MANIFESTS {
            if !paths.iter().any(|p| p == manifest) {
                continue;
            }
            match self.source.read_file(manifest).await {
                Ok(Some(content)) => {
                    dependencies.push_str(&format!("\n--- {} ---\n{}\n", manifest, content));
                }
                Ok(None) => debug!("Manifest {} not readable", manifest),
                Err(e) => warn!("Failed to read {}: {:#}", manifest, e),
            }
        }

        dependencies
    }

    fn chunk_files(&self, snapshot: &RepoSnapshot, rag: &RagOptions) -> Vec<Chunk> {
        let chunker = Chunker::new(rag.lines_per_chunk, rag.overlap_lines);
        snapshot
            .source_files
            .iter()
            .flat_map(|file| chunker.split_file(file))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::{EntryKind, PathEntry, RepoInfo, TreeListing};
    use anyhow::bail;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemorySource {
        files: HashMap<String, String>,
        order: Vec<String>,
        broken: Vec<String>,
        tree_fails: bool,
        reads: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
                order: files.iter().map(|(p, _)| p.to_string()).collect(),
                broken: Vec::new(),
                tree_fails: false,
                reads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RepoSource for MemorySource {
        async fn describe(&self) -> Result<RepoInfo> {
            Ok(RepoInfo {
                owner: "octo".to_string(),
                repo: "demo".to_string(),
                branch: "main".to_string(),
                description: "Demo".to_string(),
            })
        }

        async fn list_tree(&self) -> Result<TreeListing> {
            if self.tree_fails {
                bail!("rate limited");
            }
            Ok(TreeListing {
                entries: self.order
                    .iter()
                    .map(|p| PathEntry::new(p.as_str(), EntryKind::Blob))
                    .collect(),
                upstream_truncated: false,
            })
        }

        async fn read_file(&self, path: &str) -> Result<Option<String>> {
            self.reads.lock().unwrap().push(path.to_string());
            if self.broken.iter().any(|b| b == path) {
                bail!("500 Internal Server Error");
            }
            Ok(self.files.get(path).cloned())
        }
    }

    struct NoProgress;

    impl ProgressSink for NoProgress {
        fn report(&self, _message: &str) {}
    }

    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn report(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingSource for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let hits = text.matches("auth").count() as f32;
            Ok(vec![hits, 1.0])
        }
    }

    fn request(max_files: usize) -> PipelineRequest {
        PipelineRequest {
            target: "github:octo/demo".to_string(),
            branch: None,
            max_files,
            tree_cap: 1000,
            assemble: AssembleRequest {
                task: "Explain".to_string(),
                additional_context: None,
                analyze_issues: false,
            },
            rag: None,
        }
    }

    fn scenario_source() -> MemorySource {
        MemorySource::new(&[
            ("src/index.ts", "export const app = 1;"),
            ("test/index.test.ts", "test('x', () => {});"),
            ("node_modules/x/y.js", "module.exports = {};"),
            (".env", "SECRET=1"),
            ("README.md", "# Demo readme"),
        ])
    }

    #[tokio::test]
    async fn test_end_to_end_selection() {
        let source = scenario_source();
        let pipeline = Pipeline::new(&source, &NoProgress);
        let output = pipeline.run(&request(5), &mut SnapshotCache::new()).await.unwrap();

        assert_eq!(output.selected_files, vec!["src/index.ts", "test/index.test.ts"]);
        assert!(!output.document.contains("node_modules"));
        assert!(!output.document.contains("SECRET"));
        assert!(output.document.contains("# Demo readme"));
        assert_eq!(output.stats.excluded, 2);
        assert!(!output.is_truncated);
    }

    #[tokio::test]
    async fn test_manifests_collected_not_selected() {
        let source = MemorySource::new(&[
            ("package.json", "{\"name\":\"demo\"}"),
            ("go.mod", "module demo"),
            ("src/app.js", "console.log(1)"),
        ]);
        let output = Pipeline::new(&source, &NoProgress)
            .run(&request(5), &mut SnapshotCache::new())
            .await
            .unwrap();

        assert_eq!(output.selected_files, vec!["src/app.js"]);
        let pkg = position(&output.document, "--- package.json ---");
        let gomod = position(&output.document, "--- go.mod ---");
        assert!(pkg < gomod);
    }

    fn position(doc: &str, needle: &str) -> usize {
        doc.find(needle).unwrap_or_else(|| panic!("missing {:?}", needle))
    }

    #[tokio::test]
    async fn test_fetch_failure_is_skipped() {
        let mut source = MemorySource::new(&[
            ("src/main.rs", "fn main() {}"),
            ("src/api.rs", "pub fn api() {}"),
        ]);
        source.broken.push("src/main.rs".to_string());

        let output = Pipeline::new(&source, &NoProgress)
            .run(&request(5), &mut SnapshotCache::new())
            .await
            .unwrap();

        assert_eq!(output.selected_files, vec!["src/api.rs"]);
        assert_eq!(output.stats.fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_tree_failure_is_fatal() {
        let mut source = scenario_source();
        source.tree_fails = true;
        let err = Pipeline::new(&source, &NoProgress)
            .run(&request(5), &mut SnapshotCache::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::TreeUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_tree_produces_document() {
        let source = MemorySource::new(&[]);
        let output = Pipeline::new(&source, &NoProgress)
            .run(&request(5), &mut SnapshotCache::new())
            .await
            .unwrap();
        assert!(output.selected_files.is_empty());
        assert!(output.document.starts_with("# Task"));
    }

    #[tokio::test]
    async fn test_cache_reused_for_same_request() {
        let source = scenario_source();
        let pipeline = Pipeline::new(&source, &NoProgress);
        let mut cache = SnapshotCache::new();

        pipeline.run(&request(5), &mut cache).await.unwrap();
        let reads_after_first = source.reads.lock().unwrap().len();

        let mut second = request(5);
        second.assemble.task = "Find bugs".to_string();
        let output = pipeline.run(&second, &mut cache).await.unwrap();

        assert!(output.stats.from_cache);
        assert_eq!(output.stats.tree_entries, 5);
        assert_eq!(output.stats.excluded, 2);
        assert_eq!(output.stats.eligible, 2);
        assert!(output.document.starts_with("# Task\nFind bugs"));
        assert_eq!(source.reads.lock().unwrap().len(), reads_after_first);

        let output = pipeline.run(&request(1), &mut cache).await.unwrap();
        assert!(!output.stats.from_cache);
        assert_eq!(output.selected_files, vec!["src/index.ts"]);
    }

    #[tokio::test]
    async fn test_tree_cap_sets_truncation() {
        let files: Vec<(String, String)> = (0..250)
            .map(|i| (format!("pkg/f{}.go", i), "package pkg".to_string()))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let source = MemorySource::new(&refs);

        let mut req = request(3);
        req.tree_cap = 150;
        let output = Pipeline::new(&source, &NoProgress)
            .run(&req, &mut SnapshotCache::new())
            .await
            .unwrap();

        assert!(output.is_truncated);
        assert_eq!(output.selected_files.len(), 3);
    }

    #[tokio::test]
    async fn test_rag_mode_ranks_chunks() {
        let source = MemorySource::new(&[
            ("src/auth.rs", "fn auth() { auth_check(); auth_token(); }"),
            ("src/db.rs", "fn query() {}"),
        ]);
        let mut req = request(5);
        req.rag = Some(RagOptions {
            query: "auth".to_string(),
            top_k: 1,
            lines_per_chunk: 30,
            overlap_lines: 5,
            concurrency: 1,
        });

        let recorder = Recorder(Mutex::new(Vec::new()));
        let output = Pipeline::new(&source, &recorder)
            .with_embedder(&KeywordEmbedder)
            .run(&req, &mut SnapshotCache::new())
            .await
            .unwrap();

        assert!(output.document.contains("--- src/auth.rs (part 1) ---"));
        assert!(!output.document.contains("--- src/db.rs"));
        assert_eq!(output.stats.chunks, 2);
        let messages = recorder.0.lock().unwrap();
        assert!(messages.iter().any(|m| m.starts_with("Embedding 2 chunks")));
    }

    #[tokio::test]
    async fn test_rag_requires_query() {
        let source = scenario_source();
        let mut req = request(5);
        req.rag = Some(RagOptions {
            query: "  ".to_string(),
            top_k: 5,
            lines_per_chunk: 30,
            overlap_lines: 5,
            concurrency: 1,
        });
        let err = Pipeline::new(&source, &NoProgress)
            .with_embedder(&KeywordEmbedder)
            .run(&req, &mut SnapshotCache::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingQuery)
        ));
    }
}
