//! Embedding-based chunk ranking
//!
//! Chunks are embedded one after another by default. A local Ollama
//! instance serves one request at a time, so flooding it only queues work
//! and risks timeouts. `concurrency` above 1 switches to a bounded,
//! order-preserving stream.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::ai::EmbeddingSource;
use crate::core::chunker::Chunk;
use crate::error::PipelineError;

pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 50;
pub const DEFAULT_TOP_K: usize = 5;

pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(MIN_TOP_K, MAX_TOP_K)
}

/// A chunk that survived ranking, with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub source_path: String,
    pub part_index: usize,
    /// Content prefixed with the relevance annotation
    pub content: String,
    pub score: f32,
}

/// Result of one ranking pass
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    pub ranked: Vec<RankedChunk>,
    pub embedded: usize,
    pub failed: usize,
}

/// Cosine similarity. Zero-norm, mismatched or overflowing vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

fn annotate(content: &str, score: f32) -> String {
    format!("[Relevance: {:.1}%]\n{}", score * 100.0, content)
}

/// Ranks chunks against a query through an injected embedder
pub struct EmbeddingRanker<'a> {
    embedder: &'a dyn EmbeddingSource,
    concurrency: usize,
}

impl<'a> EmbeddingRanker<'a> {
    pub fn new(embedder: &'a dyn EmbeddingSource) -> Self {
        Self {
            embedder,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// Only a failed query embedding is fatal; chunks whose embedding fails
    /// are dropped and counted.
    pub async fn rank(
        &self,
        chunks: Vec<Chunk>,
        query: &str,
        top_k: usize,
    ) -> Result<RankOutcome, PipelineError> {
        let top_k = clamp_top_k(top_k);

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| PipelineError::QueryEmbedding(format!("{:#}", e)))?;

        let total = chunks.len();
        let embedded = self.embed_all(chunks).await;
        let failed = total - embedded.len();

        let mut scored: Vec<Chunk> = embedded
            .into_iter()
            .map(|mut chunk| {
                let score = chunk
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(&query_embedding, e))
                    .unwrap_or(0.0);
                chunk.score = Some(score);
                chunk
            })
            .collect();

        // stable sort keeps chunk order on equal scores
        scored.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
            sb.total_cmp(&sa)
        });

        let embedded_count = scored.len();
        let ranked = scored
            .into_iter()
            .take(top_k)
            .map(|chunk| {
                let score = chunk.score.unwrap_or(0.0);
                RankedChunk {
                    content: annotate(&chunk.content, score),
                    source_path: chunk.source_path,
                    part_index: chunk.part_index,
                    score,
                }
            })
            .collect();

        debug!("Ranked {} chunks, {} failed to embed", embedded_count, failed);

        Ok(RankOutcome {
            ranked,
            embedded: embedded_count,
            failed,
        })
    }

    async fn embed_all(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let embedder = self.embedder;

        let results: Vec<Option<Chunk>> = stream::iter(chunks)
            .map(|mut chunk| async move {
                match embedder.embed(&chunk.content).await {
                    Ok(embedding) => {
                        chunk.embedding = Some(embedding);
                        Some(chunk)
                    }
                    Err(e) => {
                        warn!(
                            "Skipping {} part {}: embedding failed: {:#}",
                            chunk.source_path, chunk.part_index, e
                        );
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Embeds "chunk N" as a vector whose angle to the query shrinks with N
    struct FakeEmbedder {
        fail_on: Vec<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEmbedder {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingSource for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.lock().unwrap().push(text.to_string());
            if text == "query" {
                return Ok(vec![1.0, 0.0]);
            }
            let n: usize = text.trim_start_matches("chunk ").parse()?;
            if self.fail_on.contains(&n) {
                bail!("model unavailable");
            }
            Ok(vec![n as f32 + 1.0, 20.0])
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingSource for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("connection refused")
        }
    }

    /// Chunk 1 overflows f32 when squared
    struct OverflowEmbedder;

    #[async_trait]
    impl EmbeddingSource for OverflowEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text == "chunk 1" {
                Ok(vec![f32::MAX, f32::MAX])
            } else {
                Ok(vec![1.0, 1.0])
            }
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                source_path: format!("src/f{}.rs", i),
                part_index: 0,
                content: format!("chunk {}", i),
                embedding: None,
                score: None,
            })
            .collect()
    }

    #[test]
    fn test_cosine_identical_and_opposite() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let s = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]);
        assert_eq!(s, 0.0);
        assert!(!s.is_nan());
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_overflow_scores_zero() {
        let huge = [f32::MAX, f32::MAX];
        assert_eq!(cosine_similarity(&huge, &huge), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &huge), 0.0);
    }

    #[tokio::test]
    async fn test_overflowing_chunk_ranks_last() {
        let outcome = EmbeddingRanker::new(&OverflowEmbedder)
            .rank(chunks(3), "query", 5)
            .await
            .unwrap();

        let order: Vec<&str> = outcome.ranked.iter().map(|c| c.source_path.as_str()).collect();
        assert_eq!(order, vec!["src/f0.rs", "src/f2.rs", "src/f1.rs"]);
        assert!(outcome.ranked.iter().all(|c| c.score.is_finite()));
        assert_eq!(outcome.ranked[2].score, 0.0);
    }

    #[tokio::test]
    async fn test_failed_chunks_dropped() {
        let embedder = FakeEmbedder::new(vec![2, 7, 11]);
        let outcome = EmbeddingRanker::new(&embedder)
            .rank(chunks(20), "query", 10)
            .await
            .unwrap();

        assert_eq!(outcome.failed, 3);
        assert_eq!(outcome.embedded, 17);
        assert_eq!(outcome.ranked.len(), 10);
        for pair in outcome.ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(outcome.ranked.iter().all(|c| c.source_path != "src/f2.rs"));
        assert_eq!(outcome.ranked[0].source_path, "src/f19.rs");
    }

    #[tokio::test]
    async fn test_sequential_order_of_calls() {
        let embedder = FakeEmbedder::new(Vec::new());
        EmbeddingRanker::new(&embedder)
            .rank(chunks(4), "query", 5)
            .await
            .unwrap();

        let calls = embedder.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["query", "chunk 0", "chunk 1", "chunk 2", "chunk 3"]);
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let embedder = FakeEmbedder::new(vec![3]);
        let sequential = EmbeddingRanker::new(&embedder)
            .rank(chunks(12), "query", 50)
            .await
            .unwrap();
        let concurrent = EmbeddingRanker::new(&embedder)
            .with_concurrency(4)
            .rank(chunks(12), "query", 50)
            .await
            .unwrap();
        assert_eq!(sequential.ranked, concurrent.ranked);
    }

    #[tokio::test]
    async fn test_query_failure_is_fatal() {
        let result = EmbeddingRanker::new(&BrokenEmbedder)
            .rank(chunks(3), "query", 5)
            .await;
        assert!(matches!(result, Err(PipelineError::QueryEmbedding(_))));
    }

    #[tokio::test]
    async fn test_annotation_and_top_k_clamp() {
        let embedder = FakeEmbedder::new(Vec::new());
        let outcome = EmbeddingRanker::new(&embedder)
            .rank(chunks(3), "query", 0)
            .await
            .unwrap();
        assert_eq!(outcome.ranked.len(), 1);
        assert!(outcome.ranked[0].content.starts_with("[Relevance: "));
        assert!(outcome.ranked[0].content.ends_with("%]\nchunk 2"));
    }

    #[tokio::test]
    async fn test_no_chunks() {
        let embedder = FakeEmbedder::new(Vec::new());
        let outcome = EmbeddingRanker::new(&embedder)
            .rank(Vec::new(), "query", 5)
            .await
            .unwrap();
        assert!(outcome.ranked.is_empty());
        assert_eq!(outcome.failed, 0);
    }
}
