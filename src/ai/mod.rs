//! Model backends used for embedding and generation

pub mod gemini;
pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Produces a fixed-length vector for a text
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Turns an assembled prompt into an answer
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name for status output
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
