//! Ollama Client - local generation and embeddings
//!
//! Talks to a locally running Ollama server. No API key needed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingSource, Generator};
use crate::config::OllamaConfig;

/// Default Ollama server URL
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model for generation
pub const DEFAULT_MODEL: &str = "llama3";

/// Default model for embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Local inference can be slow on large prompts
const REQUEST_TIMEOUT_SECS: u64 = 3600;

/// Generation options
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Generate request (simple completion)
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a ModelOptions,
}

/// Generate response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

/// List models response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Ollama client for local inference
pub struct OllamaClient {
    base_url: String,
    model: String,
    embedding_model: String,
    options: ModelOptions,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client with a specific generation model
    pub fn with_model(model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            options: ModelOptions::default(),
            client,
        })
    }

    /// Create a client from configuration, honouring `OLLAMA_HOST`
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let url = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| config.endpoint.clone());

        Ok(Self::with_model(&config.model)?
            .with_url(&url)
            .with_embedding_model(&config.embedding_model)
            .with_options(ModelOptions {
                num_ctx: config.num_ctx,
                num_predict: config.num_predict,
                temperature: config.temperature,
            }))
    }

    /// Set the base URL
    pub fn with_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Check if Ollama is running
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let models: ModelsResponse = response
            .json()
            .await
            .context("Failed to parse models response")?;

        Ok(models.models)
    }

    /// Embed a text with the configured embedding model
    pub async fn embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embedding failed ({}): {}", status, body);
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        body.embedding
            .ok_or_else(|| anyhow::anyhow!("No embedding field in response"))
    }

    /// Simple text generation (non-streaming)
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: &self.options,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama error ({}): {}", status, body);
        }

        let gen_response: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse generate response")?;

        Ok(gen_response.response)
    }

    /// Get the current generation model name
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingSource for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embeddings(text).await
    }
}

#[async_trait]
impl Generator for OllamaClient {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }
}
