//! Gemini API client
//!
//! Sends assembled prompts to `generateContent`, optionally through an
//! HTTP proxy.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Generator;
use crate::config::GeminiConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Secondary env var checked after the configured one
const FALLBACK_KEY_ENV: &str = "VITE_GEMINI_API_KEY";

/// Value shipped in template `.env` files
const PLACEHOLDER_KEY: &str = "YOUR_GEMINI_API_KEY_HERE";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, proxy: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

        if let Some(proxy_url) = proxy.map(str::trim).filter(|p| !p.is_empty()) {
            let proxy_uri = if proxy_url.starts_with("http") {
                proxy_url.to_string()
            } else {
                format!("http://{}", proxy_url)
            };
            debug!("Using proxy: {}", proxy_uri);
            builder = builder.proxy(
                reqwest::Proxy::all(&proxy_uri)
                    .with_context(|| format!("Invalid proxy address: {}", proxy_uri))?,
            );
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
        })
    }

    /// Create a client using the key found in the environment
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env).with_context(|| {
            format!(
                "Gemini API key is missing. Set {} or {}",
                config.api_key_env, FALLBACK_KEY_ENV
            )
        })?;
        Self::new(api_key, &config.model, config.proxy.as_deref(), config.timeout_secs)
    }

    /// Generate a response for a single prompt
    pub async fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Gemini API connection error")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        extract_text(body).ok_or_else(|| anyhow::anyhow!("Gemini returned no text"))
    }
}

#[async_trait]
impl Generator for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_content(prompt).await
    }
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().map(|p| p.text).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn usable_key(value: String) -> Option<String> {
    let value = value.trim().to_string();
    if value.is_empty() || value == PLACEHOLDER_KEY {
        None
    } else {
        Some(value)
    }
}

/// Look up the API key: configured variable first, then the Vite fallback
pub fn resolve_api_key(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .and_then(usable_key)
        .or_else(|| std::env::var(FALLBACK_KEY_ENV).ok().and_then(usable_key))
}

/// Show only the edges of a secret
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExample1234"), "AIza...1234");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key(""), "");
    }

    #[test]
    fn test_placeholder_key_ignored() {
        assert_eq!(usable_key(PLACEHOLDER_KEY.to_string()), None);
        assert_eq!(usable_key("  ".to_string()), None);
        assert_eq!(usable_key(" abc ".to_string()), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(response), Some("Hello world".to_string()));
    }

    #[test]
    fn test_extract_text_empty() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert_eq!(extract_text(response), None);
    }

    #[test]
    fn test_proxy_scheme_added() {
        let client = GeminiClient::new("k".to_string(), "gemini-pro", Some("127.0.0.1:8080"), 30);
        assert!(client.is_ok());
    }
}
