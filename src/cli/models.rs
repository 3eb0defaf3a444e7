//! Models command - list what the local Ollama server can run

use anyhow::{bail, Result};

use crate::ai::OllamaClient;
use crate::config::Config;
use crate::ui::theme;

pub async fn run(config: Config) -> Result<()> {
    let client = OllamaClient::from_config(&config.ollama)?;

    if !client.is_available().await {
        bail!(
            "Ollama is not reachable at {}. Start it with `ollama serve`.",
            client.base_url()
        );
    }

    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models installed. Try `ollama pull {}`.", client.embedding_model());
        return Ok(());
    }

    for model in &models {
        let mut tags = Vec::new();
        if model_matches(&model.name, client.model()) {
            tags.push("generation");
        }
        if model_matches(&model.name, client.embedding_model()) {
            tags.push("embeddings");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        println!(
            "{:<40} {:>10}{}",
            model.name,
            theme::muted().apply_to(format_size(model.size)),
            theme::success().apply_to(tags)
        );
    }

    Ok(())
}

/// `llama3` matches the installed `llama3:latest`
fn model_matches(installed: &str, configured: &str) -> bool {
    installed == configured
        || installed
            .split_once(':')
            .map(|(base, tag)| base == configured && tag == "latest")
            .unwrap_or(false)
}

fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else {
        format!("{} MB", bytes / MB)
    }
}
