//! Info command - show system information

use anyhow::Result;

use crate::ai::gemini::{mask_key, resolve_api_key};
use crate::ai::OllamaClient;
use crate::config::{config_dir_display, Config};

pub async fn run(config: &Config) -> Result<()> {
    println!("repo-distill v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    println!();
    println!("Configuration:");
    println!("  Config dir: {}", config_dir_display());
    println!("  Max files: {}", config.selection.max_files);
    println!("  Tree cap: {}", config.selection.tree_cap);

    println!();
    println!("Backends:");
    println!(
        "  GitHub token ({}): {}",
        config.github.token_env,
        env_status(&config.github.token_env)
    );

    let gemini = match resolve_api_key(&config.gemini.api_key_env) {
        Some(key) => format!("configured ({})", mask_key(&key)),
        None => "not configured".to_string(),
    };
    println!("  Gemini ({}): {}", config.gemini.model, gemini);

    let ollama = OllamaClient::from_config(&config.ollama)?;
    let status = if ollama.is_available().await {
        "running"
    } else {
        "not reachable"
    };
    println!("  Ollama at {}: {}", ollama.base_url(), status);
    println!("    Generation model: {}", ollama.model());
    println!("    Embedding model: {}", ollama.embedding_model());

    Ok(())
}

fn env_status(env_var: &str) -> &'static str {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => "configured",
        _ => "not configured",
    }
}
