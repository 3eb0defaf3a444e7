//! CLI command implementations

pub mod info;
pub mod models;
pub mod run;
pub mod session;

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::ai::{GeminiClient, Generator, OllamaClient};
use crate::assemble::AssembleRequest;
use crate::config::Config;
use crate::pipeline::{PipelineOutput, PipelineRequest, ProgressSink, RagOptions};
use crate::source::{GithubSource, LocalSource, RepoSource, RepoTarget};
use crate::ui::{theme, LogProgress, SpinnerProgress};

/// Backend that answers the assembled document
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerateWith {
    /// Only print the document
    #[default]
    None,
    Ollama,
    Gemini,
}

/// Flags shared by `run` and `session`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Branch to read (GitHub targets only)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Maximum number of source files to include (1-200)
    #[arg(short = 'n', long)]
    pub max_files: Option<usize>,

    /// Rank chunks by similarity to this query instead of including whole files
    #[arg(short = 'q', long)]
    pub rag_query: Option<String>,

    /// Ollama embedding model for retrieval mode
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Chunks kept in retrieval mode (1-50)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Task placed at the top of the document
    #[arg(short, long)]
    pub task: Option<String>,

    /// Extra free-form context appended to the document
    #[arg(long)]
    pub context: Option<String>,

    /// Ask the model to review the code for issues
    #[arg(long)]
    pub analyze_issues: bool,

    /// Send the document to a model and print its answer
    #[arg(short, long, value_enum, default_value_t = GenerateWith::None)]
    pub generate: GenerateWith,

    /// Write the document to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Open the backend for a resolved target
pub fn open_source(target: &RepoTarget, config: &Config) -> Result<Box<dyn RepoSource>> {
    let source: Box<dyn RepoSource> = match target {
        RepoTarget::Local(path) => {
            Box::new(LocalSource::new(path, config.selection.max_file_size_kb)?)
        }
        RepoTarget::Github {
            owner,
            repo,
            branch,
        } => Box::new(GithubSource::new(
            &config.github,
            owner,
            repo,
            branch.as_deref(),
        )?),
    };
    Ok(source)
}

/// Merge command-line flags over the configuration
pub fn build_request(target: &RepoTarget, args: &RunArgs, config: &Config) -> PipelineRequest {
    let rag = args.rag_query.as_ref().map(|query| RagOptions {
        query: query.clone(),
        top_k: args.top_k.unwrap_or(config.rag.top_k),
        lines_per_chunk: config.rag.lines_per_chunk,
        overlap_lines: config.rag.overlap_lines,
        concurrency: config.rag.embed_concurrency,
    });

    PipelineRequest {
        target: target.fingerprint(),
        branch: target.branch().map(str::to_string),
        max_files: args.max_files.unwrap_or(config.selection.max_files),
        tree_cap: config.selection.tree_cap,
        assemble: AssembleRequest {
            task: args
                .task
                .clone()
                .unwrap_or_else(|| config.output.task.clone()),
            additional_context: args.context.clone(),
            analyze_issues: args.analyze_issues,
        },
        rag,
    }
}

/// Ollama client used for embeddings, with the flag override applied
pub fn embedder(args: &RunArgs, config: &Config) -> Result<OllamaClient> {
    let client = OllamaClient::from_config(&config.ollama)?;
    Ok(match args.embed_model.as_deref() {
        Some(model) => client.with_embedding_model(model),
        None => client,
    })
}

/// Answering backend, if one was requested
pub fn generator(kind: GenerateWith, config: &Config) -> Result<Option<Box<dyn Generator>>> {
    let generator: Box<dyn Generator> = match kind {
        GenerateWith::None => return Ok(None),
        GenerateWith::Ollama => Box::new(OllamaClient::from_config(&config.ollama)?),
        GenerateWith::Gemini => Box::new(GeminiClient::from_config(&config.gemini)?),
    };
    Ok(Some(generator))
}

/// Spinner on a terminal, log lines otherwise
pub fn progress_sink() -> Box<dyn ProgressSink> {
    if console::Term::stderr().is_term() {
        Box::new(SpinnerProgress::new())
    } else {
        Box::new(LogProgress)
    }
}

/// Run summary on stderr; `verbose` also lists the selected files
pub fn print_summary(output: &PipelineOutput, verbose: bool) {
    let stats = &output.stats;
    eprintln!(
        "{} {} files, {} chars{}",
        theme::success().apply_to("✓"),
        output.selected_files.len(),
        output.document.chars().count(),
        if stats.from_cache { " (cached snapshot)" } else { "" }
    );
    eprintln!(
        "  {}",
        theme::muted().apply_to(format!(
            "{} tree entries, {} excluded, {} candidates",
            stats.tree_entries, stats.excluded, stats.eligible
        ))
    );
    if stats.chunks > 0 {
        eprintln!(
            "  {}",
            theme::muted().apply_to(format!(
                "{} chunks, {} failed to embed",
                stats.chunks, stats.embed_failures
            ))
        );
    }
    if stats.fetch_failures > 0 {
        eprintln!(
            "  {}",
            theme::warning().apply_to(format!("{} files could not be fetched", stats.fetch_failures))
        );
    }
    if output.is_truncated {
        eprintln!("  {}", theme::warning().apply_to("File tree was truncated"));
    }
    if verbose {
        for path in &output.selected_files {
            eprintln!("  {}", theme::muted().apply_to(format!("+ {}", path)));
        }
    }
}
