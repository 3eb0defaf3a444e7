//! Run command - distill a repository once

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::{build_request, embedder, generator, open_source, print_summary, progress_sink, RunArgs};
use crate::ai::{Generator, OllamaClient};
use crate::config::Config;
use crate::core::cache::SnapshotCache;
use crate::pipeline::{Pipeline, PipelineOutput};
use crate::source::RepoTarget;
use crate::ui::theme;

/// JSON shape of `run --json`
#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    output: &'a PipelineOutput,
    generator: Option<&'a str>,
    response: Option<&'a str>,
}

pub async fn run(config: Config, target: &str, args: &RunArgs) -> Result<()> {
    let target = RepoTarget::resolve(target)?.with_branch(args.branch.clone());
    debug!("Resolved target: {:?}", target);

    // fail on a missing API key before anything is fetched
    let generator = generator(args.generate, &config)?;

    let mut cache = SnapshotCache::new();
    let output = distill(&config, &target, args, &mut cache).await?;

    let response = match &generator {
        Some(generator) => Some(answer(generator.as_ref(), &output.document).await?),
        None => None,
    };

    let text = response.as_deref().unwrap_or(&output.document);
    if let Some(path) = &args.output {
        write_output(path, text)?;
    }

    if args.json {
        let report = RunReport {
            output: &output,
            generator: generator.as_ref().map(|g| g.name()),
            response: response.as_deref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize result")?
        );
        return Ok(());
    }

    print_summary(&output, config.verbose);
    if args.output.is_none() {
        print!("{}", text);
        if !text.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

/// Build one document, using the given cache for the snapshot
pub(crate) async fn distill(
    config: &Config,
    target: &RepoTarget,
    args: &RunArgs,
    cache: &mut SnapshotCache,
) -> Result<PipelineOutput> {
    let source = open_source(target, config)?;
    let request = build_request(target, args, config);
    let progress = progress_sink();

    let ollama: Option<OllamaClient> = match request.rag {
        Some(_) => Some(embedder(args, config)?),
        None => None,
    };

    let mut pipeline = Pipeline::new(source.as_ref(), progress.as_ref());
    if let Some(client) = &ollama {
        info!("Embedding with {} at {}", client.embedding_model(), client.base_url());
        pipeline = pipeline.with_embedder(client);
    }

    pipeline.run(&request, cache).await
}

/// Send the document to a model
pub(crate) async fn answer(generator: &dyn Generator, document: &str) -> Result<String> {
    let progress = progress_sink();
    progress.report(&format!("Waiting for {}...", generator.name()));
    generator
        .generate(document)
        .await
        .with_context(|| format!("{} generation failed", generator.name()))
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write output to {:?}", path))?;
    eprintln!(
        "{} Written to {}",
        theme::success().apply_to("✓"),
        path.display()
    );
    Ok(())
}
