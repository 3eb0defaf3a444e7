//! Session command - repeated runs that share one snapshot
//!
//! Changing the task, context or retrieval query between turns reuses the
//! fetched snapshot. Changing the target, branch or file limit refetches.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};
use tracing::warn;

use super::run::{answer, distill};
use super::{generator, print_summary, RunArgs};
use crate::config::Config;
use crate::core::cache::SnapshotCache;
use crate::source::RepoTarget;
use crate::ui::{theme, DistillTheme};

pub async fn run(config: Config, initial_target: Option<&str>, args: &RunArgs) -> Result<()> {
    let prompt_theme = DistillTheme::new();
    let generator = generator(args.generate, &config)?;
    let mut cache = SnapshotCache::new();
    let mut args = args.clone();
    let mut last_target = initial_target.map(str::to_string);
    let mut turns = 0usize;

    eprintln!(
        "{}",
        theme::heading().apply_to(format!("repo-distill v{}", env!("CARGO_PKG_VERSION")))
    );
    eprintln!("{}", theme::muted().apply_to("Leave the query empty for whole-file mode."));

    loop {
        let mut target_input = Input::<String>::with_theme(&prompt_theme).with_prompt("Repository");
        if let Some(previous) = &last_target {
            target_input = target_input.default(previous.clone());
        }
        let target_text: String = target_input.interact_text().context("Failed to read input")?;

        let target = match RepoTarget::resolve(&target_text) {
            Ok(t) => t.with_branch(args.branch.clone()),
            Err(e) => {
                eprintln!("{}", theme::warning().apply_to(e.to_string()));
                continue;
            }
        };
        if last_target.as_deref() == Some(target_text.as_str()) && turns > 0 {
            let reuse = Confirm::with_theme(&prompt_theme)
                .with_prompt("Reuse fetched files?")
                .default(true)
                .interact()
                .context("Failed to read input")?;
            if !reuse {
                cache.invalidate();
            }
        }
        last_target = Some(target_text);

        let task: String = Input::with_theme(&prompt_theme)
            .with_prompt("Task")
            .default(args.task.clone().unwrap_or_else(|| config.output.task.clone()))
            .show_default(false)
            .interact_text()
            .context("Failed to read input")?;
        args.task = Some(task);

        let query: String = Input::with_theme(&prompt_theme)
            .with_prompt("Retrieval query")
            .default(args.rag_query.clone().unwrap_or_default())
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        args.rag_query = Some(query).filter(|q| !q.trim().is_empty());

        turns += 1;
        match distill(&config, &target, &args, &mut cache).await {
            Ok(output) => {
                print_summary(&output, config.verbose);
                match &generator {
                    Some(generator) => match answer(generator.as_ref(), &output.document).await {
                        Ok(text) => println!("{}", text),
                        Err(e) => warn!("{:#}", e),
                    },
                    None => println!("{}", output.document),
                }
            }
            Err(e) => eprintln!("{}", theme::warning().apply_to(format!("{:#}", e))),
        }

        let again = Confirm::with_theme(&prompt_theme)
            .with_prompt("Run again?")
            .default(true)
            .interact()
            .context("Failed to read input")?;
        if !again {
            break;
        }
    }

    Ok(())
}
