//! repo-distill - turn a repository into a bounded prompt document
//!
//! Picks the most representative files of a GitHub or local repository,
//! optionally narrows them to the chunks most similar to a query, and
//! assembles a single document for a language model.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

mod ai;
mod assemble;
mod cli;
mod config;
mod core;
mod error;
mod pipeline;
mod rag;
mod source;
mod ui;

use cli::RunArgs;

/// repo-distill - Repository context for language models
#[derive(Parser)]
#[command(name = "distill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Distill a repository into a prompt document", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a document for one repository
    Run {
        /// Local directory, owner/repo[@branch] or a github.com URL
        target: String,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Interactive loop that reuses the fetched snapshot
    Session {
        /// Repository to start with
        target: Option<String>,

        #[command(flatten)]
        args: RunArgs,
    },

    /// List models installed in Ollama
    Models,

    /// Show version and backend status
    Info,

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pipeable
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("repo-distill v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { target, args } => {
            cli::run::run(config, &target, &args).await?;
        }
        Commands::Session { target, args } => {
            cli::session::run(config, target.as_deref(), &args).await?;
        }
        Commands::Models => {
            cli::models::run(config).await?;
        }
        Commands::Info => {
            cli::info::run(&config).await?;
        }
        Commands::Config { show, init } => {
            if init {
                config::init_config()?;
            } else if show {
                config::show_config(&config)?;
            }
        }
    }

    Ok(())
}
