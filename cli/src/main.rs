//! # narrow CLI
//!
//! Command-line host for narrow - incremental narrowing search.
//!
//! ## Usage
//!
//! - `narrow foo` - Search the current project for `foo` with rg
//! - `narrow foo !test` - Same, dropping rows that contain `test`
//! - `narrow --provider file --file src/lib.rs fn` - Narrow one file
//! - `narrow providers` - Show available providers
//! - `narrow history search` - Show recorded queries

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{history_command, providers_command, search_command, SearchArgs};
use config::CliConfigLoader;

/// narrow - Incremental narrowing search over buffers, files and projects
#[derive(Parser)]
#[command(name = "narrow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental narrowing search over buffers, files and projects")]
#[command(long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// History file location
    #[arg(long, env = "NARROW_HISTORY_FILE", global = true)]
    history_file: Option<PathBuf>,

    #[command(flatten)]
    search: SearchArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available providers
    Providers,

    /// Show recorded queries
    History {
        /// Only show this provider's history
        provider: Option<String>,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    let search = &cli.search;
    if let Some(searcher) = search.searcher {
        loader = loader.with_searcher_override(searcher);
    }
    if search.regex {
        loader = loader.with_use_regex_override(true);
    }
    if search.whole_word {
        loader = loader.with_whole_word_override(true);
    }
    if search.ignore_case {
        loader = loader.with_ignore_case_override(true);
    }
    if search.column {
        loader = loader.with_column_override(true);
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only rows
    narrow_core::init_tracing_with_debug(cli.verbose);

    let config_loader = build_config_loader(&cli);
    let history_file = cli.history_file.clone();

    match cli.command {
        Some(Commands::Providers) => providers_command().await,
        Some(Commands::History { provider }) => {
            history_command(config_loader, history_file, provider).await
        }
        None => search_command(cli.search, config_loader, history_file).await,
    }
}
