//! Query history listing command

use crate::config::CliConfigLoader;
use anyhow::{Context, Result};
use colored::Colorize;
use narrow_core::config::ProviderHistory;
use narrow_core::HistoryStore;
use std::path::PathBuf;

/// Show recorded queries, most recent first
pub async fn history_command(
    config_loader: CliConfigLoader,
    history_file: Option<PathBuf>,
    provider: Option<String>,
) -> Result<()> {
    let settings = config_loader.load().await?;
    let path = history_file.unwrap_or_else(HistoryStore::default_history_path);
    let history = HistoryStore::load(&path, settings.history_max_entries)
        .await
        .with_context(|| format!("Failed to load history from {}", path.display()))?;

    match provider {
        Some(name) => match history.get(&name) {
            Some(entries) => print_entries(entries, false),
            None => println!("No history for provider '{}'", name),
        },
        None if history.providers().is_empty() => println!("No history recorded"),
        None => {
            for entries in history.providers() {
                print_entries(entries, true);
            }
        }
    }

    Ok(())
}

fn print_entries(history: &ProviderHistory, with_name: bool) {
    if with_name {
        println!("{}", history.name.bold());
    }
    for (index, entry) in history.entries.iter().enumerate() {
        println!("{:>4}  {}", index, entry);
    }
}
