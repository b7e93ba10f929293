//! One-shot narrowing search

use crate::config::{expand_path, CliConfigLoader};
use crate::output::{OutputFormat, RowPrinter};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use narrow_core::{
    HistoryStore, NarrowEvent, ProjectSet, ProviderRegistry, RefreshController, Searcher,
    SourceFactoryContext, TextBuffer,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Query: search term followed by include / `!exclude` filter tokens
    pub query: Vec<String>,

    /// Provider producing the items (see `narrow providers`)
    #[arg(short, long, default_value = "search")]
    pub provider: String,

    /// File for the scan, file and symbols providers; scopes `search` to one file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Project root; may be repeated (defaults to the working directory)
    #[arg(long = "project")]
    pub projects: Vec<PathBuf>,

    /// Treat the search term as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Match the search term on word boundaries
    #[arg(short, long)]
    pub whole_word: bool,

    /// Ignore case for both the search term and filter tokens
    #[arg(short, long)]
    pub ignore_case: bool,

    /// External searcher (rg or ag)
    #[arg(long)]
    pub searcher: Option<Searcher>,

    /// Show the column in line headers
    #[arg(long)]
    pub column: bool,

    /// Keep only files whose project-relative path matches this query
    #[arg(long)]
    pub select_files: Option<String>,

    /// Drop every item from this file; may be repeated
    #[arg(long = "exclude")]
    pub excludes: Vec<PathBuf>,

    /// Print normal items as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Do not record the query in history
    #[arg(long)]
    pub no_history: bool,
}

impl SearchArgs {
    fn query(&self) -> String {
        self.query.join(" ")
    }
}

/// Run one refresh cycle and print the resulting rows
pub async fn search_command(
    args: SearchArgs,
    config_loader: CliConfigLoader,
    history_file: Option<PathBuf>,
) -> Result<()> {
    let settings = config_loader.load().await?;
    let cwd = std::env::current_dir().context("Failed to read working directory")?;

    let roots: Vec<PathBuf> = if args.projects.is_empty() {
        vec![cwd.clone()]
    } else {
        args.projects
            .iter()
            .map(|p| absolutize(&cwd, &expand_path(p)))
            .collect()
    };
    debug!("Project roots: {:?}", roots);

    let mut context = SourceFactoryContext::new(Arc::new(ProjectSet::new(roots)), settings.clone());
    let file = args.file.as_ref().map(|f| absolutize(&cwd, &expand_path(f)));
    if let Some(path) = &file {
        if matches!(args.provider.as_str(), "scan" | "symbols") {
            let buffer = TextBuffer::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            context = context.with_buffer(Arc::new(buffer));
        }
        context = context.with_file_path(path.clone());
    }

    let registry = ProviderRegistry::default();
    let mut narrow = registry.create_controller(&args.provider, &context)?;
    let mut events = narrow.events().subscribe();

    let query = args.query();
    let mut options = narrow.set_query(&query).refresh_options();
    if args.provider == "search" {
        options.file_path = file.clone();
    }

    for excluded in &args.excludes {
        narrow.exclude_file(absolutize(&cwd, &expand_path(excluded)));
    }
    if let Some(selection) = &args.select_files {
        narrow.set_file_filter(selection);
    }

    info!("Narrowing with provider '{}': {:?}", args.provider, query);
    narrow.refresh(options).await?;

    loop {
        match events.try_recv() {
            Ok(NarrowEvent::Warning { message }) => {
                eprintln!("{} {}", "warning:".yellow().bold(), message);
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    print_rows(&narrow, &args)?;

    if !args.no_history && !query.trim().is_empty() {
        record_history(history_file, settings.history_max_entries, &args.provider, &query).await;
    }

    narrow.destroy();
    Ok(())
}

fn print_rows(narrow: &RefreshController, args: &SearchArgs) -> Result<()> {
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let stdout = std::io::stdout();
    let printer = RowPrinter::new(
        format,
        narrow.settings().max_item_text_length,
        narrow.settings().truncation_indicator.clone(),
    )
    .with_color(!args.json && stdout.is_terminal());

    let mut out = stdout.lock();
    let written = printer.print_store(narrow.store(), &mut out)?;
    debug!("Printed {} rows", written);
    Ok(())
}

async fn record_history(path: Option<PathBuf>, max_entries: usize, provider: &str, query: &str) {
    let path = path.unwrap_or_else(HistoryStore::default_history_path);
    let mut history = match HistoryStore::load(&path, max_entries).await {
        Ok(history) => history,
        Err(e) => {
            warn!("Failed to load history from {}: {}", path.display(), e);
            return;
        }
    };

    history.record(provider, query);
    if let Err(e) = history.save_if_needed().await {
        warn!("Failed to save history to {}: {}", path.display(), e);
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_tokens_are_joined() {
        let args = SearchArgs {
            query: vec!["foo".to_string(), "!bar".to_string()],
            ..Default::default()
        };
        assert_eq!(args.query(), "foo !bar");
    }

    #[test]
    fn test_absolutize_relative_path() {
        let cwd = Path::new("/work");
        assert_eq!(absolutize(cwd, Path::new("src/lib.rs")), PathBuf::from("/work/src/lib.rs"));
        assert_eq!(absolutize(cwd, Path::new("/etc/hosts")), PathBuf::from("/etc/hosts"));
    }
}
