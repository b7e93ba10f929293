//! Project-wide search through an external searcher process (`rg`/`ag`)
//!
//! The searcher runs once per project root with `--vimgrep` output. Stdout is
//! parsed line by line and forwarded in batches of `batch_size`, so items
//! arrive in whatever order the processes produce them. Child processes are
//! spawned with `kill_on_drop`, so aborting the refresh task stops them.

use super::{char_column, BatchSink, ItemSource, SourceCapabilities, SourceContext};
use crate::config::{SearchSettings, Searcher};
use crate::error::{Result, SourceError};
use crate::host::{Project, ProjectResolver};
use crate::item::{Item, Point, Range};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

fn vimgrep_line_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+?):(\d+):(\d+):(.*)$").ok())
        .as_ref()
}

/// Runs the configured searcher over every project
pub struct ExternalSearchSource {
    resolver: Arc<dyn ProjectResolver>,
    settings: SearchSettings,
    program: String,
}

impl ExternalSearchSource {
    pub fn new(resolver: Arc<dyn ProjectResolver>, settings: SearchSettings) -> Self {
        let program = settings.searcher.command().to_string();
        Self {
            resolver,
            settings,
            program,
        }
    }

    /// Use a different executable with the searcher's argument conventions
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    fn build_args(&self, pattern: &str, ignore_case: bool, target: &str) -> Vec<String> {
        build_args(
            self.settings.searcher,
            &self.settings.extra_args,
            pattern,
            ignore_case,
            target,
        )
    }

    async fn search_project(
        &self,
        root: &Path,
        target: &str,
        context: &SourceContext,
        sink: &BatchSink,
    ) -> Result<usize> {
        let Some(regex) = context.search_regex.as_ref() else {
            return Ok(0);
        };
        let args = self.build_args(regex.as_str(), context.ignore_case, target);
        tracing::debug!("Running {} {:?} in {:?}", self.program, args, root);

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::Failed {
            message: format!("{} produced no stdout", self.program),
        })?;

        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut batch = Vec::with_capacity(self.settings.batch_size);
        let mut total = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            // matched lines are raw bytes from files in any encoding
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if let Some(item) = parse_vimgrep_line(line, root, regex) {
                batch.push(item);
            }
            if batch.len() >= self.settings.batch_size {
                total += batch.len();
                if !sink.send_batch(std::mem::take(&mut batch)) {
                    return Ok(total);
                }
            }
        }
        if !batch.is_empty() {
            total += batch.len();
            sink.send_batch(batch);
        }

        let status = child.wait().await?;
        // rg and ag exit with 1 when nothing matched
        if !status.success() && status.code() != Some(1) {
            tracing::warn!("{} exited with {} in {:?}", self.program, status, root);
        }
        Ok(total)
    }

    async fn search_roots(
        &self,
        targets: Vec<(PathBuf, String)>,
        context: &SourceContext,
        sink: &BatchSink,
    ) {
        let report = |root: &Path, result: Result<usize>| match result {
            Ok(count) => tracing::debug!("{:?}: {} items", root, count),
            Err(e) => tracing::warn!("Search in {:?} failed: {}", root, e),
        };

        if self.settings.serialize_projects {
            for (root, target) in &targets {
                let result = self.search_project(root, target, context, sink).await;
                report(root.as_path(), result);
            }
        } else {
            let searches = targets.iter().map(|(root, target)| async move {
                (root, self.search_project(root, target, context, sink).await)
            });
            for (root, result) in futures::future::join_all(searches).await {
                report(root.as_path(), result);
            }
        }
    }
}

#[async_trait]
impl ItemSource for ExternalSearchSource {
    fn name(&self) -> &str {
        "search"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            needs_search_regex: true,
            first_query_as_search_term: true,
            show_line_header: true,
            show_project_header: self.resolver.projects().len() > 1,
            show_file_header: true,
            support_file_path_filter: true,
            bound_to_single_file: false,
            supports_file_scoped_refresh: true,
        }
    }

    async fn get_items(&self, context: SourceContext, sink: BatchSink) -> Result<()> {
        if which::which(&self.program).is_err() {
            tracing::warn!("Searcher {} not found on PATH", self.program);
            sink.unavailable(self.program.clone());
            return Ok(());
        }

        let targets: Vec<(PathBuf, String)> = match &context.file_path {
            Some(path) => {
                let root = self
                    .resolver
                    .project_for(path)
                    .map(|Project { root, .. }| root)
                    .or_else(|| path.parent().map(Path::to_path_buf))
                    .unwrap_or_else(|| PathBuf::from("."));
                vec![(root, path.display().to_string())]
            }
            None => self
                .resolver
                .projects()
                .into_iter()
                .map(|project| (project.root, ".".to_string()))
                .collect(),
        };

        self.search_roots(targets, &context, &sink).await;
        Ok(())
    }
}

/// Command line for one searcher invocation
pub fn build_args(
    searcher: Searcher,
    extra_args: &[String],
    pattern: &str,
    ignore_case: bool,
    target: &str,
) -> Vec<String> {
    let mut args: Vec<String> = match searcher {
        Searcher::Rg => vec!["--vimgrep".into(), "--color".into(), "never".into()],
        Searcher::Ag => vec!["--vimgrep".into(), "--nocolor".into()],
    };
    // both searchers spell the case flags the same way
    args.push(if ignore_case { "--ignore-case" } else { "--case-sensitive" }.into());
    args.extend(extra_args.iter().cloned());
    match searcher {
        Searcher::Rg => {
            args.push("--regexp".into());
            args.push(pattern.into());
        }
        Searcher::Ag => {
            args.push("--".into());
            args.push(pattern.into());
        }
    }
    args.push(target.into());
    args
}

/// Parse one `path:line:column:text` line; line and column are 1-based
pub fn parse_vimgrep_line(line: &str, root: &Path, regex: &Regex) -> Option<Item> {
    let captures = vimgrep_line_regex()?.captures(line)?;
    let path = captures.get(1)?.as_str();
    let row: u32 = captures.get(2)?.as_str().parse().ok()?;
    let byte_column: usize = captures.get(3)?.as_str().parse().ok()?;
    let text = captures.get(4)?.as_str();

    let relative = Path::new(path);
    let relative = relative.strip_prefix(".").unwrap_or(relative);
    let file_path = root.join(relative);

    let byte_start = byte_column.saturating_sub(1);
    let start = Point::new(row.saturating_sub(1), char_column(text, byte_start));
    let mut item = Item::new(text, start).with_file_path(file_path);

    if let Some(m) = regex
        .find_at(text, byte_start.min(text.len()))
        .filter(|m| m.start() == byte_start)
    {
        let end = Point::new(start.row, char_column(text, m.end()));
        item = item.with_range(Range::new(start, end));
    }

    Some(item)
}
