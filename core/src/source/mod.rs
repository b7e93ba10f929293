//! Item sources: producers of raw candidate items
//!
//! A source runs inside a spawned task and reports through a [`BatchSink`].
//! Every message carries the generation of the refresh that started it, so
//! the controller can tell late messages of a cancelled refresh apart from
//! current ones.

pub mod buffer_scan;
pub mod external;
pub mod file_scan;
pub mod symbols;

pub use buffer_scan::BufferScanSource;
pub use external::ExternalSearchSource;
pub use file_scan::FileScanSource;
pub use symbols::SymbolSource;

use crate::error::Result;
use crate::item::{Item, Point, Range};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Refresh generation counter value
pub type Generation = u64;

/// What a source produces and which reducer stages apply to its items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// The source cannot run without a compiled search regex
    pub needs_search_regex: bool,

    /// The first query token is the search term, the rest is the filter
    pub first_query_as_search_term: bool,

    pub show_line_header: bool,
    pub show_project_header: bool,
    pub show_file_header: bool,

    /// Items can be narrowed by a "select files" path filter
    pub support_file_path_filter: bool,

    /// All items come from one buffer
    pub bound_to_single_file: bool,

    /// The source can re-run for a single file only
    pub supports_file_scoped_refresh: bool,
}

/// Inputs of one `get_items` call
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub search_term: String,
    pub search_regex: Option<Regex>,
    pub ignore_case: bool,

    /// Restrict the run to this file (partial refresh)
    pub file_path: Option<PathBuf>,
}

/// Events a source reports for one run
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Batch(Vec<Item>),
    /// External tool missing; the run yields zero items
    Unavailable { tool: String },
    Failed { message: String },
    Complete,
}

/// A source event tagged with its refresh generation
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub generation: Generation,
    pub event: SourceEvent,
}

/// Channel end handed to a running source
#[derive(Debug, Clone)]
pub struct BatchSink {
    generation: Generation,
    sender: mpsc::UnboundedSender<SourceMessage>,
}

impl BatchSink {
    pub fn new(generation: Generation, sender: mpsc::UnboundedSender<SourceMessage>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn send(&self, event: SourceEvent) -> bool {
        self.sender
            .send(SourceMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Emit a batch; returns false once the receiving side is gone
    pub fn send_batch(&self, items: Vec<Item>) -> bool {
        self.send(SourceEvent::Batch(items))
    }

    pub fn unavailable<S: Into<String>>(&self, tool: S) -> bool {
        self.send(SourceEvent::Unavailable { tool: tool.into() })
    }

    pub fn complete(&self) -> bool {
        self.send(SourceEvent::Complete)
    }

    pub fn fail<S: Into<String>>(&self, message: S) -> bool {
        self.send(SourceEvent::Failed {
            message: message.into(),
        })
    }
}

/// Reports completion when a source run finishes, or failure if it is
/// dropped first (panic or abort)
pub(crate) struct CompletionGuard {
    sink: Option<BatchSink>,
}

impl CompletionGuard {
    pub(crate) fn new(sink: BatchSink) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn finish(mut self, result: Result<()>) {
        if let Some(sink) = self.sink.take() {
            match result {
                Ok(()) => sink.complete(),
                Err(e) => sink.fail(e.to_string()),
            };
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.fail("source stopped before completing");
        }
    }
}

/// Polymorphic producer of raw items
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    fn capabilities(&self) -> SourceCapabilities;

    /// Largest row known before items arrive (single-buffer sources)
    fn max_row(&self) -> Option<u32> {
        None
    }

    /// Produce items into `sink`, one batch or many
    async fn get_items(&self, context: SourceContext, sink: BatchSink) -> Result<()>;

    /// Release resources held outside the running task
    fn cancel(&self) {}
}

/// Character column of a byte offset
pub(crate) fn char_column(text: &str, byte_offset: usize) -> u32 {
    text.get(..byte_offset)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(0) as u32
}

/// Turn `(row, line)` pairs into items
///
/// Without a regex every line becomes one item; with one, every match does.
pub(crate) fn scan_lines<I>(lines: I, regex: Option<&Regex>, file_path: Option<&Path>) -> Vec<Item>
where
    I: IntoIterator<Item = (u32, String)>,
{
    let mut items = Vec::new();

    for (row, line) in lines {
        match regex {
            None => {
                let mut item = Item::new(line, Point::new(row, 0));
                item.file_path = file_path.map(Path::to_path_buf);
                items.push(item);
            }
            Some(regex) => {
                let matches: Vec<_> = regex
                    .find_iter(&line)
                    .filter(|m| !m.is_empty())
                    .map(|m| (m.start(), m.end()))
                    .collect();
                for (start, end) in matches {
                    let start = Point::new(row, char_column(&line, start));
                    let end = Point::new(row, char_column(&line, end));
                    let mut item =
                        Item::new(line.clone(), start).with_range(Range::new(start, end));
                    item.file_path = file_path.map(Path::to_path_buf);
                    items.push(item);
                }
            }
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_lines_without_regex() {
        let lines = vec![(0, "apple".to_string()), (1, "grape".to_string())];
        let items = scan_lines(lines, None, None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].point, Point::new(1, 0));
        assert!(items[1].range.is_none());
    }

    #[test]
    fn test_scan_lines_one_item_per_match() {
        let regex = Regex::new("ab").unwrap();
        let lines = vec![(3, "xab ab".to_string()), (4, "none".to_string())];
        let items = scan_lines(lines, Some(&regex), Some(Path::new("f.txt")));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].point, Point::new(3, 1));
        assert_eq!(items[1].range.unwrap().end, Point::new(3, 6));
        assert_eq!(items[0].file_path.as_deref(), Some(Path::new("f.txt")));
    }

    #[test]
    fn test_char_column_counts_chars() {
        assert_eq!(char_column("日本x", "日本".len()), 2);
        assert_eq!(char_column("abc", 10), 0);
    }

    #[tokio::test]
    async fn test_guard_reports_failure_when_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = CompletionGuard::new(BatchSink::new(7, tx));
        drop(guard);
        let message = rx.recv().await.unwrap();
        assert_eq!(message.generation, 7);
        assert!(matches!(message.event, SourceEvent::Failed { .. }));
    }
}
