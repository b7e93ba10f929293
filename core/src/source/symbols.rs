//! Definition outline of a buffer

use super::{char_column, BatchSink, ItemSource, SourceCapabilities, SourceContext};
use crate::error::Result;
use crate::host::HostBuffer;
use crate::item::{Item, Point, Range};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, Mutex};

/// Definitions recognised when no pattern is supplied; `name` is the symbol
pub const DEFAULT_SYMBOL_PATTERN: &str = concat!(
    r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?",
    r"(?:fn|struct|enum|trait|mod|type|const|static|macro_rules!|class|def|function|interface)",
    r"\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
);

/// Lists definition lines; results are reused while the buffer revision is unchanged
pub struct SymbolSource {
    buffer: Arc<dyn HostBuffer>,
    pattern: Regex,
    cache: Mutex<Option<(u64, Vec<Item>)>>,
}

impl SymbolSource {
    pub fn new(buffer: Arc<dyn HostBuffer>) -> Result<Self> {
        Self::with_pattern(buffer, DEFAULT_SYMBOL_PATTERN)
    }

    pub fn with_pattern(buffer: Arc<dyn HostBuffer>, pattern: &str) -> Result<Self> {
        Ok(Self {
            buffer,
            pattern: Regex::new(pattern)?,
            cache: Mutex::new(None),
        })
    }

    fn collect(&self) -> Vec<Item> {
        let file_path = self.buffer.file_path();
        let mut items = Vec::new();

        for row in 0..self.buffer.line_count() as u32 {
            let Some(line) = self.buffer.line_text(row) else {
                continue;
            };
            let Some(captures) = self.pattern.captures(&line) else {
                continue;
            };
            let Some(name) = captures.name("name").or_else(|| captures.get(0)) else {
                continue;
            };

            let start = Point::new(row, char_column(&line, name.start()));
            let end = Point::new(row, char_column(&line, name.end()));
            let mut item = Item::new(line.trim_end(), start).with_range(Range::new(start, end));
            item.file_path = file_path.clone();
            items.push(item);
        }

        items
    }
}

#[async_trait]
impl ItemSource for SymbolSource {
    fn name(&self) -> &str {
        "symbols"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            show_line_header: true,
            bound_to_single_file: true,
            ..Default::default()
        }
    }

    fn max_row(&self) -> Option<u32> {
        Some(self.buffer.last_row())
    }

    async fn get_items(&self, _context: SourceContext, sink: BatchSink) -> Result<()> {
        let revision = self.buffer.revision();
        let cached = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache
                .as_ref()
                .filter(|(cached_revision, _)| *cached_revision == revision)
                .map(|(_, items)| items.clone())
        };

        let items = match cached {
            Some(items) => {
                tracing::debug!("Reusing {} symbols for revision {}", items.len(), revision);
                items
            }
            None => {
                let items = self.collect();
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                *cache = Some((revision, items.clone()));
                items
            }
        };

        sink.send_batch(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TextBuffer;
    use crate::source::SourceEvent;
    use tokio::sync::mpsc;

    async fn symbols(source: &SymbolSource) -> Vec<Item> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        source
            .get_items(SourceContext::default(), BatchSink::new(1, tx))
            .await
            .unwrap();
        match rx.recv().await.unwrap().event {
            SourceEvent::Batch(items) => items,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_symbols_follow_buffer_revision() {
        let buffer = Arc::new(TextBuffer::from_text(
            "use std::io;\npub fn open() {}\nstruct Point;\n",
        ));
        let source = SymbolSource::new(buffer.clone()).unwrap();

        let items = symbols(&source).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].point, Point::new(1, 7));
        assert_eq!(items[1].text, "struct Point;");

        buffer.set_text("enum Kind {}\n");
        let items = symbols(&source).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].range.unwrap().end, Point::new(0, 9));
    }

    #[test]
    fn test_invalid_pattern() {
        let buffer = Arc::new(TextBuffer::from_text(""));
        assert!(SymbolSource::with_pattern(buffer, "(").is_err());
    }
}
