//! Line/match scan over an open buffer

use super::{scan_lines, BatchSink, ItemSource, SourceCapabilities, SourceContext};
use crate::error::Result;
use crate::host::HostBuffer;
use async_trait::async_trait;
use std::sync::Arc;

/// Emits one item per line, or one per search match when a term is set
pub struct BufferScanSource {
    buffer: Arc<dyn HostBuffer>,
}

impl BufferScanSource {
    pub fn new(buffer: Arc<dyn HostBuffer>) -> Self {
        Self { buffer }
    }
}

#[async_trait]
impl ItemSource for BufferScanSource {
    fn name(&self) -> &str {
        "scan"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            first_query_as_search_term: true,
            show_line_header: true,
            bound_to_single_file: true,
            ..Default::default()
        }
    }

    fn max_row(&self) -> Option<u32> {
        Some(self.buffer.last_row())
    }

    async fn get_items(&self, context: SourceContext, sink: BatchSink) -> Result<()> {
        let file_path = self.buffer.file_path();
        let lines = (0..self.buffer.line_count() as u32)
            .filter_map(|row| self.buffer.line_text(row).map(|text| (row, text)));

        let items = scan_lines(lines, context.search_regex.as_ref(), file_path.as_deref());
        tracing::debug!("Buffer scan produced {} items", items.len());
        sink.send_batch(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TextBuffer;
    use crate::source::SourceEvent;
    use regex::Regex;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_scan_emits_single_batch() {
        let buffer = Arc::new(TextBuffer::from_text("apple\ngrape\nlemmon\n"));
        let source = BufferScanSource::new(buffer);
        assert_eq!(source.max_row(), Some(2));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let context = SourceContext {
            search_regex: Some(Regex::new("p").unwrap()),
            ..Default::default()
        };
        source
            .get_items(context, BatchSink::new(1, tx))
            .await
            .unwrap();

        match rx.recv().await.unwrap().event {
            SourceEvent::Batch(items) => {
                // "apple" matches twice, "grape" once
                assert_eq!(items.len(), 3);
                assert_eq!(items[2].point.row, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
