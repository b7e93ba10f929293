//! Line/match scan over a file on disk

use super::{scan_lines, BatchSink, ItemSource, SourceCapabilities, SourceContext};
use crate::error::Result;
use crate::host::split_lines;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

const UNREAD: u32 = u32::MAX;

/// Reads a file and scans it the way [`super::BufferScanSource`] scans a buffer
pub struct FileScanSource {
    path: PathBuf,
    last_row: AtomicU32,
}

impl FileScanSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            last_row: AtomicU32::new(UNREAD),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemSource for FileScanSource {
    fn name(&self) -> &str {
        "file"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            first_query_as_search_term: true,
            show_line_header: true,
            bound_to_single_file: true,
            ..Default::default()
        }
    }

    /// Last row of the file as of the latest read
    fn max_row(&self) -> Option<u32> {
        match self.last_row.load(Ordering::Acquire) {
            UNREAD => None,
            row => Some(row),
        }
    }

    async fn get_items(&self, context: SourceContext, sink: BatchSink) -> Result<()> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let lines = split_lines(&content);
        let last_row = lines.len().saturating_sub(1).min(UNREAD as usize - 1) as u32;
        self.last_row.store(last_row, Ordering::Release);

        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(row, text)| (row as u32, text));

        let items = scan_lines(lines, context.search_regex.as_ref(), Some(&self.path));
        tracing::debug!("Scanned {:?}: {} items", self.path, items.len());
        sink.send_batch(items);
        Ok(())
    }
}
