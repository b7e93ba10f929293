//! Row printing: plain, colored or JSON lines

use anyhow::Result;
use colored::Colorize;
use narrow_core::store::RenderedRow;
use narrow_core::{Item, ItemStore};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writes the rows of an item store
#[derive(Debug, Clone)]
pub struct RowPrinter {
    format: OutputFormat,
    color: bool,
    max_width: usize,
    indicator: String,
}

impl RowPrinter {
    pub fn new(format: OutputFormat, max_width: usize, indicator: String) -> Self {
        Self {
            format,
            color: false,
            max_width,
            indicator,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Print every row after the prompt; returns the number written
    pub fn print_store<W: Write>(&self, store: &ItemStore, out: &mut W) -> Result<usize> {
        let mut written = 0;
        for row in 1..store.len() {
            let Some(item) = store.item_for_row(row) else {
                continue;
            };
            if let Some(line) = self.format_row(store, item)? {
                writeln!(out, "{}", line)?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn format_row(&self, store: &ItemStore, item: &Item) -> Result<Option<String>> {
        match self.format {
            // headers carry no location of their own
            OutputFormat::Json if item.is_header() => Ok(None),
            OutputFormat::Json => Ok(Some(serde_json::to_string(item)?)),
            OutputFormat::Text => Ok(store
                .render_row(item.row, self.max_width, &self.indicator)
                .map(|rendered| self.paint(&rendered, item))),
        }
    }

    fn paint(&self, rendered: &RenderedRow, item: &Item) -> String {
        if !self.color {
            return rendered.text.clone();
        }

        if item.is_project_header() {
            return rendered.text.bold().blue().to_string();
        }
        if item.is_file_header() {
            return rendered.text.cyan().to_string();
        }

        match &item.line_header {
            Some(prefix) if rendered.text.starts_with(prefix.as_str()) => {
                let body = &rendered.text[prefix.len()..];
                format!("{}{}", prefix.dimmed(), body)
            }
            _ => rendered.text.clone(),
        }
    }
}
