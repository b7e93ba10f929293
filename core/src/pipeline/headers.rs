//! Header and line-header text

use crate::error::{ConfigError, Result};
use crate::host::Project;
use handlebars::Handlebars;
use serde_json::json;
use std::path::Path;

const PROJECT_TEMPLATE: &str = "project_header";
const FILE_TEMPLATE: &str = "file_header";

/// Compiled project/file header templates
#[derive(Debug, Clone)]
pub struct HeaderTemplates {
    registry: Handlebars<'static>,
}

impl HeaderTemplates {
    pub fn new(project_template: &str, file_template: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        let templates = [
            (PROJECT_TEMPLATE, project_template),
            (FILE_TEMPLATE, file_template),
        ];
        for (name, template) in templates {
            registry
                .register_template_string(name, template)
                .map_err(|e| ConfigError::InvalidTemplate {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(Self { registry })
    }

    pub fn render_project(&self, project: &Project) -> String {
        let data = json!({
            "name": project.name,
            "root": project.root.display().to_string(),
        });
        self.registry
            .render(PROJECT_TEMPLATE, &data)
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to render project header: {}", e);
                project.name.clone()
            })
    }

    /// `relative_path` is the workspace-relative display path
    pub fn render_file(&self, relative_path: &str, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = json!({ "path": relative_path, "name": name });
        self.registry.render(FILE_TEMPLATE, &data).unwrap_or_else(|e| {
            tracing::warn!("Failed to render file header: {}", e);
            relative_path.to_string()
        })
    }
}

impl Default for HeaderTemplates {
    fn default() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        // the built-in templates are known to parse
        let _ = registry.register_template_string(PROJECT_TEMPLATE, "# {{name}}");
        let _ = registry.register_template_string(FILE_TEMPLATE, "## {{path}}");
        Self { registry }
    }
}

/// Padding widths for the `<row>: ` / `<row>:<col>: ` prefix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineHeaderWidth {
    pub row: usize,
    pub column: Option<usize>,
}

const MIN_COLUMN_WIDTH: usize = 3;

impl LineHeaderWidth {
    /// Widths for the largest zero-based row/column seen
    pub fn for_max(max_row: u32, max_column: Option<u32>) -> Self {
        Self {
            row: digits(max_row as u64 + 1),
            column: max_column.map(|column| digits(column as u64 + 1).max(MIN_COLUMN_WIDTH)),
        }
    }

    /// One-based, left-padded prefix for a zero-based row/column
    pub fn format(&self, row: u32, column: u32) -> String {
        match self.column {
            Some(width) => format!(
                "{:>row_width$}:{:>width$}: ",
                row + 1,
                column + 1,
                row_width = self.row,
                width = width
            ),
            None => format!("{:>width$}: ", row + 1, width = self.row),
        }
    }
}

fn digits(value: u64) -> usize {
    value.to_string().len()
}
