//! Settings consulted by the query, pipeline and refresh layers

use crate::error::{ConfigError, Result};
use crate::query::Sensitivity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// External searcher used by the `search` provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Searcher {
    #[default]
    Rg,
    Ag,
}

impl Searcher {
    /// Executable name looked up on `PATH`
    pub fn command(&self) -> &'static str {
        match self {
            Searcher::Rg => "rg",
            Searcher::Ag => "ag",
        }
    }
}

impl std::str::FromStr for Searcher {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rg" | "ripgrep" => Ok(Searcher::Rg),
            "ag" => Ok(Searcher::Ag),
            other => Err(format!("unknown searcher: {}", other)),
        }
    }
}

/// Settings for the external-process search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub searcher: Searcher,

    /// Extra arguments appended to the searcher command line
    pub extra_args: Vec<String>,

    /// Number of parsed lines per emitted batch
    pub batch_size: usize,

    /// Search projects one after another instead of concurrently
    pub serialize_projects: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            searcher: Searcher::Rg,
            extra_args: Vec::new(),
            batch_size: 200,
            serialize_projects: false,
        }
    }
}

/// Top-level narrow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowSettings {
    pub case_sensitivity_for_search_term: Sensitivity,
    pub case_sensitivity_for_narrow_query: Sensitivity,
    pub negate_narrow_query_by_ending_exclamation: bool,

    /// Render `<row>:<col>: ` instead of `<row>: `
    pub show_column_on_line_header: bool,

    /// Display columns before the text is cut
    pub max_item_text_length: usize,
    pub truncation_indicator: String,

    /// Debounce between a keystroke and the refresh it triggers
    pub refresh_delay_ms: u64,

    /// Handlebars template; `name` and `root` are available
    pub project_header_template: String,

    /// Handlebars template; `path` (workspace-relative) and `name` are available
    pub file_header_template: String,

    pub search_whole_word: bool,
    pub search_use_regex: bool,

    pub search: SearchSettings,

    pub history_max_entries: usize,
}

impl Default for NarrowSettings {
    fn default() -> Self {
        Self {
            case_sensitivity_for_search_term: Sensitivity::Smartcase,
            case_sensitivity_for_narrow_query: Sensitivity::Smartcase,
            negate_narrow_query_by_ending_exclamation: false,
            show_column_on_line_header: false,
            max_item_text_length: 300,
            truncation_indicator: "…".to_string(),
            refresh_delay_ms: 100,
            project_header_template: "# {{name}}".to_string(),
            file_header_template: "## {{path}}".to_string(),
            search_whole_word: false,
            search_use_regex: false,
            search: SearchSettings::default(),
            history_max_entries: 100,
        }
    }
}

impl NarrowSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        let settings: NarrowSettings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.max_item_text_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_item_text_length".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn with_search_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.case_sensitivity_for_search_term = sensitivity;
        self
    }

    pub fn with_query_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.case_sensitivity_for_narrow_query = sensitivity;
        self
    }

    pub fn with_negate_by_ending_exclamation(mut self, enabled: bool) -> Self {
        self.negate_narrow_query_by_ending_exclamation = enabled;
        self
    }

    pub fn with_column_on_line_header(mut self, enabled: bool) -> Self {
        self.show_column_on_line_header = enabled;
        self
    }

    pub fn with_max_item_text_length(mut self, length: usize) -> Self {
        self.max_item_text_length = length;
        self
    }

    pub fn with_refresh_delay_ms(mut self, delay: u64) -> Self {
        self.refresh_delay_ms = delay;
        self
    }

    pub fn with_searcher(mut self, searcher: Searcher) -> Self {
        self.search.searcher = searcher;
        self
    }

    pub fn with_serialized_projects(mut self, serialize: bool) -> Self {
        self.search.serialize_projects = serialize;
        self
    }

    pub fn with_search_toggles(mut self, use_regex: bool, whole_word: bool) -> Self {
        self.search_use_regex = use_regex;
        self.search_whole_word = whole_word;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = NarrowSettings::from_json(
            r#"{ "show_column_on_line_header": true, "search": { "searcher": "ag" } }"#,
        )
        .unwrap();
        assert!(settings.show_column_on_line_header);
        assert_eq!(settings.search.searcher, Searcher::Ag);
        assert_eq!(settings.search.batch_size, 200);
        assert_eq!(settings.case_sensitivity_for_search_term, Sensitivity::Smartcase);
    }

    #[test]
    fn test_sensitivity_names() {
        let settings = NarrowSettings::from_json(
            r#"{ "case_sensitivity_for_narrow_query": "insensitive" }"#,
        )
        .unwrap();
        assert_eq!(
            settings.case_sensitivity_for_narrow_query,
            Sensitivity::Insensitive
        );
    }

    #[test]
    fn test_invalid_batch_size() {
        let result = NarrowSettings::from_json(r#"{ "search": { "batch_size": 0 } }"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = NarrowSettings::load(dir.path().join("none.json")).await;
        assert!(result.is_err());
    }
}
