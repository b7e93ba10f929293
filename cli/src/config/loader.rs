//! CLI settings loader for narrow
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./narrow.json or ./.narrow/config.json
//! 3. Git repository root: <repo_root>/.narrow/config.json
//! 4. User config dir: $XDG_CONFIG_HOME/narrow/config.json
//! 5. Built-in defaults

use anyhow::{anyhow, Context, Result};
use narrow_core::{NarrowSettings, Searcher, Sensitivity};
use std::path::{Path, PathBuf};

/// CLI settings loader
#[derive(Debug, Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Directory the search starts from; the process cwd when unset
    base_dir: Option<PathBuf>,
    /// Flag overrides
    searcher_override: Option<Searcher>,
    use_regex_override: Option<bool>,
    whole_word_override: Option<bool>,
    ignore_case_override: Option<bool>,
    column_override: Option<bool>,
}

impl CliConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    pub fn with_searcher_override(mut self, searcher: Searcher) -> Self {
        self.searcher_override = Some(searcher);
        self
    }

    pub fn with_use_regex_override(mut self, use_regex: bool) -> Self {
        self.use_regex_override = Some(use_regex);
        self
    }

    pub fn with_whole_word_override(mut self, whole_word: bool) -> Self {
        self.whole_word_override = Some(whole_word);
        self
    }

    pub fn with_ignore_case_override(mut self, ignore_case: bool) -> Self {
        self.ignore_case_override = Some(ignore_case);
        self
    }

    pub fn with_column_override(mut self, column: bool) -> Self {
        self.column_override = Some(column);
        self
    }

    /// Load settings and apply flag overrides
    pub async fn load(&self) -> Result<NarrowSettings> {
        let mut settings = if let Some(override_path) = &self.config_override {
            let path = expand_path(override_path);
            self.load_from_path(&path).await.with_context(|| {
                format!("Failed to load config from override path: {}", path.display())
            })?
        } else {
            self.search_and_load().await?
        };

        if let Some(searcher) = self.searcher_override {
            settings.search.searcher = searcher;
        }
        if let Some(use_regex) = self.use_regex_override {
            settings.search_use_regex = use_regex;
        }
        if let Some(whole_word) = self.whole_word_override {
            settings.search_whole_word = whole_word;
        }
        if let Some(true) = self.ignore_case_override {
            settings.case_sensitivity_for_search_term = Sensitivity::Insensitive;
            settings.case_sensitivity_for_narrow_query = Sensitivity::Insensitive;
        }
        if let Some(column) = self.column_override {
            settings.show_column_on_line_header = column;
        }

        settings
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;
        Ok(settings)
    }

    fn base_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Search for settings in priority order
    async fn search_and_load(&self) -> Result<NarrowSettings> {
        let base = self.base_dir()?;

        for candidate in [base.join("narrow.json"), base.join(".narrow").join("config.json")] {
            if candidate.exists() {
                return self.load_file(&candidate).await;
            }
        }

        if let Some(git_root) = find_git_root(&base) {
            let config_path = git_root.join(".narrow").join("config.json");
            if config_path.exists() {
                return self.load_file(&config_path).await;
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("narrow").join("config.json");
            if config_path.exists() {
                return self.load_file(&config_path).await;
            }
        }

        tracing::debug!("No settings file found, using defaults");
        Ok(NarrowSettings::default())
    }

    /// Load settings from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<NarrowSettings> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    async fn load_file(&self, path: &Path) -> Result<NarrowSettings> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        tracing::debug!("Loading settings from {}", path.display());
        NarrowSettings::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// Nearest ancestor of `start` containing `.git`
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cwd_file_wins_over_git_root() {
        let dir = tempdir().unwrap();
        let repo = dir.path();
        let nested = repo.join("sub");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::create_dir_all(repo.join(".narrow")).unwrap();
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            repo.join(".narrow").join("config.json"),
            r#"{ "refresh_delay_ms": 5 }"#,
        )
        .unwrap();

        let settings = CliConfigLoader::new()
            .with_base_dir(nested.clone())
            .load()
            .await
            .unwrap();
        assert_eq!(settings.refresh_delay_ms, 5);

        std::fs::write(nested.join("narrow.json"), r#"{ "refresh_delay_ms": 7 }"#).unwrap();
        let settings = CliConfigLoader::new()
            .with_base_dir(nested)
            .load()
            .await
            .unwrap();
        assert_eq!(settings.refresh_delay_ms, 7);
    }

    #[tokio::test]
    async fn test_flag_overrides_apply_last() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("custom.json");
        std::fs::write(
            &config,
            r#"{ "search_use_regex": false, "search": { "searcher": "rg" } }"#,
        )
        .unwrap();

        let settings = CliConfigLoader::new()
            .with_config_override(config)
            .with_use_regex_override(true)
            .with_searcher_override(Searcher::Ag)
            .with_ignore_case_override(true)
            .load()
            .await
            .unwrap();
        assert!(settings.search_use_regex);
        assert_eq!(settings.search.searcher, Searcher::Ag);
        assert_eq!(settings.case_sensitivity_for_search_term, Sensitivity::Insensitive);
    }

    #[tokio::test]
    async fn test_override_directory_without_config() {
        let dir = tempdir().unwrap();
        let result = CliConfigLoader::new()
            .with_config_override(dir.path().to_path_buf())
            .load()
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_path(Path::new("~/projects"));
        assert!(!expanded.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }
}
