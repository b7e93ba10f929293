//! Per-provider query history and its JSON persistence

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const HISTORY_FILE_NAME: &str = "history.json";

/// Saved queries of one provider, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHistory {
    pub name: String,
    pub entries: Vec<String>,
}

impl ProviderHistory {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a query; returns false for blank queries and repeats of the latest entry
    pub fn add_entry(&mut self, query: &str, max_entries: usize) -> bool {
        if query.trim().is_empty() {
            return false;
        }
        if self.entries.first().map(String::as_str) == Some(query) {
            return false;
        }

        self.entries.retain(|entry| entry != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(max_entries);
        true
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    /// Entry `index` steps back in time (0 = latest)
    pub fn recall(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }
}

/// All providers' histories backed by one JSON file
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    providers: Vec<ProviderHistory>,
    max_entries: usize,
    needs_save: bool,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P, max_entries: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            providers: Vec::new(),
            max_entries,
            needs_save: false,
        }
    }

    /// Get the default history file path
    pub fn default_history_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("narrow");
        path.push(HISTORY_FILE_NAME);
        path
    }

    /// Load from file; a missing or unreadable document starts empty
    pub async fn load<P: AsRef<Path>>(path: P, max_entries: usize) -> Result<Self> {
        let mut store = Self::new(path, max_entries);

        if !store.path.exists() {
            tracing::debug!("History file {:?} does not exist, starting empty", store.path);
            return Ok(store);
        }

        let content = fs::read_to_string(&store.path).await?;
        match serde_json::from_str::<Vec<ProviderHistory>>(&content) {
            Ok(mut providers) => {
                for provider in &mut providers {
                    provider.entries.truncate(max_entries);
                }
                tracing::debug!("Loaded history for {} providers", providers.len());
                store.providers = providers;
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable history file {:?}: {}", store.path, e);
            }
        }

        Ok(store)
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&self.providers)?;
        fs::write(&self.path, content).await?;
        tracing::debug!("Saved history for {} providers", self.providers.len());
        Ok(())
    }

    pub async fn save_if_needed(&mut self) -> Result<()> {
        if self.needs_save {
            self.save().await?;
            self.needs_save = false;
        }
        Ok(())
    }

    pub fn needs_save(&self) -> bool {
        self.needs_save
    }

    pub fn providers(&self) -> &[ProviderHistory] {
        &self.providers
    }

    pub fn get(&self, name: &str) -> Option<&ProviderHistory> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Record a query for a provider
    pub fn record(&mut self, name: &str, query: &str) -> bool {
        let max_entries = self.max_entries;
        let index = match self.providers.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.providers.push(ProviderHistory::new(name));
                self.providers.len() - 1
            }
        };

        let added = self.providers[index].add_entry(query, max_entries);
        if added {
            self.needs_save = true;
        }
        added
    }
}
