//! Configuration for narrow

pub mod history;
pub mod settings;

pub use history::{HistoryStore, ProviderHistory};
pub use settings::{NarrowSettings, SearchSettings, Searcher};
