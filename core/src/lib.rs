//! # narrow Core
//!
//! Core library for narrow - incremental narrowing search over buffers,
//! files and projects.
//!
//! A query is split into a search term and include/exclude filter tokens.
//! An [`ItemSource`] produces candidate items, the [`ItemReducer`] filters
//! them and injects line/project/file headers, and the [`RefreshController`]
//! folds batches into an [`ItemStore`] with caching, cancellation and
//! selection restore.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod item;
pub mod pipeline;
pub mod query;
pub mod refresh;
pub mod registry;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use config::{HistoryStore, NarrowSettings, SearchSettings, Searcher};
pub use error::{Error, Result};
pub use events::{EventBus, NarrowEvent};
pub use host::{HostBuffer, Project, ProjectResolver, ProjectSet, TextBuffer};
pub use item::{Item, Point};
pub use pipeline::{ItemReducer, PipelineState};
pub use query::{FilterSpec, SearchOptions, Sensitivity};
pub use refresh::{RefreshController, RefreshOptions, RefreshPhase};
pub use registry::{ProviderRegistry, SourceFactoryContext};
pub use source::{ItemSource, SourceCapabilities};
pub use store::{Direction, ItemStore};

/// Current version of the narrow-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
