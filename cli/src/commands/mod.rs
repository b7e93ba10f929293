//! CLI command implementations

pub mod history;
pub mod providers;
pub mod search;

pub use history::history_command;
pub use providers::providers_command;
pub use search::{search_command, SearchArgs};
