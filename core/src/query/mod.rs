//! Query handling: segmentation, filter compilation and search options

pub mod filter_spec;
pub mod parser;
pub mod search_options;
pub mod sensitivity;

pub use filter_spec::{FilterOptions, FilterSpec, Matcher};
pub use parser::{parse_query, FilterToken, ParseOptions, ParsedQuery, TokenKind};
pub use search_options::{build_search_regex, SearchOptions, SearchToggle};
pub use sensitivity::Sensitivity;
