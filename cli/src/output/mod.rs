//! Terminal output for narrow results

pub mod printer;

pub use printer::{OutputFormat, RowPrinter};
