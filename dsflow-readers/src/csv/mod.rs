//! Delimited-text source with schema inference
//!
//! This module provides a restartable CSV source. Each traversal opens the
//! file afresh and parses rows lazily, one record per pull.

mod parser;
mod reader;

pub use parser::CsvParser;
pub use reader::{CsvOptions, CsvReader, CsvSource};
