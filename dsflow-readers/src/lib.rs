//! File-backed record sources for dsflow pipelines
//!
//! This crate provides restartable sources for delimited text (with
//! schema inference) and plain text lines. Every source re-opens its file
//! per traversal and releases the handle when the reader is dropped.

pub mod common;
pub mod csv;
pub mod text;

pub use crate::csv::{CsvOptions, CsvParser, CsvReader, CsvSource};
pub use common::SchemaInference;
pub use text::{TextLineOptions, TextLineSource};

// Re-export core types
pub use dsflow_core::{ColumnSpec, ColumnType, Error, RecordReader, RecordSource, Result, Schema};
