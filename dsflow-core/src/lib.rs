//! Core data model, error taxonomy, and source traits for dsflow pipelines
//!
//! This crate provides the foundational pieces every pipeline stage builds
//! upon: values, column specs and schemas, records and batches, the
//! restartable record source abstraction, and execution configuration.

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod error;
pub mod record;
pub mod schema;
pub mod source;
pub mod value;

// Re-export key types for convenience
pub use batch::{Batch, Element};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use record::Record;
pub use schema::{ColumnSpec, ColumnType, Schema};
pub use source::{MemorySource, RangeSource, RecordReader, RecordSource};
pub use value::Value;
