//! Lazy, pull-based dataset pipelines for ML input feeding
//!
//! A pipeline is built from a record source plus a chain of stages (map,
//! filter, shuffle, batch, repeat, take, skip). Building is free; a
//! [`DatasetIterator`] pulls elements one at a time through the chain and
//! signals the end of data with [`Error::OutOfRange`].
//!
//! ```no_run
//! use dsflow::{csv_dataset, CsvOptions, Parallelism};
//!
//! # fn main() -> dsflow::Result<()> {
//! let batches = csv_dataset("train.csv", CsvOptions::default())?
//!     .map_parallel(Ok, Parallelism::Autotune)?
//!     .shuffle(1024)?
//!     .batch(32, true)?
//!     .repeat(Some(10))?;
//!
//! for batch in batches.iterator() {
//!     let batch = batch?.into_batch()?;
//!     println!("{} records", batch.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod dataset;
pub mod iterator;
pub mod materialize;
mod stage;

pub use api::{
    batch_from_dataset, csv_dataset, dataset_map, input_fn_from_dataset, text_line_dataset, InputFn,
    PreparedIterator,
};
pub use dataset::{Dataset, FilterFn, MapFn, Parallelism};
pub use iterator::{DatasetIterator, IteratorState};
pub use materialize::{materialize, FeatureCollection, ResponseCollection};

// Re-export core and reader types
pub use dsflow_core::{
    Batch, ColumnSpec, ColumnType, Element, Error, MemorySource, PipelineConfig, RangeSource, Record,
    RecordReader, RecordSource, Result, Schema, Value,
};
pub use dsflow_readers::{CsvOptions, CsvSource, TextLineOptions, TextLineSource};
