//! Error types for dsflow pipelines

use std::io;
use thiserror::Error;

use crate::schema::ColumnType;

/// Result type for dsflow pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for dsflow pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// Column types could not be inferred from the sampled rows
    #[error("Schema inference failed for column '{column}': {message}")]
    SchemaInference {
        /// Column whose type is ambiguous
        column: String,
        /// What went wrong
        message: String,
    },

    /// A map or filter function failed on one record
    #[error("Transform failed on record {index}: {source}")]
    Transform {
        /// Index of the originating record in the stage's input stream
        index: u64,
        /// Failure reported by the user function
        #[source]
        source: anyhow::Error,
    },

    /// A selection referenced a column that does not exist
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// End of traversal
    #[error("End of sequence")]
    OutOfRange,

    /// A field could not be parsed as its declared type
    #[error("Line {line}: cannot parse '{value}' in column '{column}' as {expected}")]
    Parse {
        /// Line in the backing file
        line: u64,
        /// Column name
        column: String,
        /// Raw field text
        value: String,
        /// Declared type
        expected: ColumnType,
    },

    /// A field is empty or absent and its column has no default
    #[error("Line {line}: missing value for column '{column}' and no default declared")]
    MissingField {
        /// Line in the backing file
        line: u64,
        /// Column name
        column: String,
    },

    /// A row does not match the expected shape
    #[error("Line {line}: {message}")]
    Format {
        /// Line in the backing file
        line: u64,
        /// What went wrong
        message: String,
    },

    /// Records grouped together do not share a column layout
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A value has a different type than required
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Delimited-text reader error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The parallel map worker pool stopped unexpectedly
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Whether this error is the end-of-traversal signal rather than a fault
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OutOfRange)
    }

    /// Wrap a user function failure with the index of the record it came from
    pub fn transform(index: u64, source: impl Into<anyhow::Error>) -> Self {
        Error::Transform {
            index,
            source: source.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
