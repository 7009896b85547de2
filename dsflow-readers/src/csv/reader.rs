//! Delimited-text source implementation

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dsflow_core::{ColumnSpec, Error, Record, RecordReader, RecordSource, Result, Schema};

use crate::common::{generated_names, open_input, SampleRow, SchemaInference};

use super::parser::CsvParser;

/// Options for delimited-text sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Whether the first row after `skip` is a header
    pub has_header: bool,

    /// Field delimiter
    pub delimiter: u8,

    /// Quote character
    pub quote: u8,

    /// Comment character; lines starting with it are ignored
    pub comment: Option<u8>,

    /// Whether to trim whitespace around fields
    pub trim: bool,

    /// Leading rows to ignore before the header or data
    pub skip: usize,

    /// Explicit column specs; disables inference
    pub column_specs: Option<Vec<ColumnSpec>>,

    /// Explicit column names; types are still inferred
    pub column_names: Option<Vec<String>>,

    /// Columns to keep, in output order
    pub select: Option<Vec<String>>,

    /// Maximum data rows sampled for type inference
    pub inference_rows: usize,

    /// Read through a memory map instead of buffered reads
    pub use_memory_mapping: bool,

    /// Buffer size for buffered reads
    pub buffer_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            comment: None,
            trim: false,
            skip: 0,
            column_specs: None,
            column_names: None,
            select: None,
            inference_rows: 1000,
            use_memory_mapping: false,
            buffer_size: 64 * 1024,
        }
    }
}

impl CsvOptions {
    /// Use explicit column specs
    #[must_use]
    pub fn with_column_specs(mut self, specs: Vec<ColumnSpec>) -> Self {
        self.column_specs = Some(specs);
        self
    }

    /// Use explicit column names and infer their types
    #[must_use]
    pub fn with_column_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.column_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Keep only the named columns, in the given order
    #[must_use]
    pub fn with_select<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the header flag
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the number of leading rows to ignore
    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Set the field delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .comment(self.comment)
            .has_headers(false)
            .flexible(true)
            .trim(if self.trim { Trim::All } else { Trim::None });
        builder
    }
}

/// A restartable source reading records from a delimited-text file
///
/// The schema is settled at construction: explicit specs are used as given,
/// otherwise names come from explicit names, the header row, or
/// `column_{i}`, and types are inferred from a sample of the data rows.
#[derive(Debug, Clone)]
pub struct CsvSource {
    /// Path to the file
    path: PathBuf,

    /// Source options
    options: CsvOptions,

    /// Row parser shared by every traversal
    parser: CsvParser,
}

impl CsvSource {
    /// Create a source over the file at `path`
    pub fn from_path<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if options.inference_rows == 0 && options.column_specs.is_none() {
            return Err(Error::InvalidArgument(
                "inference_rows must be at least 1 when no column specs are given".into(),
            ));
        }

        let mut reader = Self::open_positioned(&path, &options)?;
        let header = reader.header.take();

        let file_schema = match &options.column_specs {
            Some(specs) => Schema::new(specs.clone())?,
            None => Self::infer_schema(&mut reader, header, &options)?,
        };
        info!(path = %path.display(), schema = %file_schema, "resolved CSV schema");

        let projection = match &options.select {
            Some(names) => names
                .iter()
                .map(|name| file_schema.index_of(name))
                .collect::<Result<Vec<_>>>()?,
            None => (0..file_schema.len()).collect(),
        };
        let parser = CsvParser::new(Arc::new(file_schema), projection)?;

        Ok(Self { path, options, parser })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options this source was built with
    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    fn infer_schema(reader: &mut PositionedReader, header: Option<Vec<String>>, options: &CsvOptions) -> Result<Schema> {
        let mut samples = Vec::new();
        let mut row = StringRecord::new();
        while samples.len() < options.inference_rows && reader.csv.read_record(&mut row).map_err(csv_error)? {
            samples.push(SampleRow {
                line: line_of(&row),
                fields: row.iter().map(str::to_string).collect(),
            });
        }

        let names = match (&options.column_names, header) {
            (Some(names), _) => names.clone(),
            (None, Some(header)) => header,
            (None, None) => generated_names(samples.first().map_or(0, |r| r.fields.len())),
        };
        if names.is_empty() {
            return Err(Error::SchemaInference {
                column: String::new(),
                message: "no header, names, or data rows to infer columns from".into(),
            });
        }

        debug!(rows = samples.len(), columns = names.len(), "inferring CSV column types");
        SchemaInference::infer(&names, &samples)
    }

    /// Open the file and move past skipped rows and the header
    fn open_positioned(path: &Path, options: &CsvOptions) -> Result<PositionedReader> {
        let input = open_input(path, options.use_memory_mapping, options.buffer_size)?;
        let mut csv = options.reader_builder().from_reader(input);

        let mut row = StringRecord::new();
        for _ in 0..options.skip {
            if !csv.read_record(&mut row).map_err(csv_error)? {
                break;
            }
        }

        let header = if options.has_header && csv.read_record(&mut row).map_err(csv_error)? {
            Some(row.iter().map(str::to_string).collect())
        } else {
            None
        };

        Ok(PositionedReader { csv, header })
    }
}

impl RecordSource for CsvSource {
    fn schema(&self) -> Arc<Schema> {
        self.parser.schema().clone()
    }

    fn open(&self) -> Result<Box<dyn RecordReader>> {
        let reader = Self::open_positioned(&self.path, &self.options)?;
        debug!(path = %self.path.display(), "opened CSV traversal");

        Ok(Box::new(CsvReader {
            csv: reader.csv,
            parser: self.parser.clone(),
            row: StringRecord::new(),
        }))
    }
}

struct PositionedReader {
    csv: csv::Reader<Box<dyn Read + Send>>,
    header: Option<Vec<String>>,
}

/// Reader over one traversal of a [`CsvSource`]
///
/// Owns the open file; dropping it releases the handle.
pub struct CsvReader {
    /// Inner CSV reader
    csv: csv::Reader<Box<dyn Read + Send>>,

    /// Row parser
    parser: CsvParser,

    /// Reused row buffer
    row: StringRecord,
}

impl RecordReader for CsvReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        if !self.csv.read_record(&mut self.row).map_err(csv_error)? {
            return Ok(None);
        }

        let line = line_of(&self.row);
        match self.parser.parse_row(&self.row, line) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(line, error = %err, "rejected CSV row");
                Err(err)
            }
        }
    }
}

fn line_of(row: &StringRecord) -> u64 {
    row.position().map_or(0, csv::Position::line)
}

fn csv_error(err: csv::Error) -> Error {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            other => Error::Csv(format!("{other:?}")),
        }
    } else {
        Error::Csv(err.to_string())
    }
}
