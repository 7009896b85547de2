//! Plain text source yielding one record per line

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use dsflow_core::{ColumnSpec, ColumnType, Record, RecordReader, RecordSource, Result, Schema, Value};

use crate::common::open_input;

/// Options for text-line sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLineOptions {
    /// Name of the produced text column
    pub column: String,

    /// Whether to skip empty lines
    pub skip_empty_lines: bool,

    /// Whether to trim whitespace
    pub trim_whitespace: bool,

    /// Buffer size for reading
    pub buffer_size: usize,
}

impl Default for TextLineOptions {
    fn default() -> Self {
        Self {
            column: "line".to_string(),
            skip_empty_lines: false,
            trim_whitespace: false,
            buffer_size: 64 * 1024,
        }
    }
}

/// A restartable source reading a text file line by line
#[derive(Debug, Clone)]
pub struct TextLineSource {
    path: PathBuf,
    options: TextLineOptions,
    schema: Arc<Schema>,
}

impl TextLineSource {
    /// Create a source over the file at `path`
    pub fn from_path<P: AsRef<Path>>(path: P, options: TextLineOptions) -> Result<Self> {
        let schema = Schema::new(vec![ColumnSpec::new(&options.column, ColumnType::Text)])?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            options,
            schema: Arc::new(schema),
        })
    }
}

impl RecordSource for TextLineSource {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&self) -> Result<Box<dyn RecordReader>> {
        let input = open_input(&self.path, false, self.options.buffer_size)?;
        debug!(path = %self.path.display(), "opened text traversal");

        Ok(Box::new(TextLineReader {
            lines: BufReader::new(input),
            buffer: String::new(),
            options: self.options.clone(),
            schema: self.schema.clone(),
        }))
    }
}

struct TextLineReader {
    lines: BufReader<Box<dyn Read + Send>>,
    buffer: String,
    options: TextLineOptions,
    schema: Arc<Schema>,
}

impl RecordReader for TextLineReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buffer.clear();
            if self.lines.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            let line = if self.options.trim_whitespace { line.trim() } else { line };
            if self.options.skip_empty_lines && line.is_empty() {
                continue;
            }

            let value = Value::Text(line.to_string());
            return Record::new(self.schema.clone(), vec![value]).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lines_of(source: &TextLineSource) -> Vec<String> {
        let mut reader = source.open().unwrap();
        let mut out = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            out.push(record.get("line").and_then(Value::as_str).unwrap().to_string());
        }
        out
    }

    #[test]
    fn yields_lines_without_terminators() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "alpha\r\n\n  beta  \ngamma").unwrap();

        let source = TextLineSource::from_path(file.path(), TextLineOptions::default()).unwrap();
        assert_eq!(lines_of(&source), vec!["alpha", "", "  beta  ", "gamma"]);

        let options = TextLineOptions {
            skip_empty_lines: true,
            trim_whitespace: true,
            ..TextLineOptions::default()
        };
        let source = TextLineSource::from_path(file.path(), options).unwrap();
        assert_eq!(lines_of(&source), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn missing_file_fails_on_open() {
        let source = TextLineSource::from_path("/nonexistent/input.txt", TextLineOptions::default()).unwrap();
        assert!(matches!(source.open(), Err(dsflow_core::Error::Io(_))));
    }
}
