//! Row parser converting delimited-text fields into typed records

use std::sync::Arc;

use csv::StringRecord;

use dsflow_core::{ColumnSpec, ColumnType, Error, Record, Result, Schema, Value};

/// Parser that converts one text row into a [`Record`]
#[derive(Debug, Clone)]
pub struct CsvParser {
    /// Schema of every column in the file
    file_schema: Arc<Schema>,

    /// File column index for each output column
    projection: Vec<usize>,

    /// Schema of the produced records
    output_schema: Arc<Schema>,
}

impl CsvParser {
    /// Create a parser producing `projection` columns of `file_schema`, in that order
    pub fn new(file_schema: Arc<Schema>, projection: Vec<usize>) -> Result<Self> {
        let output_schema = Arc::new(file_schema.project(&projection)?);
        Ok(Self {
            file_schema,
            projection,
            output_schema,
        })
    }

    /// Schema of the produced records
    pub fn schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }

    /// Parse one row read from `line`
    pub fn parse_row(&self, row: &StringRecord, line: u64) -> Result<Record> {
        if row.len() > self.file_schema.len() {
            return Err(Error::Format {
                line,
                message: format!(
                    "row has {} fields, expected at most {}",
                    row.len(),
                    self.file_schema.len()
                ),
            });
        }

        let values = self
            .projection
            .iter()
            .zip(self.output_schema.columns())
            .map(|(&file_idx, spec)| Self::parse_field(spec, row.get(file_idx), line))
            .collect::<Result<Vec<_>>>()?;

        Record::new(self.output_schema.clone(), values)
    }

    /// Parse a single field according to its column spec
    ///
    /// Absent or empty fields take the column default. Empty text is a
    /// valid text literal when no default is declared. Anything else that
    /// fails its typed parse is an error; values are never coerced.
    fn parse_field(spec: &ColumnSpec, raw: Option<&str>, line: u64) -> Result<Value> {
        match raw {
            Some(raw) if !raw.is_empty() => spec.column_type().parse(raw).ok_or_else(|| Error::Parse {
                line,
                column: spec.name().to_string(),
                value: raw.to_string(),
                expected: spec.column_type(),
            }),
            _ => match (spec.default_value(), spec.column_type()) {
                (Some(default), _) => Ok(default.clone()),
                (None, ColumnType::Text) if raw.is_some() => Ok(Value::Text(String::new())),
                (None, _) => Err(Error::MissingField {
                    line,
                    column: spec.name().to_string(),
                }),
            },
        }
    }
}
