//! Record sources: restartable blueprints and the readers they open

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::{ColumnSpec, ColumnType, Schema};
use crate::value::Value;

/// A restartable producer of records
///
/// A source is a read-only blueprint; every call to [`RecordSource::open`]
/// starts a fresh traversal from the first record.
pub trait RecordSource: Send + Sync + fmt::Debug {
    /// Get the schema of records produced by this source
    fn schema(&self) -> Arc<Schema>;

    /// Open a new reader positioned at the first record
    fn open(&self) -> Result<Box<dyn RecordReader>>;

    /// Provides a hint about the total number of records (if known)
    fn len_hint(&self) -> Option<usize> {
        None
    }
}

/// A cursor over one traversal of a [`RecordSource`]
pub trait RecordReader: Send {
    /// Retrieve the next record
    /// Returns None when exhausted
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// A source backed by records held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    /// Shared schema
    schema: Arc<Schema>,

    /// The records, shared read-only between readers
    records: Arc<Vec<Record>>,
}

impl MemorySource {
    /// Create a source from records that all share one schema
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let schema = match records.first() {
            Some(first) => first.schema().clone(),
            None => Arc::new(Schema::empty()),
        };

        if let Some(pos) = records.iter().position(|r| r.schema() != &schema) {
            return Err(Error::InvalidArgument(format!(
                "Record {pos} does not match the schema of record 0"
            )));
        }

        Ok(Self {
            schema,
            records: Arc::new(records),
        })
    }

    /// Create a source from parallel columns, yielding one record per index
    ///
    /// Every column must have the same length and values of one type
    /// (integers are accepted in float columns).
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let Some(row_count) = columns.first().map(|(_, values)| values.len()) else {
            return Self::from_records(Vec::new());
        };

        let mut specs = Vec::with_capacity(columns.len());
        for (name, values) in &columns {
            if values.len() != row_count {
                return Err(Error::InvalidArgument(format!(
                    "Column '{name}' has {} values, expected {row_count}",
                    values.len()
                )));
            }
            specs.push(ColumnSpec::new(name, column_type_of(name, values)?));
        }
        let schema = Arc::new(Schema::new(specs)?);

        let mut iters: Vec<_> = columns.into_iter().map(|(_, values)| values.into_iter()).collect();
        let mut records = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let values = iters.iter_mut().filter_map(Iterator::next).collect();
            records.push(Record::new(schema.clone(), values)?);
        }

        Ok(Self {
            schema,
            records: Arc::new(records),
        })
    }

    /// Create a single-column source
    pub fn from_values<V: Into<Value>>(name: &str, values: impl IntoIterator<Item = V>) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        Self::from_columns(vec![(name.to_string(), values)])
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the source holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn column_type_of(name: &str, values: &[Value]) -> Result<ColumnType> {
    let mut column_type: Option<ColumnType> = None;
    for value in values {
        column_type = match (column_type, value.column_type()) {
            (None, ty) => Some(ty),
            (Some(a), b) if a == b => Some(a),
            (Some(a), b) if a.is_numeric() && b.is_numeric() => Some(ColumnType::Float),
            (Some(a), b) => {
                return Err(Error::TypeMismatch(format!(
                    "Column '{name}' mixes {a} and {b} values"
                )))
            }
        };
    }
    Ok(column_type.unwrap_or(ColumnType::Float))
}

impl RecordSource for MemorySource {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&self) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(MemoryReader {
            records: self.records.clone(),
            position: 0,
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.records.len())
    }
}

/// Reader over a [`MemorySource`]
struct MemoryReader {
    records: Arc<Vec<Record>>,
    position: usize,
}

impl RecordReader for MemoryReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let record = self.records.get(self.position).cloned();
        if record.is_some() {
            self.position += 1;
        }
        Ok(record)
    }
}

/// Integers `start, start + step, ...` up to but excluding `end`, in a column named `value`
#[derive(Debug, Clone)]
pub struct RangeSource {
    start: i64,
    end: i64,
    step: i64,
    schema: Arc<Schema>,
}

impl RangeSource {
    /// Name of the single column produced by a range
    pub const COLUMN: &'static str = "value";

    /// Create a new range; `step` must be non-zero
    pub fn new(start: i64, end: i64, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(Error::InvalidArgument("Range step must be non-zero".into()));
        }

        let schema = Schema::new(vec![ColumnSpec::new(Self::COLUMN, ColumnType::Integer)])?;
        Ok(Self {
            start,
            end,
            step,
            schema: Arc::new(schema),
        })
    }

    fn contains(&self, value: i64) -> bool {
        if self.step > 0 {
            value < self.end
        } else {
            value > self.end
        }
    }
}

impl RecordSource for RangeSource {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&self) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(RangeReader {
            source: self.clone(),
            next: Some(self.start),
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        let span = if self.step > 0 {
            self.end.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.end)
        };
        if span <= 0 {
            return Some(0);
        }
        let step = self.step.unsigned_abs();
        let count = (span.unsigned_abs() + step - 1) / step;
        usize::try_from(count).ok()
    }
}

struct RangeReader {
    source: RangeSource,
    next: Option<i64>,
}

impl RecordReader for RangeReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(value) = self.next.filter(|&v| self.source.contains(v)) else {
            self.next = None;
            return Ok(None);
        };

        self.next = value.checked_add(self.source.step);
        Record::new(self.source.schema.clone(), vec![Value::Integer(value)]).map(Some)
    }
}
