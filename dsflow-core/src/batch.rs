//! Batches of records and the elements a dataset yields

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::Schema;
use crate::value::Value;

/// A non-empty group of records materialized together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Records in arrival order
    records: Vec<Record>,
}

impl Batch {
    /// Create a new batch
    ///
    /// Fails on an empty record list, and with [`Error::SchemaMismatch`] when
    /// a record's column names differ from the first record's.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        let Some(first) = records.first() else {
            return Err(Error::InvalidArgument("A batch must hold at least one record".into()));
        };
        let schema = first.schema();
        for (position, record) in records.iter().enumerate().skip(1) {
            if !Arc::ptr_eq(schema, record.schema()) && !schema.names().eq(record.schema().names()) {
                return Err(Error::SchemaMismatch(format!(
                    "record {position} has columns [{}], batch has [{}]",
                    record.schema().names().collect::<Vec<_>>().join(", "),
                    schema.names().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        Ok(Self { records })
    }

    /// Schema of the first record
    pub fn schema(&self) -> &Arc<Schema> {
        self.records[0].schema()
    }

    /// Number of records in this batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; batches are never empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in this batch
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the batch and return its records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// All values of one column, in record order
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        self.records.iter().map(|r| r.value(name)).collect()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch: {} records", self.records.len())?;
        for record in &self.records {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}

/// One item produced by a dataset traversal
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A single record
    Record(Record),

    /// A group of records
    Batch(Batch),
}

impl Element {
    /// Number of records carried by this element
    pub fn record_count(&self) -> usize {
        match self {
            Element::Record(_) => 1,
            Element::Batch(batch) => batch.len(),
        }
    }

    /// Borrow the record, if this is a record element
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Element::Record(record) => Some(record),
            Element::Batch(_) => None,
        }
    }

    /// Borrow the batch, if this is a batch element
    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            Element::Batch(batch) => Some(batch),
            Element::Record(_) => None,
        }
    }

    /// Take the record out, failing on batch elements
    pub fn into_record(self) -> Result<Record> {
        match self {
            Element::Record(record) => Ok(record),
            Element::Batch(_) => Err(Error::TypeMismatch("expected a record element, got a batch".into())),
        }
    }

    /// Take the batch out, failing on record elements
    pub fn into_batch(self) -> Result<Batch> {
        match self {
            Element::Batch(batch) => Ok(batch),
            Element::Record(_) => Err(Error::TypeMismatch("expected a batch element, got a record".into())),
        }
    }
}

impl From<Record> for Element {
    fn from(record: Record) -> Self {
        Element::Record(record)
    }
}

impl From<Batch> for Element {
    fn from(batch: Batch) -> Self {
        Element::Batch(batch)
    }
}
