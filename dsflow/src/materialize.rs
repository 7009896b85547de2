//! Feature/response split of a batch
//!
//! Model code usually wants the input columns and the target columns of a
//! batch as two separate, row-aligned collections. [`materialize`] performs
//! that split with the column order given by the caller.

use std::collections::HashSet;

use dsflow_core::{Batch, Error, Result, Value};

/// Feature columns of a batch, one row per record
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    /// Selected column names, in selection order
    columns: Vec<String>,

    /// `len() x width()` values, row-major
    rows: Vec<Vec<Value>>,
}

impl FeatureCollection {
    /// Column names in selection order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in batch order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of feature columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// All values of one feature column
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Numeric view of the rows
    pub fn to_f64_rows(&self) -> Result<Vec<Vec<f64>>> {
        self.rows.iter().map(|row| numeric_row(&self.columns, row)).collect()
    }
}

/// Response columns of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseCollection {
    /// Single response column: one value per record
    Vector {
        /// Column name
        column: String,
        /// Values in batch order
        values: Vec<Value>,
    },

    /// Several response columns: one row per record
    Matrix {
        /// Column names in selection order
        columns: Vec<String>,
        /// Rows in batch order
        rows: Vec<Vec<Value>>,
    },
}

impl ResponseCollection {
    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            ResponseCollection::Vector { values, .. } => values.len(),
            ResponseCollection::Matrix { rows, .. } => rows.len(),
        }
    }

    /// Check whether there are no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Response column names
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ResponseCollection::Vector { column, .. } => vec![column.as_str()],
            ResponseCollection::Matrix { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Numeric view as rows; a vector response yields one-element rows
    pub fn to_f64_rows(&self) -> Result<Vec<Vec<f64>>> {
        match self {
            ResponseCollection::Vector { column, values } => values
                .iter()
                .map(|v| numeric(column, v).map(|x| vec![x]))
                .collect(),
            ResponseCollection::Matrix { columns, rows } => {
                rows.iter().map(|row| numeric_row(columns, row)).collect()
            }
        }
    }
}

fn numeric(column: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::TypeMismatch(format!("column '{column}' value {value} is not numeric")))
}

fn numeric_row(columns: &[String], row: &[Value]) -> Result<Vec<f64>> {
    columns.iter().zip(row).map(|(c, v)| numeric(c, v)).collect()
}

/// Split `batch` into feature and response collections
///
/// Column order follows the selections, not the schema. Fails with
/// [`Error::ColumnNotFound`] naming the first absent column, and with
/// [`Error::InvalidArgument`] if either selection is empty or the two
/// overlap.
pub fn materialize(batch: &Batch, features: &[&str], response: &[&str]) -> Result<(FeatureCollection, ResponseCollection)> {
    if features.is_empty() || response.is_empty() {
        return Err(Error::InvalidArgument(
            "feature and response selections must each name at least one column".into(),
        ));
    }

    let schema = batch.schema();
    for name in features.iter().chain(response) {
        schema.index_of(name)?;
    }

    let feature_set: HashSet<&str> = features.iter().copied().collect();
    if let Some(shared) = response.iter().find(|name| feature_set.contains(*name)) {
        return Err(Error::InvalidArgument(format!(
            "column '{shared}' selected as both feature and response"
        )));
    }

    // Looked up by name per record: a map may give records differing schemas
    let pick = |names: &[&str]| -> Result<Vec<Vec<Value>>> {
        batch
            .records()
            .iter()
            .map(|record| names.iter().map(|name| record.value(name).cloned()).collect())
            .collect()
    };

    let features_out = FeatureCollection {
        columns: features.iter().map(ToString::to_string).collect(),
        rows: pick(features)?,
    };

    let response_out = if let [name] = response {
        ResponseCollection::Vector {
            column: (*name).to_string(),
            values: pick(response)?.into_iter().flatten().collect(),
        }
    } else {
        ResponseCollection::Matrix {
            columns: response.iter().map(ToString::to_string).collect(),
            rows: pick(response)?,
        }
    };

    Ok((features_out, response_out))
}
