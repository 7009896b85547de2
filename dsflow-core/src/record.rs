//! Named-column records

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{ColumnSpec, Schema};
use crate::value::Value;

/// One data unit: an ordered mapping from column name to value
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Schema describing the columns
    schema: Arc<Schema>,

    /// Values in schema order
    values: Vec<Value>,
}

impl Record {
    /// Create a new record with the given schema and values
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::InvalidArgument(format!(
                "Record has {} values but schema has {} columns",
                values.len(),
                schema.len()
            )));
        }

        for (spec, value) in schema.columns().iter().zip(&values) {
            if !spec.column_type().accepts(value) {
                return Err(Error::TypeMismatch(format!(
                    "Column '{}' expects {}, got {}",
                    spec.name(),
                    spec.column_type(),
                    value.column_type()
                )));
            }
        }

        Ok(Self { schema, values })
    }

    /// Build a record from `(name, value)` pairs, inferring column types from the values
    pub fn from_pairs<I, S, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, value) in pairs {
            let value = value.into();
            columns.push(ColumnSpec::new(name.as_ref(), value.column_type()));
            values.push(value);
        }

        Self::new(Arc::new(Schema::new(columns)?), values)
    }

    /// Get the schema of this record
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get all values in schema order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the record and return its values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Get the number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).ok().map(|i| &self.values[i])
    }

    /// Get a value by column name, failing with `ColumnNotFound`
    pub fn value(&self, name: &str) -> Result<&Value> {
        let index = self.schema.index_of(name)?;
        Ok(&self.values[index])
    }

    /// New record with `name` set to `value`; replaces an existing column in place or appends
    pub fn with_column(&self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let column_type = value.column_type();
        let mut values = self.values.clone();

        let schema = match self.schema.index_of(name) {
            Ok(index) if self.schema.columns()[index].column_type().accepts(&value) => {
                values[index] = value;
                self.schema.clone()
            }
            Ok(index) => {
                values[index] = value;
                Arc::new(self.schema.with_column(ColumnSpec::new(name, column_type)))
            }
            Err(_) => {
                values.push(value);
                Arc::new(self.schema.with_column(ColumnSpec::new(name, column_type)))
            }
        };

        Self { schema, values }
    }

    /// New record without the named column
    pub fn without_column(&self, name: &str) -> Result<Self> {
        let drop = self.schema.index_of(name)?;
        let keep: Vec<usize> = (0..self.len()).filter(|&i| i != drop).collect();
        self.project(&keep)
    }

    /// New record with only the named columns, in the order given
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|&name| self.schema.index_of(name))
            .collect::<Result<Vec<_>>>()?;
        self.project(&indices)
    }

    /// Create a projection of this record with only the specified columns
    pub fn project(&self, indices: &[usize]) -> Result<Self> {
        let schema = self.schema.project(indices)?;
        let values = indices.iter().map(|&i| self.values[i].clone()).collect();

        Ok(Self {
            schema: Arc::new(schema),
            values,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.schema.names().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn sample() -> Record {
        Record::from_pairs([
            ("a", Value::Integer(1)),
            ("b", Value::Float(2.0)),
            ("c", Value::Text("x".into())),
        ])
        .unwrap()
    }

    #[test]
    fn lookup_by_name() {
        let record = sample();
        assert_eq!(record.get("b"), Some(&Value::Float(2.0)));
        assert_eq!(record.get("z"), None);
        assert!(matches!(record.value("z"), Err(Error::ColumnNotFound(_))));
    }

    #[test]
    fn with_column_shares_schema_when_type_unchanged() {
        let record = sample();
        let updated = record.with_column("a", 10i64);
        assert!(Arc::ptr_eq(record.schema(), updated.schema()));
        assert_eq!(updated.get("a"), Some(&Value::Integer(10)));
        // upstream untouched
        assert_eq!(record.get("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn with_column_redefines_schema() {
        let record = sample().with_column("a", "one").with_column("d", 4.5);
        let names: Vec<_> = record.schema().names().collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(record.schema().column(0).unwrap().column_type(), ColumnType::Text);
    }

    #[test]
    fn select_and_drop() {
        let record = sample();
        let picked = record.select(&["c", "a"]).unwrap();
        assert_eq!(picked.values(), &[Value::Text("x".into()), Value::Integer(1)]);

        let dropped = record.without_column("b").unwrap();
        assert_eq!(dropped.schema().names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn new_checks_types() {
        let schema = Arc::new(Schema::new(vec![ColumnSpec::new("a", ColumnType::Integer)]).unwrap());
        assert!(Record::new(schema.clone(), vec![Value::Text("x".into())]).is_err());
        assert!(Record::new(schema, vec![]).is_err());
    }
}
