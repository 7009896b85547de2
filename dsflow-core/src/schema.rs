//! Schema definition for record columns

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integer
    Integer,

    /// 64-bit floating point
    Float,

    /// UTF-8 text
    Text,

    /// Tensor-like list of values
    List,
}

impl ColumnType {
    /// Parse one raw field as this type
    ///
    /// Returns `None` when the text is not a valid literal of the type.
    /// `List` columns cannot be read from delimited text.
    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ColumnType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            ColumnType::Float => raw.parse::<f64>().ok().map(Value::Float),
            ColumnType::Text => Some(Value::Text(raw.to_string())),
            ColumnType::List => None,
        }
    }

    /// Implicit default used for missing fields of inferred columns
    pub fn zero_value(self) -> Value {
        match self {
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Text => Value::Text(String::new()),
            ColumnType::List => Value::List(Vec::new()),
        }
    }

    /// Check whether this type is numeric
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Check whether a value may be stored in a column of this type
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ColumnType::Float, Value::Integer(_)) => true,
            (ty, v) => v.column_type() == ty,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::List => write!(f, "list"),
        }
    }
}

/// Declared name, type and default for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Name of the column
    pub name: String,

    /// Declared type of the column
    pub column_type: ColumnType,

    /// Value substituted for missing fields
    #[serde(default)]
    pub default: Option<Value>,
}

impl ColumnSpec {
    /// Create a column spec without a default
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            default: None,
        }
    }

    /// Create a column spec whose missing fields take `default`
    pub fn with_default(name: &str, column_type: ColumnType, default: impl Into<Value>) -> Result<Self> {
        let default = default.into();
        if !column_type.accepts(&default) {
            return Err(Error::InvalidArgument(format!(
                "Default {default} for column '{name}' is not a {column_type} value"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            column_type,
            default: Some(default),
        })
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the declared type of this column
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Get the default value for missing fields
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{}: {} (default {})", self.name, self.column_type, default),
            None => write!(f, "{}: {}", self.name, self.column_type),
        }
    }
}

/// Ordered set of columns shared by every record of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColumnSpec>", into = "Vec<ColumnSpec>")]
pub struct Schema {
    /// Columns in this schema
    columns: Vec<ColumnSpec>,

    /// Column indices by name for faster lookup
    column_indices: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given columns
    ///
    /// Column names must be unique.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        let mut column_indices = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if column_indices.insert(column.name.clone(), i).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "Duplicate column name: {}",
                    column.name
                )));
            }
        }

        Ok(Self {
            columns,
            column_indices,
        })
    }

    /// Create a schema with no columns
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            column_indices: HashMap::new(),
        }
    }

    /// Get all columns in this schema
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Get a column by index
    pub fn column(&self, index: usize) -> Option<&ColumnSpec> {
        self.columns.get(index)
    }

    /// Get a column by name
    pub fn column_by_name(&self, name: &str) -> Result<&ColumnSpec> {
        let index = self.index_of(name)?;
        Ok(&self.columns[index])
    }

    /// Get the index of a column by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.column_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Check whether a column exists
    pub fn contains(&self, name: &str) -> bool {
        self.column_indices.contains_key(name)
    }

    /// Column names in schema order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Get the number of columns in this schema
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Create a projection of this schema with only the specified columns
    pub fn project(&self, indices: &[usize]) -> Result<Self> {
        let columns = indices
            .iter()
            .map(|&i| {
                self.columns.get(i).cloned().ok_or_else(|| {
                    Error::InvalidArgument(format!("Column index {i} out of bounds"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(columns)
    }

    /// Create a projection of this schema with the named columns, in the order given
    pub fn project_by_names(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|&name| self.index_of(name))
            .collect::<Result<Vec<_>>>()?;
        self.project(&indices)
    }

    /// Copy of this schema with one column added, or replaced in place if the name exists
    pub fn with_column(&self, spec: ColumnSpec) -> Self {
        let mut columns = self.columns.clone();
        let mut column_indices = self.column_indices.clone();
        match column_indices.get(&spec.name) {
            Some(&index) => columns[index] = spec,
            None => {
                column_indices.insert(spec.name.clone(), columns.len());
                columns.push(spec);
            }
        }

        Self {
            columns,
            column_indices,
        }
    }
}

impl TryFrom<Vec<ColumnSpec>> for Schema {
    type Error = Error;

    fn try_from(columns: Vec<ColumnSpec>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<Schema> for Vec<ColumnSpec> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{column}")?;
        }
        write!(f, "}}")
    }
}
