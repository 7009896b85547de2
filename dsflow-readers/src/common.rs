//! Shared utilities for file-backed sources

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use dsflow_core::{ColumnSpec, ColumnType, Error, Result, Schema};

/// Open a file for sequential reading, optionally through a memory map
pub(crate) fn open_input(path: &Path, use_memory_mapping: bool, buffer_size: usize) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;

    // Zero-length files cannot be mapped on every platform
    if use_memory_mapping && file.metadata()?.len() > 0 {
        #[allow(unsafe_code)]
        // SAFETY: the map is read-only and owned by the returned reader; the
        // file is expected not to be truncated while a traversal is open.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), bytes = mmap.len(), "memory-mapped input");
        return Ok(Box::new(Cursor::new(mmap)));
    }

    Ok(Box::new(BufReader::with_capacity(buffer_size, file)))
}

/// Schema inference for delimited text
pub struct SchemaInference;

/// One sampled data row with its line number
pub(crate) struct SampleRow {
    pub line: u64,
    pub fields: Vec<String>,
}

impl SchemaInference {
    /// Infer column types for `names` from sampled rows
    ///
    /// Each non-empty field is classified by the strictest parse that
    /// succeeds: integer, then float, then text. Integer and float literals
    /// in one column widen to float. A numeric literal and a non-numeric
    /// literal in one column is ambiguous and fails. Empty fields are
    /// ignored; a column with no non-empty samples is text. Inferred
    /// columns default missing fields to the type's zero value.
    pub(crate) fn infer(names: &[String], rows: &[SampleRow]) -> Result<Schema> {
        let mut inferred: Vec<Option<(ColumnType, u64)>> = vec![None; names.len()];

        for row in rows {
            if row.fields.len() > names.len() {
                return Err(Error::SchemaInference {
                    column: names.last().cloned().unwrap_or_default(),
                    message: format!(
                        "line {} has {} fields but only {} columns are known",
                        row.line,
                        row.fields.len(),
                        names.len()
                    ),
                });
            }

            for (col_idx, field) in row.fields.iter().enumerate() {
                if field.is_empty() {
                    continue;
                }

                let literal = Self::classify(field);
                inferred[col_idx] = match inferred[col_idx] {
                    None => Some((literal, row.line)),
                    Some((seen, first_line)) => {
                        Some((Self::merge(&names[col_idx], seen, first_line, literal, row.line)?, first_line))
                    }
                };
            }
        }

        let columns = names
            .iter()
            .zip(inferred)
            .map(|(name, ty)| {
                let column_type = ty.map_or(ColumnType::Text, |(ty, _)| ty);
                ColumnSpec {
                    name: name.clone(),
                    column_type,
                    default: Some(column_type.zero_value()),
                }
            })
            .collect();

        Schema::new(columns)
    }

    /// Classify one literal by the strictest type that parses it
    pub fn classify(field: &str) -> ColumnType {
        if field.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if field.parse::<f64>().is_ok() {
            ColumnType::Float
        } else {
            ColumnType::Text
        }
    }

    fn merge(column: &str, seen: ColumnType, first_line: u64, literal: ColumnType, line: u64) -> Result<ColumnType> {
        match (seen, literal) {
            (a, b) if a == b => Ok(a),
            (a, b) if a.is_numeric() && b.is_numeric() => Ok(ColumnType::Float),
            (a, b) => Err(Error::SchemaInference {
                column: column.to_string(),
                message: format!(
                    "{a} literal on line {first_line} conflicts with {b} literal on line {line}; \
                     supply explicit column specs"
                ),
            }),
        }
    }
}

/// Default names for headerless files: `column_0`, `column_1`, ...
pub(crate) fn generated_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("column_{i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn rows(data: &[&[&str]]) -> Vec<SampleRow> {
        data.iter()
            .enumerate()
            .map(|(i, fields)| SampleRow {
                line: i as u64 + 2,
                fields: fields.iter().map(|s| (*s).to_string()).collect(),
            })
            .collect()
    }

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| (*s).to_string()).collect()
    }

    #[test_case("12", ColumnType::Integer)]
    #[test_case("-3", ColumnType::Integer)]
    #[test_case("1.5", ColumnType::Float)]
    #[test_case("1e3", ColumnType::Float)]
    #[test_case("abc", ColumnType::Text)]
    fn classify_literals(field: &str, expected: ColumnType) {
        assert_eq!(SchemaInference::classify(field), expected);
    }

    #[test]
    fn infers_progressively() {
        let schema = SchemaInference::infer(
            &names(&["id", "score", "name"]),
            &rows(&[&["1", "2", "a"], &["2", "2.5", "b"], &["3", "", "c"]]),
        )
        .unwrap();

        let types: Vec<_> = schema.columns().iter().map(ColumnSpec::column_type).collect();
        assert_eq!(types, vec![ColumnType::Integer, ColumnType::Float, ColumnType::Text]);
        assert_eq!(schema.column(1).unwrap().default_value(), Some(&dsflow_core::Value::Float(0.0)));
    }

    #[test]
    fn conflicting_literals_fail_naming_column() {
        let err = SchemaInference::infer(&names(&["a", "b"]), &rows(&[&["1", "x"], &["y", "z"]])).unwrap_err();
        match err {
            Error::SchemaInference { column, message } => {
                assert_eq!(column, "a");
                assert!(message.contains("line 2"));
                assert!(message.contains("line 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn all_empty_column_is_text() {
        let schema = SchemaInference::infer(&names(&["a", "b"]), &rows(&[&["1", ""], &["2"]])).unwrap();
        assert_eq!(schema.column(1).unwrap().column_type(), ColumnType::Text);
    }

    #[test]
    fn too_many_fields_fail() {
        assert!(SchemaInference::infer(&names(&["a"]), &rows(&[&["1", "2"]])).is_err());
    }

    proptest! {
        #[test]
        fn integer_and_float_samples_widen_to_float(
            ints in proptest::collection::vec(any::<i32>(), 1..20),
            floats in proptest::collection::vec(-1.0e6f64..1.0e6, 0..20),
        ) {
            let mut fields: Vec<String> = ints.iter().map(ToString::to_string).collect();
            fields.extend(floats.iter().map(|f| format!("{f:.3}")));
            let sample: Vec<SampleRow> = fields
                .into_iter()
                .enumerate()
                .map(|(i, field)| SampleRow { line: i as u64 + 1, fields: vec![field] })
                .collect();

            let schema = SchemaInference::infer(&names(&["x"]), &sample).unwrap();
            let expected = if floats.is_empty() { ColumnType::Integer } else { ColumnType::Float };
            prop_assert_eq!(schema.column(0).unwrap().column_type(), expected);
        }
    }
}
