//! Free-function shorthands for common pipeline shapes

use std::path::Path;
use std::sync::Arc;

use dsflow_core::{Batch, Element, Error, PipelineConfig, Record, Result};
use dsflow_readers::{CsvOptions, CsvSource, TextLineOptions, TextLineSource};

use crate::dataset::{Dataset, Parallelism};
use crate::iterator::DatasetIterator;
use crate::materialize::{materialize, FeatureCollection, ResponseCollection};

/// Dataset over a delimited text file
pub fn csv_dataset<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Dataset> {
    Ok(Dataset::from_source(Arc::new(CsvSource::from_path(path, options)?)))
}

/// Dataset with one text record per line of a file
pub fn text_line_dataset<P: AsRef<Path>>(path: P, options: TextLineOptions) -> Result<Dataset> {
    Ok(Dataset::from_source(Arc::new(TextLineSource::from_path(path, options)?)))
}

/// Map `func` over `dataset` with the given parallelism
pub fn dataset_map<F>(dataset: &Dataset, func: F, parallelism: impl Into<Parallelism>) -> Result<Dataset>
where
    F: Fn(Record) -> anyhow::Result<Record> + Send + Sync + 'static,
{
    dataset.map_parallel(func, parallelism)
}

/// First element of a fresh traversal, as a batch
///
/// A record dataset yields a one-record batch. An empty dataset fails with
/// [`Error::OutOfRange`].
pub fn batch_from_dataset(dataset: &Dataset) -> Result<Batch> {
    match dataset.iterator().get_next()? {
        Element::Batch(batch) => Ok(batch),
        Element::Record(record) => Batch::new(vec![record]),
    }
}

/// Factory for feature/response iterators over a batched dataset
///
/// Every [`InputFn::call`] starts a new traversal, the way a training loop
/// requests fresh input each epoch.
#[derive(Debug, Clone)]
pub struct InputFn {
    dataset: Dataset,
    features: Vec<String>,
    response: Vec<String>,
    config: PipelineConfig,
}

impl InputFn {
    /// Override the configuration used by new traversals
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Feature column names
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Response column names
    pub fn response(&self) -> &[String] {
        &self.response
    }

    /// Start a new traversal
    pub fn call(&self) -> Result<PreparedIterator> {
        Ok(PreparedIterator {
            inner: self.dataset.iterator_with_config(&self.config)?,
            features: self.features.clone(),
            response: self.response.clone(),
        })
    }
}

/// Build an [`InputFn`] splitting each batch into features and response
///
/// Selections are checked against the dataset schema when it is known.
pub fn input_fn_from_dataset<S: AsRef<str>>(dataset: &Dataset, features: &[S], response: &[S]) -> Result<InputFn> {
    if !dataset.is_batched() {
        return Err(Error::InvalidArgument(
            "input functions need a batched dataset; call batch() first".into(),
        ));
    }

    let features: Vec<String> = features.iter().map(|s| s.as_ref().to_string()).collect();
    let response: Vec<String> = response.iter().map(|s| s.as_ref().to_string()).collect();
    if let Some(schema) = dataset.schema() {
        for name in features.iter().chain(&response) {
            schema.index_of(name)?;
        }
    }

    Ok(InputFn {
        dataset: dataset.clone(),
        features,
        response,
        config: PipelineConfig::default(),
    })
}

/// Iterator yielding `(features, response)` per batch
#[derive(Debug)]
pub struct PreparedIterator {
    inner: DatasetIterator,
    features: Vec<String>,
    response: Vec<String>,
}

impl PreparedIterator {
    /// Pull and split the next batch; [`Error::OutOfRange`] at the end
    pub fn get_next(&mut self) -> Result<(FeatureCollection, ResponseCollection)> {
        let batch = self.inner.get_next()?.into_batch()?;
        let features: Vec<&str> = self.features.iter().map(String::as_str).collect();
        let response: Vec<&str> = self.response.iter().map(String::as_str).collect();
        materialize(&batch, &features, &response)
    }

    /// The underlying traversal
    pub fn inner(&self) -> &DatasetIterator {
        &self.inner
    }
}

impl Iterator for PreparedIterator {
    type Item = Result<(FeatureCollection, ResponseCollection)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            Err(Error::OutOfRange) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use dsflow_core::{ColumnType, Value};
    use tempfile::NamedTempFile;

    fn five_row_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        for i in 0..5 {
            writeln!(file, "{i},{}.5,{}", i, i * 2).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn csv_repeat_then_batch_drops_remainder() {
        let file = five_row_csv();
        let ds = csv_dataset(file.path(), CsvOptions::default())
            .unwrap()
            .repeat(Some(2))
            .unwrap()
            .batch(3, true)
            .unwrap();

        let mut it = ds.iterator();
        let mut records = 0;
        for _ in 0..3 {
            let batch = it.get_next().unwrap().into_batch().unwrap();
            assert_eq!(batch.len(), 3);
            records += batch.len();
        }
        assert!(it.get_next().unwrap_err().is_out_of_range());
        assert_eq!(records, 9);
    }

    #[test]
    fn csv_schema_is_inferred() {
        let file = five_row_csv();
        let ds = csv_dataset(file.path(), CsvOptions::default()).unwrap();
        let schema = ds.schema().unwrap();
        let types: Vec<ColumnType> = schema.columns().iter().map(|c| c.column_type()).collect();
        assert_eq!(types, vec![ColumnType::Integer, ColumnType::Float, ColumnType::Integer]);
    }

    #[test]
    fn text_lines_become_records() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "alpha\nbeta\n").unwrap();
        let ds = text_line_dataset(file.path(), TextLineOptions::default()).unwrap();
        let lines: Vec<Value> = ds
            .iterator()
            .map(|el| el.unwrap().into_record().unwrap().value("line").unwrap().clone())
            .collect();
        assert_eq!(lines, vec![Value::from("alpha"), Value::from("beta")]);
    }

    #[test]
    fn dataset_map_shorthand() {
        let ds = dataset_map(
            &Dataset::range(0, 4, 1).unwrap(),
            |r| {
                let v = r.value("value")?.as_i64().unwrap_or_default();
                Ok(r.with_column("square", v * v))
            },
            Parallelism::Fixed(2),
        )
        .unwrap();
        let squares: Vec<i64> = ds
            .iterator()
            .map(|el| el.unwrap().into_record().unwrap().value("square").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(squares, vec![0, 1, 4, 9]);
    }

    #[test]
    fn batch_from_dataset_takes_first_element() {
        let ds = Dataset::range(0, 10, 1).unwrap().batch(4, false).unwrap();
        assert_eq!(batch_from_dataset(&ds).unwrap().len(), 4);
        // Fresh traversal every call
        assert_eq!(batch_from_dataset(&ds).unwrap().records()[0], batch_from_dataset(&ds).unwrap().records()[0]);

        let unbatched = Dataset::range(7, 10, 1).unwrap();
        assert_eq!(batch_from_dataset(&unbatched).unwrap().len(), 1);

        let empty = Dataset::range(0, 0, 1).unwrap();
        assert!(batch_from_dataset(&empty).unwrap_err().is_out_of_range());
    }

    #[test]
    fn input_fn_yields_split_batches_per_call() {
        let file = five_row_csv();
        let ds = csv_dataset(file.path(), CsvOptions::default()).unwrap().batch(2, false).unwrap();
        let input_fn = input_fn_from_dataset(&ds, &["b", "a"], &["c"]).unwrap();

        for _ in 0..2 {
            let splits: Vec<_> = input_fn.call().unwrap().map(Result::unwrap).collect();
            assert_eq!(splits.len(), 3);
            let (features, response) = &splits[0];
            assert_eq!(features.columns(), ["b".to_string(), "a".to_string()]);
            assert_eq!(features.to_f64_rows().unwrap()[1], vec![1.5, 1.0]);
            assert_eq!(response.to_f64_rows().unwrap(), vec![vec![0.0], vec![2.0]]);
        }
    }

    #[test]
    fn input_fn_checks_selection() {
        let file = five_row_csv();
        let ds = csv_dataset(file.path(), CsvOptions::default()).unwrap();
        assert!(matches!(input_fn_from_dataset(&ds, &["a"], &["c"]), Err(Error::InvalidArgument(_))));

        let batched = ds.batch(2, false).unwrap();
        let err = input_fn_from_dataset(&batched, &["a", "d"], &["c"]).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(ref name) if name == "d"));
    }
}
