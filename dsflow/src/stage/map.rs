use dsflow_core::{Element, Error, Record, Result};
use dsflow_parallel::OrderedPool;
use tracing::trace;

use super::Cursor;
use crate::dataset::{FilterFn, MapFn};

/// Pull the next upstream record, or an error for a non-record element
fn next_record(input: &mut Cursor) -> Result<Option<Record>> {
    input.next()?.map(Element::into_record).transpose()
}

/// Map applied inline on the consumer thread
pub(crate) struct MapCursor {
    input: Box<Cursor>,
    func: MapFn,
    /// Index of the next upstream pull
    index: u64,
}

impl MapCursor {
    pub fn new(input: Box<Cursor>, func: MapFn) -> Self {
        Self { input, func, index: 0 }
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        let pulled = next_record(&mut self.input);
        let index = self.index;
        match pulled {
            Ok(None) => Ok(None),
            Ok(Some(record)) => {
                self.index += 1;
                let mapped = (self.func)(record).map_err(|e| Error::transform(index, e))?;
                Ok(Some(Element::Record(mapped)))
            }
            Err(err) => {
                self.index += 1;
                Err(err)
            }
        }
    }
}

/// Map applied on a worker pool with in-order release
pub(crate) struct ParallelMapCursor {
    input: Box<Cursor>,
    pool: OrderedPool<Record, Record>,
}

impl ParallelMapCursor {
    pub fn new(input: Box<Cursor>, func: MapFn, workers: usize, window: usize) -> Result<Self> {
        let pool = OrderedPool::new(workers, window, move |index, record| {
            func(record).map_err(|e| Error::transform(index, e))
        })?;
        Ok(Self { input, pool })
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        let input = &mut self.input;
        let mapped = self.pool.next_with(|| next_record(input))?;
        Ok(mapped.map(Element::Record))
    }
}

/// Drops records rejected by a predicate
pub(crate) struct FilterCursor {
    input: Box<Cursor>,
    predicate: FilterFn,
    index: u64,
}

impl FilterCursor {
    pub fn new(input: Box<Cursor>, predicate: FilterFn) -> Self {
        Self {
            input,
            predicate,
            index: 0,
        }
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        loop {
            let pulled = next_record(&mut self.input);
            let index = self.index;
            let record = match pulled {
                Ok(Some(record)) => record,
                Ok(None) => return Ok(None),
                Err(err) => {
                    self.index += 1;
                    return Err(err);
                }
            };
            self.index += 1;

            if (self.predicate)(&record).map_err(|e| Error::transform(index, e))? {
                return Ok(Some(Element::Record(record)));
            }
            trace!(index, "filter rejected record");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use dsflow_core::{ColumnSpec, ColumnType, Error, Value};
    use tempfile::NamedTempFile;

    use crate::{csv_dataset, CsvOptions, Dataset};

    fn values(ds: &Dataset) -> Vec<i64> {
        ds.iterator()
            .map(|el| {
                let record = el.unwrap().into_record().unwrap();
                record.value("value").unwrap().as_i64().unwrap()
            })
            .collect()
    }

    fn double(record: dsflow_core::Record) -> anyhow::Result<dsflow_core::Record> {
        let v = record.value("value")?.as_i64().unwrap_or_default();
        Ok(record.with_column("value", v * 2))
    }

    #[test]
    fn sequential_map_applies_in_order() {
        let ds = Dataset::range(0, 5, 1).unwrap().map(double).unwrap();
        assert_eq!(values(&ds), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn map_can_add_columns() {
        let ds = Dataset::range(1, 4, 1)
            .unwrap()
            .map(|r| {
                let v = r.value("value")?.as_i64().unwrap_or_default();
                Ok(r.with_column("label", format!("n{v}")))
            })
            .unwrap();
        let labels: Vec<Value> = ds
            .iterator()
            .map(|el| el.unwrap().into_record().unwrap().value("label").unwrap().clone())
            .collect();
        assert_eq!(labels, vec![Value::from("n1"), Value::from("n2"), Value::from("n3")]);
    }

    #[test]
    fn failing_record_reports_its_index_and_pipeline_continues() {
        let ds = Dataset::range(0, 6, 1)
            .unwrap()
            .map(|r| {
                if r.value("value")?.as_i64() == Some(3) {
                    anyhow::bail!("three rejected");
                }
                Ok(r)
            })
            .unwrap();

        let mut it = ds.iterator();
        for expected in 0..3 {
            let record = it.get_next().unwrap().into_record().unwrap();
            assert_eq!(record.value("value").unwrap().as_i64(), Some(expected));
        }
        match it.get_next() {
            Err(Error::Transform { index, source }) => {
                assert_eq!(index, 3);
                assert_eq!(source.to_string(), "three rejected");
            }
            other => panic!("unexpected: {other:?}"),
        }
        let rest: Vec<i64> = it
            .map(|el| el.unwrap().into_record().unwrap().value("value").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(rest, vec![4, 5]);
    }

    #[test]
    fn parallel_map_matches_sequential() {
        let base = Dataset::range(0, 200, 1).unwrap();
        let sequential = values(&base.map(double).unwrap());
        for workers in [2, 3, 8] {
            let parallel = values(&base.map_parallel(double, workers).unwrap());
            assert_eq!(parallel, sequential);
        }
    }

    #[test]
    fn parallel_map_failure_keeps_index() {
        let ds = Dataset::range(0, 20, 1)
            .unwrap()
            .map_parallel(
                |r| {
                    if r.value("value")?.as_i64() == Some(7) {
                        anyhow::bail!("seven");
                    }
                    Ok(r)
                },
                4,
            )
            .unwrap();

        let results: Vec<_> = ds.iterator().collect();
        assert_eq!(results.len(), 20);
        assert!(matches!(results[7], Err(Error::Transform { index: 7, .. })));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 19);
    }

    /// Map function whose captured `Arc` is cloned into every worker
    fn counted_double(
        tracker: &Arc<()>,
    ) -> impl Fn(dsflow_core::Record) -> anyhow::Result<dsflow_core::Record> + Send + Sync + 'static {
        let tracker = Arc::clone(tracker);
        move |record| {
            let _held = &tracker;
            double(record)
        }
    }

    #[test]
    fn abandoned_parallel_iterator_releases_workers() {
        let tracker = Arc::new(());
        let ds = Dataset::range(0, 1_000_000, 1)
            .unwrap()
            .map_parallel(counted_double(&tracker), 4)
            .unwrap();
        let mut it = ds.iterator();
        assert!(it.get_next().is_ok());
        assert!(Arc::strong_count(&tracker) > 1);

        drop(it);
        drop(ds);
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    /// Decrements the live-worker count when its thread exits
    struct WorkerGuard(Arc<AtomicUsize>);

    impl Drop for WorkerGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    thread_local! {
        static WORKER_GUARD: RefCell<Option<WorkerGuard>> = const { RefCell::new(None) };
    }

    #[test]
    fn exhausted_parallel_iterator_releases_workers() {
        let live = Arc::new(AtomicUsize::new(0));
        let ds = {
            let live = Arc::clone(&live);
            Dataset::range(0, 50, 1)
                .unwrap()
                .map_parallel(
                    move |r| {
                        WORKER_GUARD.with(|guard| {
                            let mut guard = guard.borrow_mut();
                            if guard.is_none() {
                                live.fetch_add(1, Ordering::SeqCst);
                                *guard = Some(WorkerGuard(Arc::clone(&live)));
                            }
                        });
                        double(r)
                    },
                    4,
                )
                .unwrap()
        };

        let mut it = ds.iterator();
        assert_eq!(values(&ds).len(), 50);
        assert_eq!(live.load(Ordering::SeqCst), 0);

        assert!(it.get_next().is_ok());
        assert!(live.load(Ordering::SeqCst) >= 1);
        while it.get_next().is_ok() {}

        assert!(matches!(it.get_next(), Err(Error::OutOfRange)));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn upstream_errors_take_an_index_in_every_transform() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "x\n1\noops\n3\n4\n").unwrap();
        file.flush().unwrap();
        let options = CsvOptions::default().with_column_specs(vec![ColumnSpec::new("x", ColumnType::Integer)]);
        let source = csv_dataset(file.path(), options).unwrap();

        let reject_three = |r: &dsflow_core::Record| -> anyhow::Result<bool> {
            if r.value("x")?.as_i64() == Some(3) {
                anyhow::bail!("three");
            }
            Ok(true)
        };
        let map_three = move |r: dsflow_core::Record| reject_three(&r).map(|_| r);

        let pipelines = [
            source.map(map_three).unwrap(),
            source.map_parallel(map_three, 2).unwrap(),
            source.filter(reject_three).unwrap(),
        ];
        for ds in &pipelines {
            let results: Vec<_> = ds.iterator().collect();
            assert_eq!(results.len(), 4);
            assert!(results[0].is_ok());
            assert!(matches!(results[1], Err(Error::Parse { line: 3, .. })));
            assert!(matches!(results[2], Err(Error::Transform { index: 2, .. })));
            assert!(results[3].is_ok());
        }
    }

    #[test]
    fn filter_keeps_matching_records() {
        let ds = Dataset::range(0, 10, 1)
            .unwrap()
            .filter(|r| Ok(r.value("value")?.as_i64().unwrap_or_default() % 3 == 0))
            .unwrap();
        assert_eq!(values(&ds), vec![0, 3, 6, 9]);
    }

    #[test]
    fn filter_error_is_transform_error() {
        let ds = Dataset::range(0, 3, 1)
            .unwrap()
            .filter(|r| r.value("missing").map(|_| true).map_err(Into::into))
            .unwrap();
        let first = ds.iterator().get_next();
        assert!(matches!(first, Err(Error::Transform { index: 0, .. })));
    }
}
