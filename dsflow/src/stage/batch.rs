use std::mem;

use dsflow_core::{Batch, Element, Record, Result};
use tracing::trace;

use super::Cursor;

pub(crate) struct BatchCursor {
    input: Box<Cursor>,
    batch_size: usize,
    drop_remainder: bool,
    /// Records accumulated toward the next batch
    pending: Vec<Record>,
    upstream_done: bool,
}

impl BatchCursor {
    pub fn new(input: Box<Cursor>, batch_size: usize, drop_remainder: bool) -> Self {
        Self {
            input,
            batch_size,
            drop_remainder,
            pending: Vec::with_capacity(batch_size.min(4096)),
            upstream_done: false,
        }
    }

    /// An upstream error is returned as-is; accumulated records are kept
    pub fn next(&mut self) -> Result<Option<Element>> {
        while !self.upstream_done && self.pending.len() < self.batch_size {
            match self.input.next()? {
                Some(element) => self.pending.push(element.into_record()?),
                None => self.upstream_done = true,
            }
        }

        if self.pending.len() < self.batch_size {
            if self.pending.is_empty() {
                return Ok(None);
            }
            if self.drop_remainder {
                trace!(dropped = self.pending.len(), "dropping partial batch");
                self.pending.clear();
                return Ok(None);
            }
        }

        let records = mem::take(&mut self.pending);
        Ok(Some(Element::Batch(Batch::new(records)?)))
    }
}

#[cfg(test)]
mod tests {
    use dsflow_core::Error;
    use proptest::prelude::*;
    use test_case::test_case;

    use crate::Dataset;

    fn batch_sizes(ds: &Dataset) -> Vec<usize> {
        ds.iterator().map(|el| el.unwrap().into_batch().unwrap().len()).collect()
    }

    #[test]
    fn one_to_ten_in_fives() {
        let ds = Dataset::range(1, 11, 1).unwrap().batch(5, false).unwrap();
        let mut it = ds.iterator();

        for expected in [vec![1, 2, 3, 4, 5], vec![6, 7, 8, 9, 10]] {
            let batch = it.get_next().unwrap().into_batch().unwrap();
            let values: Vec<i64> = batch
                .column("value")
                .unwrap()
                .into_iter()
                .map(|v| v.as_i64().unwrap())
                .collect();
            assert_eq!(values, expected);
        }
        assert!(matches!(it.get_next(), Err(Error::OutOfRange)));
    }

    #[test_case(10, 3, false => vec![3, 3, 3, 1])]
    #[test_case(10, 3, true => vec![3, 3, 3])]
    #[test_case(2, 5, true => Vec::<usize>::new())]
    #[test_case(2, 5, false => vec![2])]
    #[test_case(0, 4, false => Vec::<usize>::new())]
    fn partial_batch_handling(len: i64, size: usize, drop_remainder: bool) -> Vec<usize> {
        let ds = Dataset::range(0, len, 1).unwrap().batch(size, drop_remainder).unwrap();
        batch_sizes(&ds)
    }

    #[test]
    fn batches_keep_source_schema() {
        let ds = Dataset::range(0, 4, 1).unwrap().batch(2, false).unwrap();
        let batch = ds.iterator().get_next().unwrap().into_batch().unwrap();
        assert_eq!(**batch.schema(), **ds.schema().unwrap());
    }

    proptest! {
        #[test]
        fn batch_count_matches_rounding(len in 0i64..200, size in 1usize..40, drop_remainder: bool) {
            let ds = Dataset::range(0, len, 1).unwrap().batch(size, drop_remainder).unwrap();
            let sizes = batch_sizes(&ds);
            let len = usize::try_from(len).unwrap();
            let expected = if drop_remainder { len / size } else { len.div_ceil(size) };
            prop_assert_eq!(sizes.len(), expected);
            prop_assert!(sizes.iter().all(|&s| s > 0 && s <= size));
            let total: usize = sizes.iter().sum();
            prop_assert_eq!(total, if drop_remainder { expected * size } else { len });
        }
    }
}
