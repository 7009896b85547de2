use dsflow_core::{Element, Result};
use tracing::trace;

use super::{Cursor, CursorContext};
use crate::dataset::Dataset;

/// Replays its upstream, building a fresh upstream cursor for every pass
pub(crate) struct RepeatCursor {
    input: Dataset,
    ctx: CursorContext,
    /// Passes to run; `None` repeats until a pass comes up empty
    count: Option<usize>,
    pass: usize,
    current: Option<Box<Cursor>>,
    yielded_this_pass: bool,
    finished: bool,
}

impl RepeatCursor {
    pub fn new(input: Dataset, ctx: CursorContext, count: Option<usize>) -> Self {
        Self {
            input,
            ctx,
            count,
            pass: 0,
            current: None,
            yielded_this_pass: false,
            finished: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        while !self.finished {
            if self.current.is_none() {
                if self.count.is_some_and(|count| self.pass >= count) {
                    self.finished = true;
                    break;
                }
                let pass_ctx = self.ctx.for_pass(self.pass as u64);
                self.yielded_this_pass = false;
                self.current = Some(Box::new(Cursor::build(&self.input, &pass_ctx)?));
            }
            let Some(cursor) = self.current.as_mut() else {
                break;
            };

            if let Some(element) = cursor.next()? {
                self.yielded_this_pass = true;
                return Ok(Some(element));
            }

            trace!(pass = self.pass, "repeat pass finished");
            self.current = None;
            self.pass += 1;
            if !self.yielded_this_pass && self.count.is_none() {
                // An empty pass would loop forever
                self.finished = true;
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use dsflow_core::Error;
    use proptest::prelude::*;
    use test_case::test_case;

    use crate::Dataset;

    fn count(ds: &Dataset) -> usize {
        ds.iterator().map(|el| el.unwrap().record_count()).sum()
    }

    #[test_case(Some(0) => 0)]
    #[test_case(Some(1) => 7)]
    #[test_case(Some(3) => 21)]
    fn total_is_length_times_count(count_arg: Option<usize>) -> usize {
        count(&Dataset::range(0, 7, 1).unwrap().repeat(count_arg).unwrap())
    }

    #[test]
    fn zero_repeat_is_immediately_exhausted() {
        let ds = Dataset::range(0, 5, 1).unwrap().repeat(Some(0)).unwrap();
        assert!(matches!(ds.iterator().get_next(), Err(Error::OutOfRange)));
    }

    #[test]
    fn forever_keeps_going() {
        let ds = Dataset::range(0, 3, 1).unwrap().repeat_forever().unwrap().take(100).unwrap();
        assert_eq!(count(&ds), 100);
    }

    #[test]
    fn forever_over_empty_source_ends() {
        let ds = Dataset::range(0, 0, 1).unwrap().repeat_forever().unwrap();
        assert_eq!(count(&ds), 0);
    }

    #[test]
    fn each_pass_restarts_upstream_state() {
        let ds = Dataset::range(0, 5, 1).unwrap().batch(2, false).unwrap().repeat(Some(2)).unwrap();
        let sizes: Vec<usize> = ds.iterator().map(|el| el.unwrap().record_count()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 2, 2, 1]);
    }

    #[test]
    fn upstream_functions_rerun_every_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let ds = Dataset::range(0, 4, 1)
            .unwrap()
            .map(move |r| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(r)
            })
            .unwrap()
            .repeat(Some(3))
            .unwrap();
        assert_eq!(count(&ds), 12);
        assert_eq!(calls.load(Ordering::SeqCst), 12);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn total_records_account_for_repeat_and_batching(
            len in 0i64..40,
            repeats in 0usize..4,
            size in 1usize..8,
            drop_remainder: bool,
        ) {
            let ds = Dataset::range(0, len, 1)
                .unwrap()
                .shuffle(5)
                .unwrap()
                .repeat(Some(repeats))
                .unwrap()
                .batch(size, drop_remainder)
                .unwrap();
            let total = usize::try_from(len).unwrap() * repeats;
            let expected = if drop_remainder { total / size * size } else { total };
            prop_assert_eq!(count(&ds), expected);
        }
    }
}
