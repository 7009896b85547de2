//! Per-traversal iterator state machine

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use dsflow_core::{Element, Error, PipelineConfig, Result};

use crate::dataset::Dataset;
use crate::stage::{Cursor, CursorContext};

/// Lifecycle of a [`DatasetIterator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Created; no cursor built and no data read yet
    Ready,

    /// At least one pull attempted successfully
    Active,

    /// End of data reached; every further pull fails with `OutOfRange`
    Exhausted,
}

/// Stateful cursor over one traversal of a [`Dataset`]
///
/// The stage cursors (open files, shuffle buffers, map workers) are built on
/// the first pull and released on exhaustion or when the iterator is
/// dropped. There is no reset; start a new traversal with
/// [`Dataset::iterator`].
pub struct DatasetIterator {
    /// Identity used in log events
    id: Uuid,

    /// Blueprint being traversed
    dataset: Dataset,

    /// Settings applied when the cursor tree is built
    context: CursorContext,

    /// Root cursor, present while Active
    cursor: Option<Cursor>,

    /// Current lifecycle state
    state: IteratorState,

    /// Elements returned so far
    produced: u64,
}

impl DatasetIterator {
    pub(crate) fn new(dataset: Dataset, config: PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset,
            context: CursorContext::new(config),
            cursor: None,
            state: IteratorState::Ready,
            produced: 0,
        }
    }

    /// Unique identity of this traversal
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Number of elements returned so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Pull the next element
    ///
    /// Returns [`Error::OutOfRange`] at the end of data and on every call
    /// after that. Any other error leaves the iterator usable; the next call
    /// continues with the following element. If the stages cannot be built
    /// (for example a file cannot be opened) the iterator stays Ready.
    pub fn get_next(&mut self) -> Result<Element> {
        if self.state == IteratorState::Exhausted {
            return Err(Error::OutOfRange);
        }
        if self.cursor.is_none() {
            let cursor = Cursor::build(&self.dataset, &self.context)?;
            self.state = IteratorState::Active;
            debug!(iterator = %self.id, stages = ?self.dataset.stages(), "iterator started");
            self.cursor = Some(cursor);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(Error::OutOfRange);
        };

        match cursor.next()? {
            Some(element) => {
                self.produced += 1;
                Ok(element)
            }
            None => {
                self.state = IteratorState::Exhausted;
                self.cursor = None;
                debug!(iterator = %self.id, produced = self.produced, "iterator exhausted");
                Err(Error::OutOfRange)
            }
        }
    }
}

/// Yields elements until the end of data; errors other than end of data are
/// yielded as `Err` items
impl Iterator for DatasetIterator {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            Ok(element) => Some(Ok(element)),
            Err(Error::OutOfRange) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl Drop for DatasetIterator {
    fn drop(&mut self) {
        if self.state == IteratorState::Active {
            debug!(iterator = %self.id, produced = self.produced, "iterator abandoned");
        }
    }
}

impl fmt::Debug for DatasetIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetIterator")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}
