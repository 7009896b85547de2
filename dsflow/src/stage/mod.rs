//! Stage cursors
//!
//! Every [`Node`] variant has a matching cursor variant. An iterator builds
//! the cursor tree from its Dataset on the first pull; each cursor owns its
//! upstream cursor and its own buffers, so independent traversals share no
//! mutable state.

mod batch;
mod limit;
mod map;
mod repeat;
mod shuffle;

use std::sync::Arc;

use dsflow_core::{Element, PipelineConfig, RecordReader, Result};

use crate::dataset::{Dataset, Node};

pub(crate) use batch::BatchCursor;
pub(crate) use limit::{SkipCursor, TakeCursor};
pub(crate) use map::{FilterCursor, MapCursor, ParallelMapCursor};
pub(crate) use repeat::RepeatCursor;
pub(crate) use shuffle::ShuffleCursor;

/// Mixes nested repeat passes into distinct epochs
const EPOCH_MIX: u64 = 0x0000_0100_0000_01B3;

/// Per-traversal settings handed down the cursor tree
#[derive(Debug, Clone)]
pub(crate) struct CursorContext {
    /// Execution settings for the traversal
    pub config: Arc<PipelineConfig>,

    /// Repeat pass this cursor belongs to; 0 outside any repeat
    pub epoch: u64,
}

impl CursorContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            epoch: 0,
        }
    }

    /// Context for pass `pass` of a repeat at this level
    pub fn for_pass(&self, pass: u64) -> Self {
        Self {
            config: self.config.clone(),
            epoch: self.epoch.wrapping_mul(EPOCH_MIX).wrapping_add(pass),
        }
    }
}

/// Live state of one stage during a traversal
pub(crate) enum Cursor {
    Source(Box<dyn RecordReader>),
    Map(MapCursor),
    ParallelMap(ParallelMapCursor),
    Filter(FilterCursor),
    Shuffle(ShuffleCursor),
    Batch(BatchCursor),
    Repeat(RepeatCursor),
    Take(TakeCursor),
    Skip(SkipCursor),
}

impl Cursor {
    /// Build the cursor tree for `dataset`
    pub fn build(dataset: &Dataset, ctx: &CursorContext) -> Result<Self> {
        let cursor = match dataset.node() {
            Node::Source(source) => Cursor::Source(source.open()?),
            Node::Map {
                input,
                func,
                parallelism,
            } => {
                let upstream = Box::new(Cursor::build(input, ctx)?);
                let workers = parallelism.resolve(&ctx.config);
                if workers > 1 {
                    let window = ctx.config.map_window(workers)?;
                    Cursor::ParallelMap(ParallelMapCursor::new(upstream, func.clone(), workers, window)?)
                } else {
                    Cursor::Map(MapCursor::new(upstream, func.clone()))
                }
            }
            Node::Filter { input, predicate } => Cursor::Filter(FilterCursor::new(
                Box::new(Cursor::build(input, ctx)?),
                predicate.clone(),
            )),
            Node::Shuffle {
                input,
                buffer_size,
                seed,
            } => Cursor::Shuffle(ShuffleCursor::new(
                Box::new(Cursor::build(input, ctx)?),
                *buffer_size,
                *seed,
                ctx.epoch,
            )?),
            Node::Batch {
                input,
                batch_size,
                drop_remainder,
            } => Cursor::Batch(BatchCursor::new(
                Box::new(Cursor::build(input, ctx)?),
                *batch_size,
                *drop_remainder,
            )),
            Node::Repeat { input, count } => Cursor::Repeat(RepeatCursor::new(input.clone(), ctx.clone(), *count)),
            Node::Take { input, count } => {
                Cursor::Take(TakeCursor::new(Box::new(Cursor::build(input, ctx)?), *count))
            }
            Node::Skip { input, count } => {
                Cursor::Skip(SkipCursor::new(Box::new(Cursor::build(input, ctx)?), *count))
            }
        };
        Ok(cursor)
    }

    /// Pull the next element; `Ok(None)` once this stage is exhausted
    pub fn next(&mut self) -> Result<Option<Element>> {
        match self {
            Cursor::Source(reader) => Ok(reader.next_record()?.map(Element::Record)),
            Cursor::Map(cursor) => cursor.next(),
            Cursor::ParallelMap(cursor) => cursor.next(),
            Cursor::Filter(cursor) => cursor.next(),
            Cursor::Shuffle(cursor) => cursor.next(),
            Cursor::Batch(cursor) => cursor.next(),
            Cursor::Repeat(cursor) => cursor.next(),
            Cursor::Take(cursor) => cursor.next(),
            Cursor::Skip(cursor) => cursor.next(),
        }
    }
}
