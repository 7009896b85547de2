//! Dataset blueprints and the fluent pipeline builder
//!
//! A [`Dataset`] is an immutable description of one pipeline stage plus the
//! upstream Dataset it wraps. Building a pipeline does no I/O and runs no
//! user code; all work happens when a [`DatasetIterator`] pulls.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use dsflow_core::{
    Error, MemorySource, PipelineConfig, RangeSource, Record, RecordSource, Result, Schema, Value,
};

use crate::iterator::DatasetIterator;

/// Record transformation applied by a map stage
pub type MapFn = Arc<dyn Fn(Record) -> anyhow::Result<Record> + Send + Sync>;

/// Record predicate applied by a filter stage
pub type FilterFn = Arc<dyn Fn(&Record) -> anyhow::Result<bool> + Send + Sync>;

/// Worker count for a map stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parallelism {
    /// Exactly this many workers; 1 runs inline on the consumer thread
    Fixed(usize),

    /// Worker count taken from [`PipelineConfig::autotune_parallelism`]
    Autotune,
}

impl Parallelism {
    /// Worker count to use under `config`
    pub fn resolve(self, config: &PipelineConfig) -> usize {
        match self {
            Parallelism::Fixed(n) => config.clamp_parallelism(n),
            Parallelism::Autotune => config.clamp_parallelism(config.autotune_parallelism),
        }
    }
}

impl From<usize> for Parallelism {
    fn from(workers: usize) -> Self {
        Parallelism::Fixed(workers)
    }
}

/// One stage of a pipeline
pub(crate) enum Node {
    Source(Arc<dyn RecordSource>),
    Map {
        input: Dataset,
        func: MapFn,
        parallelism: Parallelism,
    },
    Filter {
        input: Dataset,
        predicate: FilterFn,
    },
    Shuffle {
        input: Dataset,
        buffer_size: usize,
        seed: Option<u64>,
    },
    Batch {
        input: Dataset,
        batch_size: usize,
        drop_remainder: bool,
    },
    Repeat {
        input: Dataset,
        count: Option<usize>,
    },
    Take {
        input: Dataset,
        count: usize,
    },
    Skip {
        input: Dataset,
        count: usize,
    },
}

impl Node {
    fn name(&self) -> &'static str {
        match self {
            Node::Source(_) => "source",
            Node::Map { .. } => "map",
            Node::Filter { .. } => "filter",
            Node::Shuffle { .. } => "shuffle",
            Node::Batch { .. } => "batch",
            Node::Repeat { .. } => "repeat",
            Node::Take { .. } => "take",
            Node::Skip { .. } => "skip",
        }
    }

    fn input(&self) -> Option<&Dataset> {
        match self {
            Node::Source(_) => None,
            Node::Map { input, .. }
            | Node::Filter { input, .. }
            | Node::Shuffle { input, .. }
            | Node::Batch { input, .. }
            | Node::Repeat { input, .. }
            | Node::Take { input, .. }
            | Node::Skip { input, .. } => Some(input),
        }
    }
}

/// Immutable, reusable pipeline blueprint
///
/// Cloning is cheap: clones share the same stage tree. Each stage method
/// returns a new Dataset wrapping this one.
#[derive(Clone)]
pub struct Dataset {
    /// This stage and, through it, all upstream stages
    node: Arc<Node>,

    /// Known record schema; unknown after a map
    schema: Option<Arc<Schema>>,

    /// Whether elements are batches rather than records
    batched: bool,
}

impl Dataset {
    /// Dataset reading every record of `source`
    pub fn from_source(source: Arc<dyn RecordSource>) -> Self {
        let schema = source.schema();
        Self {
            node: Arc::new(Node::Source(source)),
            schema: Some(schema),
            batched: false,
        }
    }

    /// Dataset over records already in memory
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        Ok(Self::from_source(Arc::new(MemorySource::from_records(records)?)))
    }

    /// Dataset over parallel column sequences, one record per index
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        Ok(Self::from_source(Arc::new(MemorySource::from_columns(columns)?)))
    }

    /// Dataset of integers `start, start + step, ...` up to `end` (exclusive)
    /// in a column named `value`
    pub fn range(start: i64, end: i64, step: i64) -> Result<Self> {
        Ok(Self::from_source(Arc::new(RangeSource::new(start, end, step)?)))
    }

    /// Record schema, if known
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Whether this Dataset yields batches
    pub fn is_batched(&self) -> bool {
        self.batched
    }

    /// Stage names from the source down to this stage
    pub fn stages(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(dataset) = current {
            names.push(dataset.node.name());
            current = dataset.node.input();
        }
        names.reverse();
        names
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    fn wrap(&self, node: Node, schema: Option<Arc<Schema>>, batched: bool) -> Self {
        Self {
            node: Arc::new(node),
            schema,
            batched,
        }
    }

    fn require_records(&self, stage: &str) -> Result<()> {
        if self.batched {
            return Err(Error::InvalidArgument(format!(
                "{stage} expects record elements but the dataset is already batched"
            )));
        }
        Ok(())
    }

    /// Apply `func` to every record on the consumer thread
    pub fn map<F>(&self, func: F) -> Result<Self>
    where
        F: Fn(Record) -> anyhow::Result<Record> + Send + Sync + 'static,
    {
        self.map_parallel(func, Parallelism::Fixed(1))
    }

    /// Apply `func` to every record using up to `parallelism` workers
    ///
    /// Output order always equals input order.
    pub fn map_parallel<F>(&self, func: F, parallelism: impl Into<Parallelism>) -> Result<Self>
    where
        F: Fn(Record) -> anyhow::Result<Record> + Send + Sync + 'static,
    {
        self.require_records("map")?;
        let parallelism = parallelism.into();
        if parallelism == Parallelism::Fixed(0) {
            return Err(Error::InvalidArgument("map parallelism must be at least 1".into()));
        }

        Ok(self.wrap(
            Node::Map {
                input: self.clone(),
                func: Arc::new(func),
                parallelism,
            },
            None,
            false,
        ))
    }

    /// Keep only records for which `predicate` returns true
    pub fn filter<F>(&self, predicate: F) -> Result<Self>
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.require_records("filter")?;
        Ok(self.wrap(
            Node::Filter {
                input: self.clone(),
                predicate: Arc::new(predicate),
            },
            self.schema.clone(),
            false,
        ))
    }

    /// Randomize element order through a buffer of `buffer_size` slots
    pub fn shuffle(&self, buffer_size: usize) -> Result<Self> {
        self.shuffle_inner(buffer_size, None)
    }

    /// Like [`Dataset::shuffle`] but reproducible across traversals
    pub fn shuffle_with_seed(&self, buffer_size: usize, seed: u64) -> Result<Self> {
        self.shuffle_inner(buffer_size, Some(seed))
    }

    fn shuffle_inner(&self, buffer_size: usize, seed: Option<u64>) -> Result<Self> {
        if buffer_size == 0 {
            return Err(Error::InvalidArgument("shuffle buffer_size must be at least 1".into()));
        }
        Ok(self.wrap(
            Node::Shuffle {
                input: self.clone(),
                buffer_size,
                seed,
            },
            self.schema.clone(),
            self.batched,
        ))
    }

    /// Group consecutive records into batches of `batch_size`
    ///
    /// The final short batch is emitted unless `drop_remainder` is set.
    pub fn batch(&self, batch_size: usize, drop_remainder: bool) -> Result<Self> {
        self.require_records("batch")?;
        if batch_size == 0 {
            return Err(Error::InvalidArgument("batch_size must be at least 1".into()));
        }
        Ok(self.wrap(
            Node::Batch {
                input: self.clone(),
                batch_size,
                drop_remainder,
            },
            self.schema.clone(),
            true,
        ))
    }

    /// Replay the upstream `count` times, or forever when `None`
    pub fn repeat(&self, count: Option<usize>) -> Result<Self> {
        Ok(self.wrap(
            Node::Repeat {
                input: self.clone(),
                count,
            },
            self.schema.clone(),
            self.batched,
        ))
    }

    /// Replay the upstream indefinitely
    pub fn repeat_forever(&self) -> Result<Self> {
        self.repeat(None)
    }

    /// Shuffle then repeat; with a seed each pass reshuffles differently
    pub fn shuffle_and_repeat(&self, buffer_size: usize, count: Option<usize>, seed: Option<u64>) -> Result<Self> {
        self.shuffle_inner(buffer_size, seed)?.repeat(count)
    }

    /// Yield at most the first `count` elements
    pub fn take(&self, count: usize) -> Result<Self> {
        Ok(self.wrap(
            Node::Take {
                input: self.clone(),
                count,
            },
            self.schema.clone(),
            self.batched,
        ))
    }

    /// Drop the first `count` elements
    pub fn skip(&self, count: usize) -> Result<Self> {
        Ok(self.wrap(
            Node::Skip {
                input: self.clone(),
                count,
            },
            self.schema.clone(),
            self.batched,
        ))
    }

    /// Start a traversal with the default configuration
    pub fn iterator(&self) -> DatasetIterator {
        DatasetIterator::new(self.clone(), PipelineConfig::default())
    }

    /// Start a traversal with an explicit configuration
    pub fn iterator_with_config(&self, config: &PipelineConfig) -> Result<DatasetIterator> {
        config.validate()?;
        Ok(DatasetIterator::new(self.clone(), config.clone()))
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("stages", &self.stages())
            .field("schema", &self.schema.as_ref().map(ToString::to_string))
            .field("batched", &self.batched)
            .finish()
    }
}
