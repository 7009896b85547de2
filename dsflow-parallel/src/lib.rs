//! Order-preserving parallel map execution
//!
//! An [`OrderedPool`] applies a function to a stream of items on a fixed set
//! of worker threads. The consumer dispatches items tagged with their
//! stream index, at most `window` ahead of the next index it will release,
//! and reassembles results strictly in index order. The window is the
//! backpressure bound: nothing is pulled from upstream while `window` items
//! are dispatched but not yet released.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use dsflow_core::{Error, Result};

type Job<I> = (u64, I);
type Outcome<O> = (u64, Result<O>);

/// Fixed worker pool that re-emits results in input order
pub struct OrderedPool<I, O> {
    /// Job queue; dropped to stop the workers
    jobs: Option<Sender<Job<I>>>,

    /// Completed results, in completion order
    results: Receiver<Outcome<O>>,

    /// Worker thread handles
    workers: Vec<JoinHandle<()>>,

    /// Set when the pool is being torn down; workers skip queued jobs
    cancelled: Arc<AtomicBool>,

    /// Maximum dispatched-but-unreleased items
    window: usize,

    /// Index given to the next dispatched item
    next_dispatch: u64,

    /// Index of the next item to release
    next_emit: u64,

    /// Completed results waiting for their turn
    pending: BTreeMap<u64, Result<O>>,

    /// Whether upstream has reported exhaustion
    upstream_done: bool,
}

impl<I, O> OrderedPool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Spawn `workers` threads applying `func` to `(index, item)` jobs
    ///
    /// `window` must be at least `workers` for every worker to be kept busy.
    pub fn new<F>(workers: usize, window: usize, func: F) -> Result<Self>
    where
        F: Fn(u64, I) -> Result<O> + Send + Sync + 'static,
    {
        if workers == 0 || window == 0 {
            return Err(Error::InvalidArgument(
                "Parallel map needs at least one worker and a non-empty window".into(),
            ));
        }

        let (job_tx, job_rx) = bounded::<Job<I>>(window);
        let (result_tx, result_rx) = bounded::<Outcome<O>>(window);
        let cancelled = Arc::new(AtomicBool::new(false));
        let func = Arc::new(func);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let cancelled = cancelled.clone();
            let func = func.clone();

            let handle = thread::Builder::new()
                .name(format!("dsflow-map-{worker_id}"))
                .spawn(move || worker_loop(&jobs, &results, &cancelled, func.as_ref()))
                .map_err(|e| Error::WorkerPool(format!("failed to spawn worker {worker_id}: {e}")))?;
            handles.push(handle);
        }
        debug!(workers, window, "spawned parallel map workers");

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers: handles,
            cancelled,
            window,
            next_dispatch: 0,
            next_emit: 0,
            pending: BTreeMap::new(),
            upstream_done: false,
        })
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Items dispatched but not yet released
    pub fn in_flight(&self) -> usize {
        usize::try_from(self.next_dispatch - self.next_emit).unwrap_or(usize::MAX)
    }

    /// Release the next result in index order, pulling from `upstream` as needed
    ///
    /// An upstream error takes the index slot it was pulled at and is
    /// released in order, like a failed result.
    pub fn next_with<U>(&mut self, mut upstream: U) -> Result<Option<O>>
    where
        U: FnMut() -> Result<Option<I>>,
    {
        loop {
            while !self.upstream_done && self.in_flight() < self.window {
                let index = self.next_dispatch;
                match upstream() {
                    Ok(Some(item)) => self.dispatch(index, item)?,
                    Ok(None) => {
                        self.upstream_done = true;
                        break;
                    }
                    Err(err) => {
                        self.pending.insert(index, Err(err));
                    }
                }
                self.next_dispatch += 1;
            }

            if let Some(result) = self.pending.remove(&self.next_emit) {
                self.next_emit += 1;
                return result.map(Some);
            }

            if self.next_emit == self.next_dispatch {
                return Ok(None);
            }

            let (index, result) = self
                .results
                .recv()
                .map_err(|_| Error::WorkerPool("all map workers stopped".into()))?;
            trace!(index, waiting_for = self.next_emit, "parallel map result arrived");
            self.pending.insert(index, result);
        }
    }

    fn dispatch(&mut self, index: u64, item: I) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::WorkerPool("worker pool already shut down".into()))?;
        jobs.send((index, item))
            .map_err(|_| Error::WorkerPool("all map workers stopped".into()))
    }
}

impl<I, O> Drop for OrderedPool<I, O> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("parallel map workers stopped");
    }
}

fn worker_loop<I, O, F>(
    jobs: &Receiver<Job<I>>,
    results: &Sender<Outcome<O>>,
    cancelled: &AtomicBool,
    func: &F,
) where
    F: Fn(u64, I) -> Result<O>,
{
    for (index, item) in jobs.iter() {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| func(index, item))).unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            Err(Error::transform(index, anyhow::anyhow!("worker panicked: {message}")))
        });

        if results.send((index, outcome)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
