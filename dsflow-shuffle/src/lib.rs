//! Bounded random-eviction shuffle buffer
//!
//! A [`ShuffleBuffer`] of capacity `C` holds at most `C` pending items. On
//! each pull it tops itself up from upstream, then evicts one occupied slot
//! chosen uniformly at random. The result is a uniformly random
//! permutation within a sliding window of `C` items; it is a full shuffle
//! only when `C` is at least the length of the stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use dsflow_core::{Error, Result};

/// Seed derivation multiplier for successive passes (64-bit golden ratio)
const PASS_SEED_STEP: u64 = 0x9E37_79B9_7F4A_7C15;

/// Derive the seed of pass `pass` from a base seed
///
/// Pass 0 uses the base seed unchanged.
pub fn seed_for_pass(seed: u64, pass: u64) -> u64 {
    seed.wrapping_add(pass.wrapping_mul(PASS_SEED_STEP))
}

/// Fixed-capacity holding area that releases items in random order
#[derive(Debug)]
pub struct ShuffleBuffer<T> {
    /// Maximum number of pending items
    capacity: usize,

    /// Pending items; slot order carries no meaning
    slots: Vec<T>,

    /// Whether upstream has reported exhaustion
    upstream_done: bool,

    /// Random source for slot selection
    rng: StdRng,
}

impl<T> ShuffleBuffer<T> {
    /// Create a buffer seeded from the operating system
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    /// Create a buffer with a reproducible seed
    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self> {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("Shuffle buffer size must be at least 1".into()));
        }

        Ok(Self {
            capacity,
            // Cap the up-front allocation; huge capacities grow on demand
            slots: Vec::with_capacity(capacity.min(4096)),
            upstream_done: false,
            rng,
        })
    }

    /// Maximum number of pending items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check whether no items are pending
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release the next item, pulling from `upstream` as needed
    ///
    /// `upstream` returns `Ok(None)` once exhausted and is not called again
    /// afterwards. An upstream error is returned as-is; items already
    /// buffered stay pending for later pulls.
    pub fn next_with<F>(&mut self, mut upstream: F) -> Result<Option<T>>
    where
        F: FnMut() -> Result<Option<T>>,
    {
        while !self.upstream_done && self.slots.len() < self.capacity {
            match upstream()? {
                Some(item) => self.slots.push(item),
                None => {
                    trace!(pending = self.slots.len(), "shuffle upstream exhausted");
                    self.upstream_done = true;
                }
            }
        }

        if self.slots.is_empty() {
            return Ok(None);
        }

        let slot = self.rng.random_range(0..self.slots.len());
        Ok(Some(self.slots.swap_remove(slot)))
    }
}
