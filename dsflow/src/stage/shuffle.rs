use dsflow_core::{Element, Result};
use dsflow_shuffle::{seed_for_pass, ShuffleBuffer};

use super::Cursor;

pub(crate) struct ShuffleCursor {
    input: Box<Cursor>,
    buffer: ShuffleBuffer<Element>,
}

impl ShuffleCursor {
    /// A seeded shuffle derives a distinct seed for every repeat epoch
    pub fn new(input: Box<Cursor>, buffer_size: usize, seed: Option<u64>, epoch: u64) -> Result<Self> {
        let buffer = match seed {
            Some(seed) => ShuffleBuffer::with_seed(buffer_size, seed_for_pass(seed, epoch))?,
            None => ShuffleBuffer::new(buffer_size)?,
        };
        Ok(Self { input, buffer })
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        let input = &mut self.input;
        self.buffer.next_with(|| input.next())
    }
}
