use dsflow_core::{Element, Result};

use super::Cursor;

pub(crate) struct TakeCursor {
    input: Box<Cursor>,
    remaining: usize,
}

impl TakeCursor {
    pub fn new(input: Box<Cursor>, count: usize) -> Self {
        Self { input, remaining: count }
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let element = self.input.next()?;
        match element {
            Some(_) => self.remaining -= 1,
            None => self.remaining = 0,
        }
        Ok(element)
    }
}

pub(crate) struct SkipCursor {
    input: Box<Cursor>,
    to_skip: usize,
}

impl SkipCursor {
    pub fn new(input: Box<Cursor>, count: usize) -> Self {
        Self { input, to_skip: count }
    }

    pub fn next(&mut self) -> Result<Option<Element>> {
        while self.to_skip > 0 {
            if self.input.next()?.is_none() {
                self.to_skip = 0;
                return Ok(None);
            }
            self.to_skip -= 1;
        }
        self.input.next()
    }
}
