//! Lazy concatenating reader
//!
//! A commit body is the ordered concatenation of many file streams. Each
//! stream is opened only when its predecessor is exhausted, so building a
//! commit never holds more than one file open.

use std::collections::VecDeque;
use std::io::{self, Read};

/// Deferred stream constructor; invoked once when the stream's turn comes.
pub type OpenReaderFn = Box<dyn FnOnce() -> io::Result<Box<dyn Read + Send>> + Send>;

/// Ordered concatenation of zero or more deferred streams.
#[derive(Default)]
pub struct MultiReader {
    pending: VecDeque<OpenReaderFn>,
    current: Option<Box<dyn Read + Send>>,
}

impl MultiReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next stream.
    pub fn add(&mut self, open: OpenReaderFn) {
        self.pending.push_back(open);
    }

    /// Drop the live stream and every stream not yet opened.
    pub fn close(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}

impl Read for MultiReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if self.current.is_none() {
                match self.pending.pop_front() {
                    Some(open) => self.current = Some(open()?),
                    None => break,
                }
            }
            let r = match self.current.as_mut() {
                Some(r) => r,
                None => break,
            };
            match r.read(&mut buf[n..]) {
                Ok(0) => self.current = None,
                Ok(m) => n += m,
                Err(e) => {
                    if n > 0 {
                        // surface the error on the next call
                        return Ok(n);
                    }
                    return Err(e);
                }
            }
        }
        Ok(n)
    }
}
