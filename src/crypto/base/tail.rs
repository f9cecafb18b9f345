//! A writer that holds back the last `n` bytes of whatever goes through it.
//!
//! AEAD output is `ciphertext || tag` as one stream, and we don't know how
//! long the stream is until it ends. Putting a `TailBuffer` sized to the tag
//! in front of the real sink means everything that falls out of the buffer is
//! ciphertext, and whatever is left in it at the end is the tag. Memory use is
//! `n` bytes no matter how long the stream is.

use std::collections::VecDeque;
use std::io::{self, Write};

#[derive(Debug)]
pub struct TailBuffer<W: Write> {
    inner: W,
    held: VecDeque<u8>,
    capacity: usize,
    evicted: u64,
}

impl<W: Write> TailBuffer<W> {
    /// Wrap `inner`, holding back the last `capacity` bytes written.
    pub fn new(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            held: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// How many bytes have been passed through to the inner writer.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// The bytes currently held back, oldest first.
    pub fn retained(&self) -> Vec<u8> {
        self.held.iter().copied().collect()
    }

    /// Give back the inner writer and the held-back bytes (oldest first). If
    /// fewer than `capacity` bytes were ever written, you get all of them and
    /// the inner writer got nothing.
    pub fn into_parts(self) -> (W, Vec<u8>) {
        (self.inner, self.held.into_iter().collect())
    }
}

impl<W: Write> Write for TailBuffer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let total = self.held.len() + data.len();
        if total <= self.capacity {
            self.held.extend(data);
            return Ok(data.len());
        }
        // evict the oldest bytes: first out of the buffer, then straight off
        // the front of `data`
        let evict = total - self.capacity;
        let from_held = evict.min(self.held.len());
        if from_held > 0 {
            let (front, back) = self.held.as_slices();
            let n_front = from_held.min(front.len());
            self.inner.write_all(&front[..n_front])?;
            self.inner.write_all(&back[..from_held - n_front])?;
            self.held.drain(..from_held);
        }
        let from_data = evict - from_held;
        self.inner.write_all(&data[..from_data])?;
        self.held.extend(&data[from_data..]);
        self.evicted += evict as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
