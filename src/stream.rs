//! Consumable byte-stream cursor over one fuzz iteration's input.
//!
//! The cursor is the sole source of nondeterminism in the mock kernel: every
//! readiness decision, advertised read length, and inbound connection is
//! derived from it, so a fixed input replays identically.
//!
//! Invariants:
//! - `remaining()` never exceeds the input length.
//! - Consumption is destructive; a byte is never revisited.

/// Shrinking view over the iteration's input bytes.
#[derive(Clone, Debug)]
pub struct ByteCursor {
    data: Vec<u8>,
    pos: usize,
}

impl ByteCursor {
    /// Take ownership of one iteration's input.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Bytes not yet consumed.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the stream is exhausted.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Bytes consumed so far.
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Consume exactly one byte, or `None` without consuming when exhausted.
    #[inline(always)]
    pub fn next_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Copy up to `n` bytes into `out` and consume them.
    ///
    /// The count actually copied is `min(n, remaining, out.len())`; zero is a
    /// valid outcome.
    pub fn take(&mut self, n: usize, out: &mut [u8]) -> usize {
        let n = n.min(self.remaining()).min(out.len());
        out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}
