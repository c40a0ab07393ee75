//! Append-only growable byte storage
//!
//! Growth follows a fixed policy so that capacity behaviour is predictable
//! for a producer running on a real-time capture path:
//!
//! 1. If the new bytes fit in the spare capacity, extend in place.
//! 2. If nothing has ever been allocated and the request is small, allocate
//!    exactly [`SMALL_BUFFER_SIZE`] bytes.
//! 3. Otherwise allocate `max(len + n, 2 * capacity)` and copy the existing
//!    content over.

use crate::error::{Error, Result};

use super::position::Position;

/// Initial allocation for small first writes
pub const SMALL_BUFFER_SIZE: usize = 64;

/// Largest capacity the buffer may reach
const MAX_CAPACITY: usize = isize::MAX as usize;

/// Growable byte buffer addressed by absolute position
#[derive(Debug, Default)]
pub struct StreamBuffer {
    data: Vec<u8>,
}

impl StreamBuffer {
    /// Create an empty buffer without allocating
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no bytes are stored
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Allocated capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Append `bytes`, returning the range they now occupy
    pub fn write(&mut self, bytes: &[u8]) -> Result<Position> {
        let start = self.data.len();
        self.grow(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(Position::at(start, bytes.len()))
    }

    /// Borrow the bytes of `pos`
    pub fn slice(&self, pos: Position) -> Result<&[u8]> {
        if pos.from > pos.to || pos.to > self.data.len() {
            return Err(Error::OutOfRange {
                position: pos,
                len: self.data.len(),
            });
        }
        Ok(&self.data[pos.range()])
    }

    /// Drop all content, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Make room for `n` more bytes according to the growth policy
    fn grow(&mut self, n: usize) -> Result<()> {
        let cap = self.data.capacity();
        let new_cap = next_capacity(self.data.len(), cap, n)?;
        if new_cap <= cap {
            return Ok(());
        }

        let mut grown = Vec::new();
        grown.try_reserve_exact(new_cap).map_err(|_| Error::TooLarge {
            requested: new_cap,
        })?;
        grown.extend_from_slice(&self.data);
        self.data = grown;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }
}

/// Capacity needed to append `n` bytes to `len` bytes stored in `cap`
///
/// Returns `cap` itself when no growth is needed.
pub fn next_capacity(len: usize, cap: usize, n: usize) -> Result<usize> {
    let required = len
        .checked_add(n)
        .filter(|required| *required <= MAX_CAPACITY)
        .ok_or(Error::TooLarge {
            requested: len.saturating_add(n),
        })?;

    if required <= cap {
        return Ok(cap);
    }
    if cap == 0 && n <= SMALL_BUFFER_SIZE {
        return Ok(SMALL_BUFFER_SIZE);
    }
    Ok(required.max(cap.saturating_mul(2)).min(MAX_CAPACITY))
}
