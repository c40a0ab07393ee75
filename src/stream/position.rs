//! Absolute byte ranges within a stream

use std::ops::Range;

/// Half-open byte range `[from, to)` in absolute stream coordinates
///
/// Offsets count from the first byte ever written to the stream, so the
/// ranges produced by successive writes never overlap and never go backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// First byte of the range
    pub from: usize,
    /// One past the last byte of the range
    pub to: usize,
}

impl Position {
    /// Create a new range
    pub fn new(from: usize, to: usize) -> Self {
        debug_assert!(from <= to, "position must satisfy from <= to");
        Self { from, to }
    }

    /// Range covering `len` bytes starting at `from`
    pub fn at(from: usize, len: usize) -> Self {
        Self::new(from, from + len)
    }

    /// Number of bytes covered
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// Check if the range covers no bytes
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Convert to a slice range
    pub fn range(&self) -> Range<usize> {
        self.from..self.to
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}
