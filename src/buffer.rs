// ABOUTME: Append-only tail, consume-from-head byte queue backing the RESP3 decoder
// ABOUTME: Thin wrapper over bytes::BytesMut so append/consume stay O(1) amortized

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Raised by [`ByteBuffer::consume`] when fewer than the requested number of
/// bytes are available.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("buffer underflow: requested {requested} bytes, only {available} available")]
pub struct Underflow {
    pub requested: usize,
    pub available: usize,
}

/// A FIFO of bytes with append-to-tail and consume-from-head semantics.
///
/// `BytesMut::advance` trims consumed bytes from the head without a copy, so
/// `append`/`consume` are O(1) amortized the same way `BytesMut` is used in
/// `Connection::parse_frame` in the teacher crate.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    inner: BytesMut,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self { inner: BytesMut::new() }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Removes and returns exactly the first `n` bytes, or fails with
    /// [`Underflow`] if fewer than `n` bytes are buffered.
    pub fn consume(&mut self, n: usize) -> Result<Bytes, Underflow> {
        if self.inner.len() < n {
            return Err(Underflow { requested: n, available: self.inner.len() });
        }
        Ok(self.inner.split_to(n).freeze())
    }

    /// Offset of the first occurrence of `needle`, or `None` if absent.
    pub fn index_of(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || self.inner.len() < needle.len() {
            return None;
        }
        self.inner.windows(needle.len()).position(|w| w == needle)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Exposes the raw `BytesMut` so a connection can read directly off the
    /// socket into it via `tokio::io::AsyncReadExt::read_buf`.
    pub(crate) fn raw_mut(&mut self) -> &mut BytesMut {
        &mut self.inner
    }
}
