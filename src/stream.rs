//! The read surface shared by every stream in a filter chain.
//!
//! A filter chain is built bottom-up: a [`MemoryStream`] holding the raw
//! stream bytes sits at the bottom, and each decoder owns the stream directly
//! below it. Consumers only ever talk to the outermost stream through the
//! [`Stream`] trait.

use crate::error::Result;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

/// Pull-based, forward-only byte stream.
///
/// End of data is reported as `Ok(None)` from the single-byte readers and as a
/// short (possibly empty) slice from the multi-byte readers. A short read is
/// never an error by itself.
pub trait Stream {
    /// Read the next byte, or `None` at the end of data.
    fn get_byte(&mut self) -> Result<Option<u8>>;

    /// Read up to `length` bytes, or everything that remains when `length`
    /// is `None`.
    ///
    /// Fewer bytes than requested means the stream has reached its end.
    fn get_bytes(&mut self, length: Option<usize>) -> Result<&[u8]>;

    /// Like [`Stream::get_byte`] but does not advance the read position.
    fn peek_byte(&mut self) -> Result<Option<u8>>;

    /// Like [`Stream::get_bytes`] but does not advance the read position.
    fn peek_bytes(&mut self, length: Option<usize>) -> Result<&[u8]>;

    /// Current read position.
    fn pos(&self) -> usize;

    /// Advance the read position by `n` bytes without returning them.
    fn skip(&mut self, n: usize);

    /// Rewind to the first byte. Decoded data is kept, not decoded again.
    fn reset(&mut self);

    /// Exact length in bytes, when known without decoding.
    fn length(&self) -> Option<usize>;

    /// Size hint used to pre-size buffers of streams built on top of this one.
    fn length_hint(&self) -> usize {
        self.length().unwrap_or(0)
    }

    /// True iff the stream produces no bytes at all.
    ///
    /// Decoding streams decode until they either produce a byte or reach the
    /// end, so "not decoded yet" is never reported as empty.
    fn is_empty(&mut self) -> Result<bool>;

    /// Decode through `start + length` (or to the end when `length` is
    /// `None`) and return a read-only stream over that byte range.
    fn make_sub_stream(&mut self, start: usize, length: Option<usize>) -> Result<MemoryStream>;

    /// The raw streams at the bottom of this chain, for diagnostics such as
    /// the total encoded length.
    fn base_streams(&self) -> Option<Vec<&dyn Stream>>;

    /// Bytes past the read position that are available without decoding
    /// further. After a failed read these are the bytes decoded before the
    /// failure.
    fn buffered_bytes(&self) -> &[u8] {
        &[]
    }

    /// Read two bytes as a big-endian `u16`.
    fn get_uint16(&mut self) -> Result<Option<u16>> {
        let mut buf = [0u8; 2];
        for slot in buf.iter_mut() {
            match self.get_byte()? {
                Some(b) => *slot = b,
                None => return Ok(None),
            }
        }
        Ok(Some(BigEndian::read_u16(&buf)))
    }

    /// Read four bytes as a big-endian `i32`.
    fn get_int32(&mut self) -> Result<Option<i32>> {
        let mut buf = [0u8; 4];
        for slot in buf.iter_mut() {
            match self.get_byte()? {
                Some(b) => *slot = b,
                None => return Ok(None),
            }
        }
        Ok(Some(BigEndian::read_i32(&buf)))
    }
}

/// A fully materialized byte stream.
///
/// This is the ByteSource at the bottom of every filter chain. Sub-streams
/// share the underlying [`Bytes`] allocation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    bytes: Bytes,
    pos: usize,
}

impl MemoryStream {
    /// Create a stream over `bytes`.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            pos: 0,
        }
    }

    /// Create a stream over a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// A stream with no bytes. Used for stream objects whose length is zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The complete underlying byte range, regardless of the read position.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Number of bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn range(&self, length: Option<usize>) -> (usize, usize) {
        let len = self.bytes.len();
        let start = self.pos.min(len);
        let end = match length {
            Some(n) => start.saturating_add(n).min(len),
            None => len,
        };
        (start, end)
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Stream for MemoryStream {
    fn get_byte(&mut self) -> Result<Option<u8>> {
        match self.bytes.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(Some(b))
            },
            None => Ok(None),
        }
    }

    fn get_bytes(&mut self, length: Option<usize>) -> Result<&[u8]> {
        let (start, end) = self.range(length);
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.bytes.get(self.pos).copied())
    }

    fn peek_bytes(&mut self, length: Option<usize>) -> Result<&[u8]> {
        let (start, end) = self.range(length);
        Ok(&self.bytes[start..end])
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n);
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn length(&self) -> Option<usize> {
        Some(self.bytes.len())
    }

    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.bytes.is_empty())
    }

    fn make_sub_stream(&mut self, start: usize, length: Option<usize>) -> Result<MemoryStream> {
        let len = self.bytes.len();
        let start = start.min(len);
        let end = match length {
            Some(n) => start.saturating_add(n).min(len),
            None => len,
        };
        Ok(MemoryStream::new(self.bytes.slice(start..end)))
    }

    fn base_streams(&self) -> Option<Vec<&dyn Stream>> {
        Some(vec![self as &dyn Stream])
    }

    fn buffered_bytes(&self) -> &[u8] {
        let (start, end) = self.range(None);
        &self.bytes[start..end]
    }
}
