//! Buffered, lazily decoding base shared by every filter.
//!
//! A filter only implements [`StreamDecoder::read_block`]: decode roughly one
//! chunk of upstream data and append it to the [`DecodeBuffer`], or mark the
//! buffer as finished. Every read operation of [`Stream`] is derived from that
//! by [`DecodeStream`], which decodes only as far as a request demands.

use crate::error::Result;
use crate::stream::{MemoryStream, Stream};

/// Smallest buffer growth quantum.
const DEFAULT_MIN_BUFFER_LENGTH: usize = 512;

/// Growable output buffer of a decoding stream.
///
/// The allocated capacity only ever grows, by doubling from a power-of-two
/// minimum until the requested size fits. `len()` counts the decoded bytes;
/// once `is_eof()` is true it never grows again.
#[derive(Debug, Clone)]
pub struct DecodeBuffer {
    data: Vec<u8>,
    length: usize,
    eof: bool,
    min_buffer_length: usize,
}

impl DecodeBuffer {
    /// Create an empty buffer.
    ///
    /// The size hint is rounded up to a power of two and used as the first
    /// allocation size. Nothing is allocated until the first write, so streams
    /// that are never read cost nothing.
    pub fn new(maybe_min_buffer_length: Option<usize>) -> Self {
        let mut min_buffer_length = DEFAULT_MIN_BUFFER_LENGTH;
        if let Some(hint) = maybe_min_buffer_length {
            while min_buffer_length < hint {
                match min_buffer_length.checked_mul(2) {
                    Some(doubled) => min_buffer_length = doubled,
                    None => break,
                }
            }
        }

        Self {
            data: Vec::new(),
            length: 0,
            eof: false,
            min_buffer_length,
        }
    }

    /// Wrap bytes that were decoded in one piece. The buffer is finished.
    pub(crate) fn from_decoded(data: Vec<u8>) -> Self {
        Self {
            length: data.len(),
            data,
            eof: true,
            min_buffer_length: DEFAULT_MIN_BUFFER_LENGTH,
        }
    }

    /// Grow the allocation to hold at least `requested` bytes and return the
    /// whole allocation. Existing bytes are preserved.
    pub fn ensure(&mut self, requested: usize) -> &mut [u8] {
        if requested > self.data.len() {
            let mut size = self.min_buffer_length;
            while size < requested {
                size = size.checked_mul(2).unwrap_or(requested);
            }
            self.data.resize(size, 0);
        }
        &mut self.data
    }

    /// Number of decoded bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether no bytes were decoded yet.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Set the number of decoded bytes after writing through [`Self::ensure`].
    ///
    /// The length is clamped to the allocated capacity.
    pub fn set_len(&mut self, length: usize) {
        debug_assert!(length <= self.data.len());
        self.length = length.min(self.data.len());
    }

    /// Allocated capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The growth quantum this buffer was created with.
    pub fn min_buffer_length(&self) -> usize {
        self.min_buffer_length
    }

    /// Whether the decoder has produced everything it ever will.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Mark the end of decoded data.
    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Append one decoded byte.
    pub fn push(&mut self, byte: u8) {
        let at = self.length;
        self.ensure(at + 1)[at] = byte;
        self.length = at + 1;
    }

    /// Append decoded bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.length;
        let end = start + bytes.len();
        self.ensure(end)[start..end].copy_from_slice(bytes);
        self.length = end;
    }

    /// Append `count` copies of `byte`.
    pub fn fill(&mut self, byte: u8, count: usize) {
        let start = self.length;
        let end = start + count;
        self.ensure(end)[start..end].fill(byte);
        self.length = end;
    }

    /// The decoded bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }
}

/// A filter algorithm driven by [`DecodeStream`].
pub trait StreamDecoder {
    /// Decode roughly one chunk of upstream data into `out`, or call
    /// [`DecodeBuffer::set_eof`] when no more data is available.
    ///
    /// A call that neither appends nor sets eof must still consume upstream
    /// input, so repeated calls always terminate.
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()>;

    /// The stream this decoder pulls from, if it has exactly one.
    fn source(&self) -> Option<&dyn Stream>;

    /// The raw streams at the bottom of the chain.
    fn base_streams(&self) -> Option<Vec<&dyn Stream>> {
        self.source().and_then(|source| source.base_streams())
    }

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Buffered stream over a [`StreamDecoder`].
///
/// Decoded bytes are cached: [`Stream::reset`] re-reads them without decoding
/// again, and a consumer only causes as much decoding as its requests demand.
#[derive(Debug)]
pub struct DecodeStream<D> {
    decoder: D,
    buffer: DecodeBuffer,
    pos: usize,
    raw_min_buffer_length: usize,
}

impl<D: StreamDecoder> DecodeStream<D> {
    /// Wrap `decoder`, pre-sizing the buffer from an optional length hint.
    pub fn with_decoder(decoder: D, maybe_min_buffer_length: Option<usize>) -> Self {
        Self {
            decoder,
            buffer: DecodeBuffer::new(maybe_min_buffer_length),
            pos: 0,
            raw_min_buffer_length: maybe_min_buffer_length.unwrap_or(0),
        }
    }

    /// The filter driving this stream.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// The output buffer.
    pub fn buffer(&self) -> &DecodeBuffer {
        &self.buffer
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut D, &mut DecodeBuffer) {
        (&mut self.decoder, &mut self.buffer)
    }

    pub(crate) fn replace_buffer(&mut self, buffer: DecodeBuffer) {
        self.buffer = buffer;
    }

    /// Whether decoding has finished.
    pub fn is_eof(&self) -> bool {
        self.buffer.is_eof()
    }

    /// Grow the output buffer to at least `requested` bytes.
    pub fn ensure_buffer(&mut self, requested: usize) -> &mut [u8] {
        self.buffer.ensure(requested)
    }

    fn read_block(&mut self) -> Result<()> {
        log::trace!(
            "{}: read_block at {} decoded bytes",
            self.decoder.name(),
            self.buffer.len()
        );
        self.decoder.read_block(&mut self.buffer)
    }

    fn read_to_end(&mut self) -> Result<()> {
        while !self.buffer.is_eof() {
            self.read_block()?;
        }
        Ok(())
    }

    /// Decode until `length` bytes past the read position are buffered (or
    /// the data ends) and return the readable range.
    fn fill(&mut self, length: Option<usize>) -> Result<(usize, usize)> {
        let pos = self.pos;
        let end = match length {
            Some(length) => {
                let end = pos.saturating_add(length);
                // Reserve at most one growth quantum past the decoded bytes.
                let reserve = self
                    .buffer
                    .len()
                    .saturating_add(self.buffer.min_buffer_length());
                self.buffer.ensure(end.min(reserve));
                while !self.buffer.is_eof() && self.buffer.len() < end {
                    self.read_block()?;
                }
                end.min(self.buffer.len())
            },
            None => {
                self.read_to_end()?;
                self.buffer.len()
            },
        };
        Ok((pos.min(end), end))
    }

    fn fill_byte(&mut self) -> Result<Option<u8>> {
        while self.buffer.len() <= self.pos {
            if self.buffer.is_eof() {
                return Ok(None);
            }
            self.read_block()?;
        }
        Ok(Some(self.buffer.as_slice()[self.pos]))
    }
}

impl<D: StreamDecoder> Stream for DecodeStream<D> {
    fn get_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.fill_byte()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn get_bytes(&mut self, length: Option<usize>) -> Result<&[u8]> {
        let (start, end) = self.fill(length)?;
        self.pos = self.pos.max(end);
        Ok(&self.buffer.as_slice()[start..end])
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        self.fill_byte()
    }

    fn peek_bytes(&mut self, length: Option<usize>) -> Result<&[u8]> {
        let (start, end) = self.fill(length)?;
        Ok(&self.buffer.as_slice()[start..end])
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
        None
    }

    fn length_hint(&self) -> usize {
        self.raw_min_buffer_length
    }

    fn is_empty(&mut self) -> Result<bool> {
        while !self.buffer.is_eof() && self.buffer.is_empty() {
            self.read_block()?;
        }
        Ok(self.buffer.is_empty())
    }

    fn make_sub_stream(&mut self, start: usize, length: Option<usize>) -> Result<MemoryStream> {
        match length {
            None => self.read_to_end()?,
            Some(length) => {
                let end = start.saturating_add(length);
                while self.buffer.len() <= end && !self.buffer.is_eof() {
                    self.read_block()?;
                }
            },
        }

        let data = self.buffer.as_slice();
        let start = start.min(data.len());
        let end = match length {
            Some(length) => start.saturating_add(length).min(data.len()),
            None => data.len(),
        };
        Ok(MemoryStream::from_slice(&data[start..end]))
    }

    fn base_streams(&self) -> Option<Vec<&dyn Stream>> {
        self.decoder.base_streams()
    }

    fn buffered_bytes(&self) -> &[u8] {
        let data = self.buffer.as_slice();
        &data[self.pos.min(data.len())..]
    }
}
