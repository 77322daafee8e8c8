//! Concatenation of several streams into one.
//!
//! Used for page content split over an array of content streams. Each part is
//! decoded in full, in order, when the reader reaches it.

use std::collections::VecDeque;

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;

/// Callback for parts that fail to decode: the error and the part's index.
pub type PartErrorHandler = Box<dyn FnMut(&Error, usize)>;

/// Queue of parts not read yet.
pub struct SequenceDecoder {
    parts: VecDeque<Box<dyn Stream>>,
    next_index: usize,
    on_error: Option<PartErrorHandler>,
}

/// Stream yielding its parts back to back.
pub type StreamSequence = DecodeStream<SequenceDecoder>;

impl StreamSequence {
    /// Concatenate `parts`. A failing part aborts the read with its error.
    pub fn new(parts: Vec<Box<dyn Stream>>) -> Self {
        Self::build(parts, None)
    }

    /// Concatenate `parts`, skipping any part that fails to decode after
    /// reporting it to `on_error`.
    ///
    /// The bytes a failing part decoded before its error are kept; the rest
    /// of that part is dropped.
    pub fn with_error_handler(parts: Vec<Box<dyn Stream>>, on_error: PartErrorHandler) -> Self {
        Self::build(parts, Some(on_error))
    }

    fn build(parts: Vec<Box<dyn Stream>>, on_error: Option<PartErrorHandler>) -> Self {
        let hint: usize = parts.iter().map(|part| part.length_hint()).sum();
        DecodeStream::with_decoder(
            SequenceDecoder {
                parts: parts.into(),
                next_index: 0,
                on_error,
            },
            Some(hint),
        )
    }
}

impl StreamDecoder for SequenceDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let mut part = match self.parts.pop_front() {
            Some(part) => part,
            None => {
                out.set_eof();
                return Ok(());
            },
        };
        let index = self.next_index;
        self.next_index += 1;

        let error = match part.get_bytes(None) {
            Ok(chunk) => {
                out.extend_from_slice(chunk);
                return Ok(());
            },
            Err(e) => e,
        };
        match self.on_error.as_mut() {
            Some(on_error) => {
                let salvaged = part.buffered_bytes();
                log::warn!(
                    "Skipping rest of part {} of stream sequence after {} bytes: {}",
                    index,
                    salvaged.len(),
                    error
                );
                out.extend_from_slice(salvaged);
                on_error(&error, index);
                Ok(())
            },
            None => Err(error),
        }
    }

    fn source(&self) -> Option<&dyn Stream> {
        None
    }

    fn base_streams(&self) -> Option<Vec<&dyn Stream>> {
        let bases: Vec<&dyn Stream> = self
            .parts
            .iter()
            .filter_map(|part| part.base_streams())
            .flatten()
            .collect();
        if bases.is_empty() {
            None
        } else {
            Some(bases)
        }
    }

    fn name(&self) -> &str {
        "StreamSequence"
    }
}
