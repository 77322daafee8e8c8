//! RunLengthDecode implementation.
//!
//! Decodes run-length encoded data as described in ISO 32000-1, section 7.4.5:
//! - Length byte 0-127: Copy next N+1 bytes literally
//! - Length byte 128: EOD marker
//! - Length byte 129-255: Repeat next byte 257-N times

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::Result;
use crate::stream::Stream;

/// RunLengthDecode filter state. Each block decodes one run.
pub struct RunLengthDecoder {
    source: Box<dyn Stream>,
}

/// Stream decoding RunLengthDecode data.
pub type RunLengthStream = DecodeStream<RunLengthDecoder>;

impl RunLengthStream {
    /// Decode `source`.
    pub fn new(source: Box<dyn Stream>, maybe_length: Option<usize>) -> Self {
        DecodeStream::with_decoder(RunLengthDecoder { source }, maybe_length)
    }
}

impl StreamDecoder for RunLengthDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        // The length byte and the first data byte of the run. A header cut
        // short by the end of data ends decoding like an explicit EOD.
        let (length, first) = match *self.source.get_bytes(Some(2))? {
            [length, first] if length != 128 => (length, first),
            _ => {
                out.set_eof();
                return Ok(());
            },
        };

        if length < 128 {
            out.push(first);
            if length > 0 {
                // A truncated literal keeps the bytes that are present.
                let literal = self.source.get_bytes(Some(length as usize))?;
                out.extend_from_slice(literal);
            }
        } else {
            out.fill(first, 257 - length as usize);
        }
        Ok(())
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
