//! ASCIIHexDecode implementation.
//!
//! Decodes hexadecimal-encoded data (e.g., "48656C6C6F" -> "Hello").
//! Anything that is not a hex digit is ignored, '>' ends the data, and a
//! trailing odd digit is padded with an implicit '0'.

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::Result;
use crate::stream::Stream;

/// Upstream bytes consumed per block.
const UPSTREAM_BLOCK_SIZE: usize = 8000;

/// ASCIIHexDecode filter state.
///
/// A digit left over at the end of one upstream block is carried into the
/// next, so pairs split across blocks still decode as one byte.
pub struct AsciiHexDecoder {
    source: Box<dyn Stream>,
    first_digit: Option<u8>,
}

/// Stream decoding ASCIIHexDecode data.
pub type AsciiHexStream = DecodeStream<AsciiHexDecoder>;

impl AsciiHexStream {
    /// Decode `source`. Output is about half the encoded length.
    pub fn new(source: Box<dyn Stream>, maybe_length: Option<usize>) -> Self {
        DecodeStream::with_decoder(
            AsciiHexDecoder {
                source,
                first_digit: None,
            },
            maybe_length.map(|length| length / 2),
        )
    }
}

impl StreamDecoder for AsciiHexDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let bytes = self.source.get_bytes(Some(UPSTREAM_BLOCK_SIZE))?;
        if bytes.is_empty() {
            out.set_eof();
        }

        out.ensure(out.len() + (bytes.len() + 1) / 2);
        for &ch in bytes {
            let digit = match hex_digit_to_value(ch) {
                Some(digit) => digit,
                None if ch == b'>' => {
                    out.set_eof();
                    break;
                },
                None => continue,
            };

            match self.first_digit.take() {
                None => self.first_digit = Some(digit),
                Some(high) => out.push((high << 4) | digit),
            }
        }

        if out.is_eof() {
            if let Some(high) = self.first_digit.take() {
                out.push(high << 4);
            }
        }
        Ok(())
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Convert a hexadecimal ASCII character to its numeric value.
fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit & 0x0f),
        b'A'..=b'F' | b'a'..=b'f' => Some((digit & 0x0f) + 9),
        _ => None,
    }
}
