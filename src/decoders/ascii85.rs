//! ASCII85Decode (Base85) implementation.
//!
//! Decodes ASCII85/Base85 encoded data. This encoding represents 4 bytes
//! as 5 ASCII characters in the range '!' to 'u'.
//! Special case: 'z' represents 4 zero bytes (00000000).

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::Result;
use crate::stream::Stream;

const Z_LOWER_CHAR: u8 = b'z';
const TILDE_CHAR: u8 = b'~';
/// Value of 'u', used to pad a trailing partial group.
const PAD_CHAR: u8 = 0x21 + 84;

/// ASCII85Decode filter state. Each block decodes one group.
pub struct Ascii85Decoder {
    source: Box<dyn Stream>,
}

/// Stream decoding ASCII85Decode data.
pub type Ascii85Stream = DecodeStream<Ascii85Decoder>;

impl Ascii85Stream {
    /// Decode `source`. Output is about four fifths of the encoded length.
    pub fn new(source: Box<dyn Stream>, maybe_length: Option<usize>) -> Self {
        DecodeStream::with_decoder(
            Ascii85Decoder { source },
            maybe_length.map(|length| length * 4 / 5),
        )
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

impl Ascii85Decoder {
    fn next_significant_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.source.get_byte()? {
                Some(byte) if is_whitespace(byte) => continue,
                other => return Ok(other),
            }
        }
    }
}

impl StreamDecoder for Ascii85Decoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let first = match self.next_significant_byte()? {
            None | Some(TILDE_CHAR) => {
                out.set_eof();
                return Ok(());
            },
            Some(byte) => byte,
        };

        if first == Z_LOWER_CHAR {
            out.fill(0, 4);
            return Ok(());
        }

        let mut group = [PAD_CHAR; 5];
        group[0] = first;
        let mut count = 1;
        while count < 5 {
            match self.next_significant_byte()? {
                None | Some(TILDE_CHAR) => break,
                Some(byte) => {
                    group[count] = byte;
                    count += 1;
                },
            }
        }
        if count < 5 {
            out.set_eof();
        }

        // Characters outside '!'..='u' are not rejected; the group value is
        // simply taken modulo 2^32.
        let value = group
            .iter()
            .fold(0i64, |acc, &c| acc * 85 + (i64::from(c) - 0x21));
        let bytes = (value as u32).to_be_bytes();
        out.extend_from_slice(&bytes[..count - 1]);
        Ok(())
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}
