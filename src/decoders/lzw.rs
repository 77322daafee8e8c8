//! LZWDecode implementation for PDF.
//!
//! Decompresses data using the Lempel-Ziv-Welch (LZW) algorithm as specified
//! in the PDF Reference (Section 7.4.4).
//!
//! PDF's LZW implementation:
//! - Uses MSB-first bit ordering
//! - Starts with 9-bit codes, growing to at most 12 bits
//! - With EarlyChange=1 (the default) the code width grows one code early
//! - Clear code is 256, EOD code is 257
//! - First available code is 258

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;

const CLEAR_CODE: u32 = 256;
const EOD_CODE: u32 = 257;
const FIRST_CODE: u32 = 258;
const MAX_CODE_BITS: u32 = 12;
const TABLE_SIZE: usize = 1 << MAX_CODE_BITS;

/// Codes decoded per block.
const CODES_PER_BLOCK: usize = 512;

/// MSB-first bit reader pulling whole bytes from the source on demand.
#[derive(Debug, Default)]
struct BitReader {
    cached_data: u32,
    bits_cached: u32,
}

impl BitReader {
    /// Read an `n`-bit code, or `None` once the source runs dry.
    fn read_bits(&mut self, source: &mut dyn Stream, n: u32) -> Result<Option<u32>> {
        while self.bits_cached < n {
            match source.get_byte()? {
                Some(byte) => {
                    self.cached_data = (self.cached_data << 8) | u32::from(byte);
                    self.bits_cached += 8;
                },
                None => return Ok(None),
            }
        }
        self.bits_cached -= n;
        Ok(Some((self.cached_data >> self.bits_cached) & ((1 << n) - 1)))
    }
}

/// The string table, stored as (last byte, prefix code, length) triples so
/// adding an entry never copies a string.
struct LzwState {
    early_change: u32,
    code_length: u32,
    next_code: u32,
    prev_code: u32,
    values: Vec<u8>,
    prev_codes: Vec<u16>,
    lengths: Vec<u16>,
    current_sequence: Vec<u8>,
    current_length: usize,
}

impl LzwState {
    fn new(early_change: u8) -> Self {
        let mut values = vec![0u8; TABLE_SIZE];
        let mut lengths = vec![0u16; TABLE_SIZE];
        for code in 0..256 {
            values[code] = code as u8;
            lengths[code] = 1;
        }

        Self {
            early_change: u32::from(early_change),
            code_length: 9,
            next_code: FIRST_CODE,
            prev_code: 0,
            values,
            prev_codes: vec![0u16; TABLE_SIZE],
            lengths,
            current_sequence: vec![0u8; TABLE_SIZE],
            current_length: 0,
        }
    }

    fn reset(&mut self) {
        self.code_length = 9;
        self.next_code = FIRST_CODE;
        self.current_length = 0;
    }

    /// Replace the current sequence with the string for `code`.
    fn load_sequence(&mut self, code: u32) -> Result<()> {
        let has_prev = self.current_length > 0;
        if code < 256 {
            self.current_sequence[0] = code as u8;
            self.current_length = 1;
        } else if code < self.next_code {
            let length = usize::from(self.lengths[code as usize]);
            let mut q = code as usize;
            for slot in self.current_sequence[..length].iter_mut().rev() {
                *slot = self.values[q];
                q = usize::from(self.prev_codes[q]);
            }
            self.current_length = length;
        } else if code == self.next_code && has_prev && self.current_length < TABLE_SIZE {
            // KwKwK: the previous string followed by its own first byte.
            self.current_sequence[self.current_length] = self.current_sequence[0];
            self.current_length += 1;
        } else {
            return Err(Error::Format(format!(
                "LZWDecode: invalid code {} (next code {})",
                code, self.next_code
            )));
        }
        Ok(())
    }

    fn add_entry(&mut self) {
        if (self.next_code as usize) < TABLE_SIZE {
            let next = self.next_code as usize;
            self.prev_codes[next] = self.prev_code as u16;
            self.lengths[next] = self.lengths[self.prev_code as usize] + 1;
            self.values[next] = self.current_sequence[0];
            self.next_code += 1;
        }

        let threshold = self.next_code + self.early_change;
        if threshold.is_power_of_two() {
            self.code_length = (threshold.trailing_zeros() + 1).min(MAX_CODE_BITS);
        }
    }
}

/// LZWDecode filter state.
///
/// `state` is dropped when the EOD code is seen.
pub struct LzwDecoder {
    source: Box<dyn Stream>,
    bits: BitReader,
    state: Option<LzwState>,
}

/// Stream decoding LZWDecode data.
pub type LzwStream = DecodeStream<LzwDecoder>;

impl LzwStream {
    /// Decode `source`. `early_change` is the EarlyChange parameter (0 or 1).
    pub fn new(source: Box<dyn Stream>, maybe_length: Option<usize>, early_change: u8) -> Self {
        DecodeStream::with_decoder(
            LzwDecoder {
                source,
                bits: BitReader::default(),
                state: Some(LzwState::new(early_change.min(1))),
            },
            maybe_length,
        )
    }
}

impl StreamDecoder for LzwDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => {
                out.set_eof();
                return Ok(());
            },
        };

        out.ensure(out.len() + CODES_PER_BLOCK * 2);
        for _ in 0..CODES_PER_BLOCK {
            let code = match self.bits.read_bits(self.source.as_mut(), state.code_length)? {
                Some(code) => code,
                None => {
                    log::trace!("LZWDecode: data ended without an EOD code");
                    out.set_eof();
                    return Ok(());
                },
            };

            match code {
                CLEAR_CODE => {
                    state.reset();
                    continue;
                },
                EOD_CODE => {
                    self.state = None;
                    out.set_eof();
                    return Ok(());
                },
                _ => {},
            }

            let has_prev = state.current_length > 0;
            state.load_sequence(code)?;
            if has_prev {
                state.add_entry();
            }
            state.prev_code = code;
            out.extend_from_slice(&state.current_sequence[..state.current_length]);
        }
        Ok(())
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}
