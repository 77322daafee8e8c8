//! FlateDecode (zlib/deflate) implementation.
//!
//! This is the most common PDF compression filter. The inflater is
//! self-contained: it reads the two-byte zlib header up front, then decodes
//! one deflate block (stored, fixed Huffman or dynamic Huffman) per
//! `read_block` call, pulling bits from the source only as they are needed.
//! The Adler-32 trailer is not verified.

use std::borrow::Cow;

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;
use lazy_static::lazy_static;

/// Order in which code length code lengths are stored in a dynamic block.
const CODE_LEN_CODE_MAP: [usize; 19] =
    [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// Length symbols 257..=287: `extra_bits << 16 | base_length`.
const LENGTH_DECODE: [u32; 31] = [
    0x00003, 0x00004, 0x00005, 0x00006, 0x00007, 0x00008, 0x00009, 0x0000a, 0x1000b, 0x1000d,
    0x1000f, 0x10011, 0x20013, 0x20017, 0x2001b, 0x2001f, 0x30023, 0x3002b, 0x30033, 0x3003b,
    0x40043, 0x40053, 0x40063, 0x40073, 0x50083, 0x500a3, 0x500c3, 0x500e3, 0x00102, 0x00102,
    0x00102,
];

/// Distance symbols 0..=29: `extra_bits << 16 | base_distance`.
const DIST_DECODE: [u32; 30] = [
    0x00001, 0x00002, 0x00003, 0x00004, 0x10005, 0x10007, 0x20009, 0x2000d, 0x30011, 0x30019,
    0x40021, 0x40031, 0x50041, 0x50061, 0x60081, 0x600c1, 0x70101, 0x70181, 0x80201, 0x80301,
    0x90401, 0x90601, 0xa0801, 0xa0c01, 0xb1001, 0xb1801, 0xc2001, 0xc3001, 0xd4001, 0xd6001,
];

lazy_static! {
    /// Literal/length table of fixed Huffman blocks.
    static ref FIXED_LIT_CODE_TABLE: HuffmanTable = {
        let mut lengths = [0u8; 288];
        lengths[..144].fill(8);
        lengths[144..256].fill(9);
        lengths[256..280].fill(7);
        lengths[280..].fill(8);
        HuffmanTable::from_lengths(&lengths)
    };

    /// Distance table of fixed Huffman blocks.
    static ref FIXED_DIST_CODE_TABLE: HuffmanTable = HuffmanTable::from_lengths(&[5u8; 30]);
}

/// Lookup table indexed by the next `max_len` input bits, LSB first.
///
/// Each entry is `code_length << 16 | symbol`. A zero length marks bit
/// patterns no code maps to.
#[derive(Debug, Clone)]
struct HuffmanTable {
    codes: Vec<u32>,
    max_len: u32,
}

impl HuffmanTable {
    /// Build the canonical code for the given per-symbol code lengths.
    fn from_lengths(lengths: &[u8]) -> Self {
        let max_len = lengths.iter().copied().max().map_or(0, u32::from);
        let size = 1usize << max_len;
        let mut codes = vec![0u32; size];

        let mut code: u32 = 0;
        let mut skip: usize = 2;
        for len in 1..=max_len {
            for (symbol, _) in lengths
                .iter()
                .enumerate()
                .filter(|&(_, &length)| u32::from(length) == len)
            {
                // Codes are packed MSB first but read LSB first.
                let reversed = (code.reverse_bits() >> (32 - len)) as usize;
                let entry = (len << 16) | symbol as u32;
                for slot in codes[reversed..].iter_mut().step_by(skip) {
                    *slot = entry;
                }
                code += 1;
            }
            code <<= 1;
            skip <<= 1;
        }

        Self { codes, max_len }
    }
}

fn bad_encoding() -> Error {
    Error::Format("Bad encoding in flate stream".to_string())
}

/// FlateDecode filter state: the bit accumulator of the inflater.
pub struct FlateDecoder {
    source: Box<dyn Stream>,
    code_buf: u32,
    code_size: u32,
}

/// Stream decoding FlateDecode data.
pub type FlateStream = DecodeStream<FlateDecoder>;

impl FlateStream {
    /// Decode `source`, validating the zlib header immediately.
    ///
    /// Fails with a format error when the header is missing, names a method
    /// other than deflate, has a bad check value, or requests a preset
    /// dictionary.
    pub fn new(mut source: Box<dyn Stream>, maybe_length: Option<usize>) -> Result<Self> {
        let cmf = source.get_byte()?;
        let flg = source.get_byte()?;
        let (cmf, flg) = match (cmf, flg) {
            (Some(cmf), Some(flg)) => (cmf, flg),
            _ => {
                return Err(Error::Format(format!(
                    "Invalid header in flate stream: {:?}, {:?}",
                    cmf, flg
                )))
            },
        };
        if cmf & 0x0f != 0x08 {
            return Err(Error::Format(format!(
                "Unknown compression method in flate stream: {}, {}",
                cmf, flg
            )));
        }
        if ((u16::from(cmf) << 8) + u16::from(flg)) % 31 != 0 {
            return Err(Error::Format(format!("Bad FCHECK in flate stream: {}, {}", cmf, flg)));
        }
        if flg & 0x20 != 0 {
            return Err(Error::Format(format!("FDICT bit set in flate stream: {}, {}", cmf, flg)));
        }

        Ok(DecodeStream::with_decoder(
            FlateDecoder {
                source,
                code_buf: 0,
                code_size: 0,
            },
            maybe_length,
        ))
    }
}

impl FlateDecoder {
    /// Read `bits` bits, LSB first. Running out of input is an error.
    fn get_bits(&mut self, bits: u32) -> Result<u32> {
        while self.code_size < bits {
            let byte = self.source.get_byte()?.ok_or_else(bad_encoding)?;
            self.code_buf |= u32::from(byte) << self.code_size;
            self.code_size += 8;
        }
        let value = self.code_buf & ((1 << bits) - 1);
        self.code_buf >>= bits;
        self.code_size -= bits;
        Ok(value)
    }

    /// Decode one symbol.
    ///
    /// Near the end of data fewer than `max_len` bits may be available; that
    /// is fine as long as the matched code fits in what was read.
    fn get_code(&mut self, table: &HuffmanTable) -> Result<u32> {
        while self.code_size < table.max_len {
            match self.source.get_byte()? {
                Some(byte) => {
                    self.code_buf |= u32::from(byte) << self.code_size;
                    self.code_size += 8;
                },
                None => break,
            }
        }
        let code = table.codes[(self.code_buf & ((1 << table.max_len) - 1)) as usize];
        let len = code >> 16;
        if len < 1 || self.code_size < len {
            return Err(bad_encoding());
        }
        self.code_buf >>= len;
        self.code_size -= len;
        Ok(code & 0xffff)
    }

    fn read_stored_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        // Stored data starts at the next byte boundary.
        let partial = self.code_size % 8;
        self.code_buf >>= partial;
        self.code_size -= partial;

        let block_len = self.get_bits(16)?;
        let check = self.get_bits(16)?;
        if check != (!block_len & 0xffff) && (block_len != 0 || check != 0) {
            return Err(Error::Format(
                "Bad uncompressed block length in flate stream".to_string(),
            ));
        }

        let mut remaining = block_len as usize;
        out.ensure(out.len() + remaining);
        while remaining > 0 && self.code_size >= 8 {
            out.push(self.code_buf as u8);
            self.code_buf >>= 8;
            self.code_size -= 8;
            remaining -= 1;
        }
        if remaining > 0 {
            let bytes = self.source.get_bytes(Some(remaining))?;
            out.extend_from_slice(bytes);
            if bytes.len() < remaining {
                log::debug!(
                    "FlateDecode: stored block truncated ({} of {} bytes)",
                    bytes.len(),
                    remaining
                );
                out.set_eof();
            }
        } else if block_len == 0 && self.code_size == 0 && self.source.peek_byte()?.is_none() {
            out.set_eof();
        }
        Ok(())
    }

    fn read_dynamic_tables(&mut self) -> Result<(HuffmanTable, HuffmanTable)> {
        let num_lit_codes = self.get_bits(5)? as usize + 257;
        let num_dist_codes = self.get_bits(5)? as usize + 1;
        let num_code_len_codes = self.get_bits(4)? as usize + 4;

        let mut code_len_code_lengths = [0u8; 19];
        for &index in &CODE_LEN_CODE_MAP[..num_code_len_codes] {
            code_len_code_lengths[index] = self.get_bits(3)? as u8;
        }
        let code_len_code_table = HuffmanTable::from_lengths(&code_len_code_lengths);

        let codes = num_lit_codes + num_dist_codes;
        let mut code_lengths = vec![0u8; codes];
        let mut len = 0u8;
        let mut i = 0;
        while i < codes {
            let code = self.get_code(&code_len_code_table)?;
            let (bits_length, bits_offset, what) = match code {
                16 => (2, 3, len),
                17 => {
                    len = 0;
                    (3, 3, 0)
                },
                18 => {
                    len = 0;
                    (7, 11, 0)
                },
                _ => {
                    len = code as u8;
                    code_lengths[i] = len;
                    i += 1;
                    continue;
                },
            };
            let repeat = (self.get_bits(bits_length)? + bits_offset) as usize;
            // Repeats running past the last code are clipped.
            let end = (i + repeat).min(codes);
            code_lengths[i..end].fill(what);
            i += repeat;
        }

        Ok((
            HuffmanTable::from_lengths(&code_lengths[..num_lit_codes]),
            HuffmanTable::from_lengths(&code_lengths[num_lit_codes..]),
        ))
    }
}

impl StreamDecoder for FlateDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let header = self.get_bits(3)?;
        if header & 1 != 0 {
            out.set_eof();
        }

        let (lit_table, dist_table): (Cow<'static, HuffmanTable>, Cow<'static, HuffmanTable>) =
            match header >> 1 {
                0 => return self.read_stored_block(out),
                1 => (
                    Cow::Borrowed(&*FIXED_LIT_CODE_TABLE),
                    Cow::Borrowed(&*FIXED_DIST_CODE_TABLE),
                ),
                2 => {
                    let (lit, dist) = self.read_dynamic_tables()?;
                    (Cow::Owned(lit), Cow::Owned(dist))
                },
                _ => {
                    return Err(Error::Format("Unknown block type in flate stream".to_string()))
                },
            };

        loop {
            let symbol = self.get_code(&lit_table)?;
            if symbol < 256 {
                out.push(symbol as u8);
                continue;
            }
            if symbol == 256 {
                return Ok(());
            }

            let length_code = *LENGTH_DECODE
                .get(symbol as usize - 257)
                .ok_or_else(bad_encoding)?;
            let length = (length_code & 0xffff) + self.get_bits(length_code >> 16)?;

            let dist_symbol = self.get_code(&dist_table)?;
            let dist_code = *DIST_DECODE.get(dist_symbol as usize).ok_or_else(bad_encoding)?;
            let dist = ((dist_code & 0xffff) + self.get_bits(dist_code >> 16)?) as usize;

            let pos = out.len();
            if dist > pos {
                return Err(Error::Format(format!(
                    "Bad distance in flate stream: {} at {}",
                    dist, pos
                )));
            }
            let length = length as usize;
            // Overlapping copies repeat the bytes just written.
            let buffer = out.ensure(pos + length);
            for k in pos..pos + length {
                buffer[k] = buffer[k - dist];
            }
            out.set_len(pos + length);
        }
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8], level: Compression) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), level);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn open(input: &[u8]) -> Result<FlateStream> {
        FlateStream::new(Box::new(MemoryStream::from_slice(input)), None)
    }

    fn decode(input: &[u8]) -> Vec<u8> {
        open(input).unwrap().get_bytes(None).unwrap().to_vec()
    }

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        assert_eq!(decode(&compress(original, Compression::default())), original);
    }

    #[test]
    fn test_flate_decode_stored_blocks() {
        let original: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(decode(&compress(&original, Compression::none())), original);
    }

    #[test]
    fn test_flate_decode_dynamic_blocks() {
        let original = b"The quick brown fox jumps over the lazy dog. ".repeat(500);
        assert_eq!(decode(&compress(&original, Compression::best())), original);
    }

    #[test]
    fn test_flate_decode_hand_built_stored_block() {
        let input = [
            0x78, 0x01, 0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o',
        ];
        assert_eq!(decode(&input), b"Hello");
    }

    #[test]
    fn test_flate_decode_empty() {
        assert_eq!(decode(&compress(b"", Compression::default())), b"");
    }

    #[test]
    fn test_flate_chunked_reads() {
        let original = b"abcdefghij".repeat(2000);
        let compressed = compress(&original, Compression::fast());
        let mut stream = open(&compressed).unwrap();

        let mut collected = Vec::new();
        loop {
            let chunk = stream.get_bytes(Some(333)).unwrap();
            if chunk.is_empty() {
                break;
            }
            collected.extend_from_slice(chunk);
        }
        assert_eq!(collected, original);
    }

    #[test]
    fn test_flate_header_errors() {
        for header in [&[][..], &[0x78], &[0x79, 0x9C], &[0x78, 0x9D], &[0x78, 0xBB]] {
            let err = open(header).err().expect("header must be rejected");
            assert!(err.is_format_error(), "{:?} -> {}", header, err);
        }
    }

    #[test]
    fn test_flate_unknown_block_type() {
        let mut stream = open(&[0x78, 0x9C, 0x07]).unwrap();
        assert!(stream.get_bytes(None).unwrap_err().is_format_error());
    }

    #[test]
    fn test_flate_distance_before_start() {
        // Fixed block whose first symbol is a length/distance pair.
        let mut stream = open(&[0x78, 0x9C, 0x03, 0x02, 0x00]).unwrap();
        assert!(stream.get_bytes(None).unwrap_err().is_format_error());
    }

    #[test]
    fn test_flate_truncated_data() {
        let compressed = compress(&b"truncate me please ".repeat(100), Compression::best());
        let mut stream = open(&compressed[..compressed.len() / 2]).unwrap();
        assert!(stream.get_bytes(None).unwrap_err().is_format_error());
    }

    #[test]
    fn test_fixed_tables() {
        assert_eq!(FIXED_LIT_CODE_TABLE.max_len, 9);
        assert_eq!(FIXED_DIST_CODE_TABLE.max_len, 5);
        // End of block is the all-zero 7 bit code.
        assert_eq!(FIXED_LIT_CODE_TABLE.codes[0], (7 << 16) | 256);
    }

    #[test]
    fn test_flate_decoder_name() {
        let stream = open(&[0x78, 0x9C]).unwrap();
        assert_eq!(stream.decoder().name(), "FlateDecode");
    }
}
