//! TIFF and PNG predictors for PDF stream decoding.
//!
//! Flate and LZW streams can use a predictor (2 = TIFF, 10-15 = PNG) to
//! improve compression. Predictors encode differences between adjacent
//! samples, which are reversed here one row at a time.

use serde::{Deserialize, Serialize};

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;

/// Per-row filter types of PNG prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngFilterType {
    /// No prediction
    None = 0,
    /// Sub: each byte is the difference from the byte to its left
    Sub = 1,
    /// Up: each byte is the difference from the byte above
    Up = 2,
    /// Average: each byte is the difference from the average of left and above
    Average = 3,
    /// Paeth: uses a complex predictor function
    Paeth = 4,
}

impl PngFilterType {
    /// Map a row tag byte to its filter type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Average),
            4 => Some(Self::Paeth),
            _ => None,
        }
    }
}

/// Decode parameters for stream decoders.
///
/// Field names serialize as the PDF dictionary keys (`Predictor`, `Columns`,
/// `Colors`, `BitsPerComponent`, `EarlyChange`); missing keys take the PDF
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample (default 1)
    pub colors: usize,
    /// Bits per component (default 8)
    pub bits_per_component: usize,
    /// LZW code width switch: 1 = one code early (default), 0 = on time
    pub early_change: u8,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1, // No prediction
            columns: 1,
            colors: 1,
            bits_per_component: 8,
            early_change: 1,
        }
    }
}

impl DecodeParams {
    /// Calculate the number of bytes per pixel, at least one.
    pub fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Calculate the number of bytes per row.
    pub fn bytes_per_row(&self) -> usize {
        // For PNG predictors (10-15), each row carries a predictor tag byte
        let pixel_bytes = self.pixel_bytes_per_row();

        if self.predictor >= 10 {
            pixel_bytes + 1
        } else {
            pixel_bytes
        }
    }

    /// Calculate the number of bytes of actual pixel data per row (without predictor tag).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredictorKind {
    Tiff,
    Png,
}

/// Predictor filter state.
pub struct PredictorDecoder {
    source: Box<dyn Stream>,
    kind: PredictorKind,
    colors: usize,
    bits: usize,
    columns: usize,
    pix_bytes: usize,
    row_bytes: usize,
    raw_row: Vec<u8>,
    zero_row: Vec<u8>,
}

/// Stream undoing a predictor applied on top of another filter.
pub type PredictorStream = DecodeStream<PredictorDecoder>;

impl PredictorStream {
    /// Undo the predictor described by `params` on `source`.
    ///
    /// Zero `columns`, `colors` or `bits_per_component` fall back to their
    /// defaults. Fails with a format error for unknown predictors and sample
    /// sizes or when the row size overflows. Predictor 1 (none) is refused;
    /// [`PredictorStream::wrap`] handles it.
    pub fn new(
        source: Box<dyn Stream>,
        maybe_length: Option<usize>,
        params: &DecodeParams,
    ) -> Result<Self> {
        let kind = match params.predictor {
            2 => PredictorKind::Tiff,
            10..=15 => PredictorKind::Png,
            other if other <= 1 => {
                return Err(Error::Unsupported(format!(
                    "Predictor {} needs no predictor stream, use PredictorStream::wrap",
                    other
                )))
            },
            other => return Err(Error::Format(format!("Unsupported predictor: {}", other))),
        };

        let colors = if params.colors == 0 { 1 } else { params.colors };
        let columns = if params.columns == 0 { 1 } else { params.columns };
        let bits = if params.bits_per_component == 0 {
            8
        } else {
            params.bits_per_component
        };
        if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(Error::Format(format!("Unsupported bits per component: {}", bits)));
        }

        let overflow = || {
            Error::Format(format!(
                "Predictor row size overflows: {} columns x {} colors x {} bits",
                columns, colors, bits
            ))
        };
        let pix_bits = colors.checked_mul(bits).ok_or_else(overflow)?;
        let row_bits = columns.checked_mul(pix_bits).ok_or_else(overflow)?;
        let pix_bytes = pix_bits.div_ceil(8);
        let row_bytes = row_bits.div_ceil(8);

        log::trace!(
            "Predictor {}: {} bytes per row, {} bytes per pixel",
            params.predictor,
            row_bytes,
            pix_bytes
        );

        Ok(DecodeStream::with_decoder(
            PredictorDecoder {
                source,
                kind,
                colors,
                bits,
                columns,
                pix_bytes,
                row_bytes,
                raw_row: Vec::new(),
                zero_row: Vec::new(),
            },
            maybe_length,
        ))
    }

    /// Wrap `source` in a predictor stream, or return it unchanged when
    /// `params` requests no prediction (predictor 1 or less).
    pub fn wrap(
        source: Box<dyn Stream>,
        maybe_length: Option<usize>,
        params: &DecodeParams,
    ) -> Result<Box<dyn Stream>> {
        if params.predictor <= 1 {
            return Ok(source);
        }
        Ok(Box::new(Self::new(source, maybe_length, params)?))
    }
}

impl PredictorDecoder {
    /// Read the next raw row into `raw_row`, zero padding a short final row.
    /// Returns false once the source is exhausted.
    fn read_raw_row(&mut self) -> Result<bool> {
        self.raw_row.resize(self.row_bytes, 0);
        let bytes = self.source.get_bytes(Some(self.row_bytes))?;
        if bytes.is_empty() {
            return Ok(false);
        }
        self.raw_row[..bytes.len()].copy_from_slice(bytes);
        self.raw_row[bytes.len()..].fill(0);
        Ok(true)
    }

    fn read_block_tiff(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        if !self.read_raw_row()? {
            out.set_eof();
            return Ok(());
        }

        let start = out.len();
        let row_bytes = self.row_bytes;
        let row = &mut out.ensure(start + row_bytes)[start..start + row_bytes];
        let raw = &self.raw_row;
        let colors = self.colors;

        match self.bits {
            1 if colors == 1 => {
                // Running XOR of all bits so far.
                let mut carry = 0u8;
                for (dst, &src) in row.iter_mut().zip(raw) {
                    let mut c = src ^ carry;
                    c ^= c >> 1;
                    c ^= c >> 2;
                    c ^= c >> 4;
                    carry = (c & 1) << 7;
                    *dst = c;
                }
            },
            8 => {
                row[..colors].copy_from_slice(&raw[..colors]);
                for i in colors..row_bytes {
                    row[i] = row[i - colors].wrapping_add(raw[i]);
                }
            },
            16 => {
                let bytes_per_pixel = colors * 2;
                row[..bytes_per_pixel].copy_from_slice(&raw[..bytes_per_pixel]);
                for i in (bytes_per_pixel..row_bytes).step_by(2) {
                    let left = u16::from_be_bytes([row[i - bytes_per_pixel], row[i - bytes_per_pixel + 1]]);
                    let delta = u16::from_be_bytes([raw[i], raw[i + 1]]);
                    row[i..i + 2].copy_from_slice(&left.wrapping_add(delta).to_be_bytes());
                }
            },
            bits => {
                let bits = bits as u32;
                let bit_mask = (1u32 << bits) - 1;
                let mut components = vec![0u32; colors];
                let (mut inbuf, mut inbits) = (0u32, 0u32);
                let (mut outbuf, mut outbits) = (0u32, 0u32);
                let (mut j, mut k) = (0, 0);

                for _ in 0..self.columns {
                    for component in components.iter_mut() {
                        if inbits < bits {
                            // Only the low `inbits` bits are ever consumed.
                            inbuf = ((inbuf << 8) | u32::from(raw[j])) & 0xFFFF;
                            j += 1;
                            inbits += 8;
                        }
                        let delta = (inbuf >> (inbits - bits)) & bit_mask;
                        *component = (*component + delta) & bit_mask;
                        inbits -= bits;
                        outbuf = ((outbuf << bits) | *component) & 0xFFFF;
                        outbits += bits;
                        if outbits >= 8 {
                            row[k] = (outbuf >> (outbits - 8)) as u8;
                            k += 1;
                            outbits -= 8;
                        }
                    }
                }
                if outbits > 0 {
                    let tail_mask = (1u32 << (8 - outbits)) - 1;
                    row[k] = (outbuf << (8 - outbits)).wrapping_add(inbuf & tail_mask) as u8;
                }
            },
        }

        out.set_len(start + row_bytes);
        Ok(())
    }

    fn read_block_png(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        let tag = self.source.get_byte()?;
        let tag = match tag {
            Some(tag) if self.read_raw_row()? => tag,
            _ => {
                out.set_eof();
                return Ok(());
            },
        };
        let filter = PngFilterType::from_tag(tag)
            .ok_or_else(|| Error::Format(format!("Unsupported predictor: {}", tag)))?;

        let start = out.len();
        let row_bytes = self.row_bytes;
        let buffer = out.ensure(start + row_bytes);
        let (before, rest) = buffer.split_at_mut(start);
        let row = &mut rest[..row_bytes];
        let prev: &[u8] = if start >= row_bytes {
            &before[start - row_bytes..]
        } else {
            self.zero_row.resize(row_bytes, 0);
            &self.zero_row
        };

        unfilter_png_row(filter, &self.raw_row, prev, row, self.pix_bytes);
        out.set_len(start + row_bytes);
        Ok(())
    }
}

/// Reverse one PNG-filtered row into `row`, given the previous decoded row.
fn unfilter_png_row(filter: PngFilterType, raw: &[u8], prev: &[u8], row: &mut [u8], bpp: usize) {
    let bpp = bpp.min(row.len());
    match filter {
        PngFilterType::None => row.copy_from_slice(raw),
        PngFilterType::Sub => {
            row[..bpp].copy_from_slice(&raw[..bpp]);
            for i in bpp..row.len() {
                row[i] = row[i - bpp].wrapping_add(raw[i]);
            }
        },
        PngFilterType::Up => {
            for i in 0..row.len() {
                row[i] = prev[i].wrapping_add(raw[i]);
            }
        },
        PngFilterType::Average => {
            for i in 0..bpp {
                row[i] = (prev[i] >> 1).wrapping_add(raw[i]);
            }
            for i in bpp..row.len() {
                let avg = ((u16::from(prev[i]) + u16::from(row[i - bpp])) >> 1) as u8;
                row[i] = avg.wrapping_add(raw[i]);
            }
        },
        PngFilterType::Paeth => {
            for i in 0..bpp {
                row[i] = prev[i].wrapping_add(raw[i]);
            }
            for i in bpp..row.len() {
                let left = row[i - bpp];
                let paeth = paeth_predictor(
                    i16::from(left),
                    i16::from(prev[i]),
                    i16::from(prev[i - bpp]),
                ) as u8;
                row[i] = paeth.wrapping_add(raw[i]);
            }
        },
    }
}

/// Paeth predictor function from PNG specification.
fn paeth_predictor(a: i16, b: i16, c: i16) -> i16 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

impl StreamDecoder for PredictorDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        match self.kind {
            PredictorKind::Tiff => self.read_block_tiff(out),
            PredictorKind::Png => self.read_block_png(out),
        }
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        match self.kind {
            PredictorKind::Tiff => "TIFFPredictor",
            PredictorKind::Png => "PNGPredictor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn params(predictor: i64, columns: usize, colors: usize, bits: usize) -> DecodeParams {
        DecodeParams {
            predictor,
            columns,
            colors,
            bits_per_component: bits,
            ..DecodeParams::default()
        }
    }

    fn decode(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
        let source = Box::new(MemoryStream::from_slice(data));
        let mut stream = PredictorStream::wrap(source, None, params)?;
        Ok(stream.get_bytes(None)?.to_vec())
    }

    #[test]
    fn test_no_predictor() {
        let data = b"Hello, World!";
        assert_eq!(decode(data, &DecodeParams::default()).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor() {
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        let output = decode(&data, &params(12, 3, 1, 8)).unwrap();
        assert_eq!(output, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let data = [1, 10, 5, 5, 5];
        assert_eq!(decode(&data, &params(11, 4, 1, 8)).unwrap(), vec![10, 15, 20, 25]);
    }

    #[test]
    fn test_png_average_predictor() {
        let data = [3, 10, 20, 3, 1, 1];
        assert_eq!(decode(&data, &params(13, 2, 1, 8)).unwrap(), vec![10, 25, 6, 16]);
    }

    #[test]
    fn test_png_paeth_predictor() {
        let data = [0, 10, 20, 4, 5, 3];
        assert_eq!(decode(&data, &params(14, 2, 1, 8)).unwrap(), vec![10, 20, 15, 23]);
    }

    #[test]
    fn test_png_rows_may_mix_filters() {
        // Predictor 15 only announces PNG; each row names its own filter.
        let data = [0, 7, 7, 1, 1, 1, 2, 1, 1];
        assert_eq!(decode(&data, &params(15, 2, 1, 8)).unwrap(), vec![7, 7, 1, 2, 2, 3]);
    }

    #[test]
    fn test_png_short_last_row_is_zero_padded() {
        let data = [0, 1, 2];
        assert_eq!(decode(&data, &params(10, 4, 1, 8)).unwrap(), vec![1, 2, 0, 0]);
    }

    #[test]
    fn test_png_invalid_row_tag() {
        let err = decode(&[7, 1, 2], &params(10, 2, 1, 8)).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_tiff_8_bit() {
        let data = [10, 20, 30, 1, 2, 3];
        assert_eq!(decode(&data, &params(2, 2, 3, 8)).unwrap(), vec![10, 20, 30, 11, 22, 33]);
    }

    #[test]
    fn test_tiff_1_bit() {
        let data = [0x80, 0x00];
        assert_eq!(decode(&data, &params(2, 16, 1, 1)).unwrap(), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_tiff_16_bit() {
        let data = [0x01, 0xFF, 0x00, 0x02];
        assert_eq!(decode(&data, &params(2, 2, 1, 16)).unwrap(), vec![0x01, 0xFF, 0x02, 0x01]);
    }

    #[test]
    fn test_tiff_4_bit() {
        // Deltas 1, 2, 1, 1 accumulate to 1, 3, 4, 5.
        let data = [0x12, 0x11];
        assert_eq!(decode(&data, &params(2, 4, 1, 4)).unwrap(), vec![0x13, 0x45]);
    }

    #[test]
    fn test_tiff_4_bit_saturated_row() {
        // Every delta is 15, so the samples count down from 15 to 0.
        let decoded = decode(&[0xFF; 8], &params(2, 16, 1, 4)).unwrap();
        assert_eq!(decoded, vec![0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54, 0x32, 0x10]);
    }

    #[test]
    fn test_tiff_2_bit_rgb_saturated_row() {
        // Every delta is 3: each component cycles 3, 2, 1, 0.
        let decoded = decode(&[0xFF; 12], &params(2, 16, 3, 2)).unwrap();
        assert_eq!(decoded, [0xFE, 0xA5, 0x40].repeat(4));
    }

    #[test]
    fn test_unsupported_predictor() {
        let err = decode(b"abc", &params(5, 1, 1, 8)).unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("Unsupported predictor"));
    }

    #[test]
    fn test_new_refuses_no_predictor() {
        let source = Box::new(MemoryStream::from_slice(b"abc"));
        let err = PredictorStream::new(source, None, &DecodeParams::default()).err().unwrap();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_unsupported_bits_per_component() {
        assert!(decode(b"abc", &params(12, 1, 1, 3)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_row_size_overflow() {
        assert!(decode(b"abc", &params(12, usize::MAX, 4, 8)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_bytes_per_row_calculation() {
        let p = params(12, 10, 3, 8);
        assert_eq!(p.pixel_bytes(), 3);
        assert_eq!(p.pixel_bytes_per_row(), 30);
        assert_eq!(p.bytes_per_row(), 31);
    }

    #[test]
    fn test_decode_params_default() {
        let p = DecodeParams::default();
        assert_eq!(p.predictor, 1);
        assert_eq!(p.columns, 1);
        assert_eq!(p.colors, 1);
        assert_eq!(p.bits_per_component, 8);
        assert_eq!(p.early_change, 1);
    }

    #[test]
    fn test_decode_params_from_pdf_keys() {
        let p: DecodeParams = serde_json::from_str(r#"{"Predictor": 12, "Columns": 5}"#).unwrap();
        assert_eq!(p.predictor, 12);
        assert_eq!(p.columns, 5);
        assert_eq!(p.bits_per_component, 8);
    }

    #[test]
    fn test_predictor_name() {
        let source = Box::new(MemoryStream::empty());
        let stream = PredictorStream::new(source, None, &params(12, 1, 1, 8)).unwrap();
        assert_eq!(stream.decoder().name(), "PNGPredictor");
    }
}
