//! CCITTFaxDecode implementation.
//!
//! Group 3 (one-dimensional) and Group 4 fax compression for monochrome
//! images, decoded with the `fax` crate.
//!
//! See ISO 32000-1:2008, section 7.4.6.

use serde::{Deserialize, Serialize};

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;

/// CCITTFaxDecode parameters, keyed like the PDF `DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CcittParams {
    /// Encoding scheme: negative = Group 4, 0 = Group 3 1-D, positive = mixed
    #[serde(rename = "K")]
    pub k: i64,
    /// Width of the image in pixels (default 1728)
    pub columns: usize,
    /// Height of the image in rows, 0 when unknown
    pub rows: usize,
    /// Whether 1 bits are black in the decoded data
    #[serde(rename = "BlackIs1")]
    pub black_is_1: bool,
    /// Whether each encoded row starts on a byte boundary
    pub encoded_byte_align: bool,
    /// Whether the data ends with an end-of-block pattern
    pub end_of_block: bool,
    /// Whether rows are prefixed with end-of-line patterns
    pub end_of_line: bool,
}

impl Default for CcittParams {
    fn default() -> Self {
        Self {
            k: 0,
            columns: 1728,
            rows: 0,
            black_is_1: false,
            encoded_byte_align: false,
            end_of_block: true,
            end_of_line: false,
        }
    }
}

impl CcittParams {
    /// Pure two-dimensional (T.6) coding.
    pub fn is_group_4(&self) -> bool {
        self.k < 0
    }

    /// Bytes in one decoded row.
    pub fn bytes_per_row(&self) -> usize {
        self.columns.div_ceil(8)
    }
}

/// CCITTFaxDecode filter state.
///
/// The fax decoder is callback driven, so the whole encoded input is decoded
/// on the first block; rows are then handed out one per block.
pub struct CcittFaxDecoder {
    source: Box<dyn Stream>,
    params: CcittParams,
    width: u16,
    decoded: Option<Vec<u8>>,
    next_row: usize,
    failure: Option<String>,
}

/// Stream decoding CCITTFaxDecode data into packed 1-bit rows.
pub type CcittFaxStream = DecodeStream<CcittFaxDecoder>;

impl CcittFaxStream {
    /// Decode `source` with `params`.
    ///
    /// Mixed Group 3 coding (K > 0) and byte-aligned rows are refused as
    /// unsupported; a zero or oversized `Columns` is a format error.
    pub fn new(
        source: Box<dyn Stream>,
        maybe_length: Option<usize>,
        params: CcittParams,
    ) -> Result<Self> {
        if params.k > 0 {
            return Err(Error::Unsupported(format!(
                "CCITTFaxDecode: mixed 1-D/2-D coding (K = {})",
                params.k
            )));
        }
        if params.encoded_byte_align {
            return Err(Error::Unsupported(
                "CCITTFaxDecode: EncodedByteAlign".to_string(),
            ));
        }
        let width = u16::try_from(params.columns)
            .ok()
            .filter(|&w| w > 0)
            .ok_or_else(|| {
                Error::Format(format!("CCITTFaxDecode: invalid Columns {}", params.columns))
            })?;

        log::debug!(
            "CCITTFaxDecode: {}x{} pixels, K={}, BlackIs1={}",
            params.columns,
            params.rows,
            params.k,
            params.black_is_1
        );

        Ok(DecodeStream::with_decoder(
            CcittFaxDecoder {
                source,
                params,
                width,
                decoded: None,
                next_row: 0,
                failure: None,
            },
            maybe_length,
        ))
    }
}

impl CcittFaxDecoder {
    fn decode_rows(&mut self) -> Result<Vec<u8>> {
        let data = self.source.get_bytes(None)?.to_vec();
        let width = usize::from(self.width);
        let bytes_per_row = self.params.bytes_per_row();
        let max_rows = (self.params.rows > 0).then_some(self.params.rows);

        let mut output = Vec::new();
        let mut decoded_rows = 0usize;
        let mut on_row = |transitions: &[u16]| {
            if max_rows.is_some_and(|max| decoded_rows >= max) {
                return;
            }
            output.extend(transitions_to_bytes(transitions, width));
            decoded_rows += 1;
        };

        let status = if self.params.is_group_4() {
            let height = max_rows.and_then(|rows| u16::try_from(rows).ok());
            fax::decoder::decode_g4(data.iter().copied(), self.width, height, &mut on_row)
        } else {
            fax::decoder::decode_g3(data.iter().copied(), &mut on_row)
        };

        let complete = max_rows.is_some_and(|max| decoded_rows >= max);
        if status.is_none() && !complete {
            self.failure = Some(format!(
                "CCITTFaxDecode: malformed data after {} rows",
                decoded_rows
            ));
        }

        if !self.params.black_is_1 {
            for byte in output.iter_mut() {
                *byte = !*byte;
            }
        }
        log::trace!(
            "CCITTFaxDecode: {} bytes into {} rows of {} bytes",
            data.len(),
            decoded_rows,
            bytes_per_row
        );
        Ok(output)
    }
}

impl StreamDecoder for CcittFaxDecoder {
    fn read_block(&mut self, out: &mut DecodeBuffer) -> Result<()> {
        if self.decoded.is_none() {
            self.decoded = Some(self.decode_rows()?);
        }
        let rows = self.decoded.as_deref().unwrap_or_default();

        let bytes_per_row = self.params.bytes_per_row();
        let start = self.next_row * bytes_per_row;
        if start >= rows.len() {
            out.set_eof();
            return match self.failure.take() {
                Some(message) => Err(Error::Format(message)),
                None => Ok(()),
            };
        }

        let end = (start + bytes_per_row).min(rows.len());
        out.extend_from_slice(&rows[start..end]);
        self.next_row += 1;
        Ok(())
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        "CCITTFaxDecode"
    }
}

/// Pack one row given as color-change positions, starting with white.
///
/// Black pixels are set bits; positions past `width` are ignored.
fn transitions_to_bytes(transitions: &[u16], width: usize) -> Vec<u8> {
    let mut row = vec![0u8; width.div_ceil(8)];
    let mut fill_black = |from: usize, to: usize| {
        for pixel in from..to.min(width) {
            row[pixel / 8] |= 0x80 >> (pixel % 8);
        }
    };

    let mut is_black = false;
    let mut start = 0usize;
    for &position in transitions {
        let position = usize::from(position);
        if is_black {
            fill_black(start, position);
        }
        is_black = !is_black;
        start = position;
    }
    if is_black {
        fill_black(start, width);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    /// Eight all-white Group 4 rows (one V0 code each) and EOFB.
    const WHITE_G4: [u8; 4] = [0xFF, 0x00, 0x10, 0x01];

    fn g4_params(columns: usize, rows: usize) -> CcittParams {
        CcittParams {
            k: -1,
            columns,
            rows,
            ..CcittParams::default()
        }
    }

    fn open(data: &[u8], params: CcittParams) -> Result<CcittFaxStream> {
        CcittFaxStream::new(Box::new(MemoryStream::from_slice(data)), None, params)
    }

    #[test]
    fn test_transitions_to_bytes() {
        // White 0-2, black 2-5, white 5-7, black 7-8.
        assert_eq!(transitions_to_bytes(&[2, 5, 7], 8), vec![0b0011_1001]);
    }

    #[test]
    fn test_transitions_black_to_end_of_row() {
        assert_eq!(transitions_to_bytes(&[4], 12), vec![0x0F, 0xF0]);
        assert_eq!(transitions_to_bytes(&[], 12), vec![0x00, 0x00]);
    }

    #[test]
    fn test_transitions_clipped_to_width() {
        assert_eq!(transitions_to_bytes(&[6, 20], 8), vec![0b0000_0011]);
    }

    #[test]
    fn test_g4_white_rows() {
        let mut stream = open(&WHITE_G4, g4_params(16, 8)).unwrap();
        // White is 1 unless BlackIs1 is set.
        assert_eq!(stream.get_bytes(None).unwrap(), &[0xFF; 16][..]);
    }

    #[test]
    fn test_g4_black_is_1() {
        let params = CcittParams {
            black_is_1: true,
            ..g4_params(16, 8)
        };
        let mut stream = open(&WHITE_G4, params).unwrap();
        assert_eq!(stream.get_bytes(None).unwrap(), &[0x00; 16][..]);
    }

    #[test]
    fn test_rows_limit_output() {
        let mut stream = open(&WHITE_G4, g4_params(16, 3)).unwrap();
        assert_eq!(stream.get_bytes(None).unwrap().len(), 6);
    }

    #[test]
    fn test_rows_are_decoded_one_block_at_a_time() {
        let mut stream = open(&WHITE_G4, g4_params(16, 8)).unwrap();
        assert_eq!(stream.get_bytes(Some(2)).unwrap(), &[0xFF, 0xFF]);
        assert_eq!(stream.buffer().len(), 2);
        assert!(!stream.is_eof());
    }

    #[test]
    fn test_unsupported_parameters() {
        let mixed = CcittParams {
            k: 4,
            ..CcittParams::default()
        };
        assert!(matches!(open(&WHITE_G4, mixed).err(), Some(Error::Unsupported(_))));

        let aligned = CcittParams {
            encoded_byte_align: true,
            ..g4_params(16, 8)
        };
        assert!(matches!(open(&WHITE_G4, aligned).err(), Some(Error::Unsupported(_))));
    }

    #[test]
    fn test_invalid_columns() {
        assert!(open(&WHITE_G4, g4_params(0, 8)).err().unwrap().is_format_error());
        assert!(open(&WHITE_G4, g4_params(70_000, 8)).err().unwrap().is_format_error());
    }

    #[test]
    fn test_params_from_pdf_keys() {
        let params: CcittParams =
            serde_json::from_str(r#"{"K": -1, "Columns": 2550, "BlackIs1": true}"#).unwrap();
        assert!(params.is_group_4());
        assert_eq!(params.columns, 2550);
        assert!(params.black_is_1);
        assert!(params.end_of_block);
        assert_eq!(params.bytes_per_row(), 319);
    }

    #[test]
    fn test_default_params() {
        let params = CcittParams::default();
        assert_eq!(params.k, 0);
        assert_eq!(params.columns, 1728);
        assert!(!params.is_group_4());
    }
}
