//! Stream decoder implementations for PDF filters.
//!
//! This module provides decoders for various PDF compression and encoding filters:
//! - FlateDecode (zlib/deflate) - most common
//! - LZWDecode - LZW compression
//! - ASCIIHexDecode - hexadecimal encoding
//! - ASCII85Decode - base85 encoding
//! - RunLengthDecode - run-length encoding
//! - BrotliDecode - brotli compression (decoded in one piece)
//! - CCITTFaxDecode - Group 3/4 fax images, decoded to packed 1-bit rows
//! - DCTDecode, JPXDecode, JBIG2Decode - image data (passed through for the
//!   image layer, or decoded with a [`BulkDecodeStream`] codec)
//!
//! Every filter is a [`Stream`] that pulls from the stream below it, so
//! filters chain into a pipeline that decodes only as much as is read.

use crate::config::DecodeOptions;
use crate::error::{Error, Result};
use crate::stream::{MemoryStream, Stream};

mod ascii85;
mod ascii_hex;
mod brotli_decode;
mod bulk;
mod ccitt;
mod dct;
mod decode_stream;
mod flate;
mod lzw;
mod predictor;
mod runlength;
mod sequence;

pub use ascii85::{Ascii85Decoder, Ascii85Stream};
pub use ascii_hex::{AsciiHexDecoder, AsciiHexStream};
pub use brotli_decode::BrotliCodec;
pub use bulk::{BulkDecodeStream, BulkDecoder, ImageCodec};
pub use ccitt::{CcittFaxDecoder, CcittFaxStream, CcittParams};
pub use dct::DctCodec;
pub use decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
pub use flate::{FlateDecoder, FlateStream};
pub use lzw::{LzwDecoder, LzwStream};
pub use predictor::{DecodeParams, PngFilterType, PredictorDecoder, PredictorStream};
pub use runlength::{RunLengthDecoder, RunLengthStream};
pub use sequence::{PartErrorHandler, SequenceDecoder, StreamSequence};

/// PDF stream filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (deflate/zlib compression)
    FlateDecode,
    /// ASCIIHexDecode (hexadecimal encoding)
    ASCIIHexDecode,
    /// ASCII85Decode (base-85 encoding)
    ASCII85Decode,
    /// LZWDecode (Lempel-Ziv-Welch compression)
    LZWDecode,
    /// RunLengthDecode (run-length encoding)
    RunLengthDecode,
    /// BrotliDecode (brotli compression)
    BrotliDecode,
    /// DCTDecode (JPEG compression)
    DCTDecode,
    /// JPXDecode (JPEG 2000 compression)
    JPXDecode,
    /// CCITTFaxDecode (CCITT Fax compression)
    CCITTFaxDecode,
    /// JBIG2Decode (JBIG2 compression)
    JBIG2Decode,
}

impl Filter {
    /// Look up a filter by its PDF name or inline-image abbreviation.
    pub fn from_name(name: &str) -> Option<Self> {
        let filter = match name {
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "BrotliDecode" => Filter::BrotliDecode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "JPXDecode" => Filter::JPXDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            "JBIG2Decode" => Filter::JBIG2Decode,
            _ => return None,
        };
        Some(filter)
    }

    /// The full PDF name of the filter.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::FlateDecode => "FlateDecode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::LZWDecode => "LZWDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::BrotliDecode => "BrotliDecode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
        }
    }

    /// Whether the filter produces image samples rather than a byte stream.
    pub fn is_image_filter(&self) -> bool {
        matches!(
            self,
            Filter::DCTDecode | Filter::JPXDecode | Filter::CCITTFaxDecode | Filter::JBIG2Decode
        )
    }
}

/// One stage of a filter chain: a filter and its decode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// The filter
    pub filter: Filter,
    /// Its `DecodeParms` entry, if any
    pub params: Option<DecodeParams>,
    /// `DecodeParms` of a CCITTFaxDecode stage (defaults when `None`)
    pub ccitt: Option<CcittParams>,
}

impl FilterSpec {
    /// Build a stage from a filter name.
    pub fn from_name(name: &str, params: Option<DecodeParams>) -> Result<Self> {
        let filter =
            Filter::from_name(name).ok_or_else(|| Error::UnsupportedFilter(name.to_string()))?;
        Ok(Self {
            filter,
            params,
            ccitt: None,
        })
    }

    /// Attach CCITTFaxDecode parameters to this stage.
    pub fn with_ccitt_params(mut self, ccitt: CcittParams) -> Self {
        self.ccitt = Some(ccitt);
        self
    }
}

/// Wrap `source` in the stream for `filter`.
///
/// Flate and LZW apply a predictor when `params` asks for one; LZW also
/// takes its EarlyChange value from `params` (default 1). BrotliDecode is
/// decoded in one piece right away. CCITTFaxDecode uses the default
/// [`CcittParams`]; the remaining image filters return `source` unchanged.
pub fn make_filter(
    source: Box<dyn Stream>,
    filter: Filter,
    maybe_length: Option<usize>,
    params: Option<&DecodeParams>,
) -> Result<Box<dyn Stream>> {
    log::debug!("Creating {} stream (length hint {:?})", filter.name(), maybe_length);

    let stream: Box<dyn Stream> = match filter {
        Filter::FlateDecode => {
            let flate = Box::new(FlateStream::new(source, maybe_length)?);
            with_predictor(flate, maybe_length, params)?
        },
        Filter::LZWDecode => {
            let early_change = params.map_or(1, |p| p.early_change);
            let lzw = Box::new(LzwStream::new(source, maybe_length, early_change));
            with_predictor(lzw, maybe_length, params)?
        },
        Filter::ASCIIHexDecode => Box::new(AsciiHexStream::new(source, maybe_length)),
        Filter::ASCII85Decode => Box::new(Ascii85Stream::new(source, maybe_length)),
        Filter::RunLengthDecode => Box::new(RunLengthStream::new(source, maybe_length)),
        Filter::BrotliDecode => {
            let mut brotli = BulkDecodeStream::new(source, maybe_length, BrotliCodec);
            brotli.decode_image_blocking(None)?;
            Box::new(brotli)
        },
        Filter::CCITTFaxDecode => Box::new(CcittFaxStream::new(
            source,
            maybe_length,
            CcittParams::default(),
        )?),
        Filter::DCTDecode | Filter::JPXDecode | Filter::JBIG2Decode => {
            log::debug!("{}: passing encoded image data through", filter.name());
            source
        },
    };
    Ok(stream)
}

fn with_predictor(
    stream: Box<dyn Stream>,
    maybe_length: Option<usize>,
    params: Option<&DecodeParams>,
) -> Result<Box<dyn Stream>> {
    match params {
        Some(params) => PredictorStream::wrap(stream, maybe_length, params),
        None => Ok(stream),
    }
}

/// Build the decoding chain for a stream object's raw bytes.
///
/// Stages apply in order. Only the first stage gets the raw length as its
/// size hint. Empty raw data yields an empty stream whatever the filters.
pub fn build_filter_chain(source: MemoryStream, specs: &[FilterSpec]) -> Result<Box<dyn Stream>> {
    if source.bytes().is_empty() {
        return Ok(Box::new(MemoryStream::empty()));
    }

    let mut maybe_length = source.length();
    let mut stream: Box<dyn Stream> = Box::new(source);
    for spec in specs {
        stream = match (spec.filter, &spec.ccitt) {
            (Filter::CCITTFaxDecode, Some(ccitt)) => {
                Box::new(CcittFaxStream::new(stream, maybe_length, ccitt.clone())?)
            },
            _ => make_filter(stream, spec.filter, maybe_length, spec.params.as_ref())?,
        };
        maybe_length = None;
    }
    Ok(stream)
}

/// Decode stream data using a filter pipeline.
///
/// PDF streams can have multiple filters applied in sequence. This function
/// applies each filter in order to decode the data.
///
/// # Arguments
///
/// * `data` - The raw stream data
/// * `filters` - List of filter names to apply in order
///
/// # Returns
///
/// The fully decoded data or an error if any filter fails.
///
/// # Examples
///
/// ```rust,no_run
/// use pdf_stream_filters::decoders::decode_stream;
///
/// let compressed_data = vec![/* compressed bytes */];
/// let filters = vec!["FlateDecode".to_string()];
/// let decoded = decode_stream(&compressed_data, &filters).unwrap();
/// ```
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_params(data, filters, None)
}

/// Decode stream data using a filter pipeline with optional decode parameters.
///
/// The parameters belong to the last filter, which covers the usual single
/// `DecodeParms` dictionary. No size limits are applied.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let unlimited = DecodeOptions::strict()
        .with_max_decompression_ratio(0)
        .with_max_decompressed_size(0);
    decode_stream_with_options(data, filters, params, Some(&unlimited))
}

/// Decode stream data with decode options (includes decompression bomb protection).
///
/// # Arguments
///
/// * `data` - The raw stream data
/// * `filters` - List of filter names to apply in order
/// * `params` - Optional decode parameters for the last filter
/// * `options` - Limits and strictness; defaults when `None`
///
/// # Security
///
/// The chain is drained in `read_chunk_size` pieces and the limits are
/// checked after every piece, so a decompression bomb is stopped while it is
/// being decoded rather than after it has filled memory.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: Option<&DecodeOptions>,
) -> Result<Vec<u8>> {
    let specs = filters
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let stage_params = if i + 1 == filters.len() {
                params.cloned()
            } else {
                None
            };
            FilterSpec::from_name(name, stage_params)
        })
        .collect::<Result<Vec<_>>>()?;

    decode_stream_with_specs(data, &specs, options)
}

/// Decode stream data through prepared filter stages.
///
/// Same limits and recovery as [`decode_stream_with_options`], for callers
/// that carry per-stage parameters such as [`CcittParams`].
pub fn decode_stream_with_specs(
    data: &[u8],
    specs: &[FilterSpec],
    options: Option<&DecodeOptions>,
) -> Result<Vec<u8>> {
    let options = options.copied().unwrap_or_default();
    let mut stream = build_filter_chain(MemoryStream::from_slice(data), specs)?;
    let chunk_size = options.read_chunk_size.max(1);
    let mut output = Vec::new();

    loop {
        let chunk = match stream.get_bytes(Some(chunk_size)) {
            Ok(chunk) => chunk,
            Err(e) if !options.strict && e.is_format_error() => {
                output.extend_from_slice(stream.buffered_bytes());
                if output.is_empty() {
                    return Err(e);
                }
                log::warn!(
                    "Keeping {} bytes decoded before error: {}",
                    output.len(),
                    e
                );
                check_limits(output.len(), data.len(), &options)?;
                return Ok(output);
            },
            Err(e) => return Err(e),
        };
        if chunk.is_empty() {
            break;
        }
        output.extend_from_slice(chunk);
        check_limits(output.len(), data.len(), &options)?;
    }

    log::debug!(
        "Decoded {} bytes into {} bytes through {} filter(s)",
        data.len(),
        output.len(),
        specs.len()
    );
    Ok(output)
}

/// Enforce the ratio and size limits of `options`.
fn check_limits(decoded: usize, encoded: usize, options: &DecodeOptions) -> Result<()> {
    let max_ratio = options.max_decompression_ratio;
    if max_ratio > 0 && encoded > 0 {
        let ratio = decoded as u64 / encoded as u64;
        if ratio > u64::from(max_ratio) {
            return Err(Error::Decode(format!(
                "Decompression bomb detected: ratio {}:1 exceeds limit {}:1 (compressed: {} bytes, decompressed: {} bytes)",
                ratio, max_ratio, encoded, decoded
            )));
        }
    }

    let max_size = options.max_decompressed_size;
    if max_size > 0 && decoded > max_size {
        return Err(Error::Decode(format!(
            "Decompression bomb detected: decompressed size {} bytes exceeds limit {} bytes",
            decoded, max_size
        )));
    }
    Ok(())
}
