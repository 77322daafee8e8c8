//! Integration tests for stream decoders.
//!
//! Tests all decoders with various scenarios including:
//! - Filter chains built from names and parameters
//! - Pipeline helpers, limits and lenient recovery
//! - Stream sequences and bulk codecs
//! - Edge cases and error handling

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_stream_filters::decoders::{
    build_filter_chain, decode_stream, decode_stream_with_options, decode_stream_with_params,
    decode_stream_with_specs, BulkDecodeStream, CcittParams, DctCodec, FilterSpec, FlateStream,
    StreamSequence,
};
use pdf_stream_filters::{DecodeOptions, DecodeParams, Error, MemoryStream, Stream};
use std::io::Write;
use weezl::{encode::Encoder as LzwEncoder, BitOrder};

fn zlib(data: &[u8], level: Compression) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn hex(data: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = data.iter().flat_map(|b| format!("{:02X}", b).into_bytes()).collect();
    out.push(b'>');
    out
}

fn names(filters: &[&str]) -> Vec<String> {
    filters.iter().map(|f| f.to_string()).collect()
}

/// Deterministic text with enough variety to defeat long matches.
fn sample_text(len: usize) -> Vec<u8> {
    let words = [
        "stream", "filter", "object", "xref", "trailer", "page", "font", "glyph", "content",
    ];
    let mut seed: u32 = 7;
    let mut out = Vec::with_capacity(len + 16);
    while out.len() < len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        out.extend_from_slice(words[(seed >> 24) as usize % words.len()].as_bytes());
        out.push(if seed & 0x100 == 0 { b' ' } else { b'\n' });
    }
    out.truncate(len);
    out
}

#[test]
fn test_flate_decoder_integration() {
    let original = b"This is a test of FlateDecode compression in a PDF stream.";
    let compressed = zlib(original, Compression::default());

    let decoded = decode_stream(&compressed, &names(&["FlateDecode"])).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_flate_partial_reads_decode_lazily() {
    let original = sample_text(200_000);
    // Stored blocks hold at most 64 KiB each.
    let compressed = zlib(&original, Compression::none());

    let source = Box::new(MemoryStream::from_slice(&compressed));
    let mut stream = FlateStream::new(source, Some(compressed.len())).unwrap();
    assert_eq!(stream.get_bytes(Some(100)).unwrap(), &original[..100]);
    assert!(!stream.is_eof());
    assert!(stream.buffer().len() < original.len());

    let rest = stream.get_bytes(None).unwrap();
    assert_eq!(rest, &original[100..]);
}

#[test]
fn test_flate_with_png_predictor() {
    // Two rows of 4 bytes using the Up filter.
    let rows = [2u8, 1, 2, 3, 4, 2, 1, 1, 1, 1];
    let compressed = zlib(&rows, Compression::default());
    let params = DecodeParams {
        predictor: 12,
        columns: 4,
        ..DecodeParams::default()
    };

    let decoded =
        decode_stream_with_params(&compressed, &names(&["FlateDecode"]), Some(&params)).unwrap();
    assert_eq!(decoded, vec![1, 2, 3, 4, 2, 3, 4, 5]);
}

#[test]
fn test_lzw_default_early_change() {
    let original = sample_text(5000);
    let compressed = LzwEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(&original)
        .unwrap();

    let decoded = decode_stream(&compressed, &names(&["LZWDecode"])).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_lzw_early_change_zero() {
    let original = sample_text(3000);
    let compressed = LzwEncoder::new(BitOrder::Msb, 8).encode(&original).unwrap();
    let params = DecodeParams {
        early_change: 0,
        ..DecodeParams::default()
    };

    let decoded =
        decode_stream_with_params(&compressed, &names(&["LZW"]), Some(&params)).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_lzw_with_tiff_predictor() {
    // One RGB row of two pixels, the second stored as a difference.
    let row = [10u8, 20, 30, 1, 2, 3];
    let compressed = LzwEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(&row)
        .unwrap();
    let params = DecodeParams {
        predictor: 2,
        columns: 2,
        colors: 3,
        ..DecodeParams::default()
    };

    let decoded =
        decode_stream_with_params(&compressed, &names(&["LZWDecode"]), Some(&params)).unwrap();
    assert_eq!(decoded, vec![10, 20, 30, 11, 22, 33]);
}

#[test]
fn test_hex_then_flate_chain() {
    let original = b"Chained filters decode outermost first.";
    let encoded = hex(&zlib(original, Compression::default()));

    let decoded = decode_stream(&encoded, &names(&["AHx", "Fl"])).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_ascii85_decoder_integration() {
    let decoded = decode_stream(b"<+U,m z~>", &names(&["ASCII85Decode"])).unwrap();
    assert_eq!(decoded, b"Test\x00\x00\x00\x00");
}

#[test]
fn test_runlength_decoder_integration() {
    let input = [0x02, b'A', b'B', b'C', 0xFE, b'Z', 0x80];
    let decoded = decode_stream(&input, &names(&["RunLengthDecode"])).unwrap();
    assert_eq!(decoded, b"ABCZZZ");
}

#[test]
fn test_brotli_filter() {
    let original = sample_text(10_000);
    let mut compressed = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
        writer.write_all(&original).unwrap();
    }

    let decoded = decode_stream(&compressed, &names(&["BrotliDecode"])).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_ccitt_group_4_after_flate() {
    // Four all-white Group 4 rows of 8 pixels, then EOFB.
    let fax = [0xF0, 0x01, 0x00, 0x10];
    let encoded = zlib(&fax, Compression::default());
    let specs = [
        FilterSpec::from_name("FlateDecode", None).unwrap(),
        FilterSpec::from_name("CCITTFaxDecode", None)
            .unwrap()
            .with_ccitt_params(CcittParams {
                k: -1,
                columns: 8,
                rows: 4,
                ..CcittParams::default()
            }),
    ];

    let decoded = decode_stream_with_specs(&encoded, &specs, None).unwrap();
    assert_eq!(decoded, vec![0xFF; 4]);
}

#[test]
fn test_empty_data_with_filters() {
    let decoded = decode_stream(b"", &names(&["FlateDecode", "LZWDecode"])).unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn test_unsupported_filter() {
    let err = decode_stream(b"data", &names(&["Crypt"])).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFilter(ref name) if name == "Crypt"));
}

#[test]
fn test_bad_flate_header_fails_chain_construction() {
    let specs = [FilterSpec::from_name("FlateDecode", None).unwrap()];
    let err = build_filter_chain(MemoryStream::from_slice(b"not zlib"), &specs)
        .err()
        .unwrap();
    assert!(err.is_format_error());
}

#[test]
fn test_decompression_bomb_ratio() {
    let zeros = vec![0u8; 4 * 1024 * 1024];
    let compressed = zlib(&zeros, Compression::best());

    let err = decode_stream_with_options(&compressed, &names(&["FlateDecode"]), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(err.to_string().contains("Decompression bomb detected"));
}

#[test]
fn test_decompression_size_limit() {
    let original = sample_text(50_000);
    let compressed = zlib(&original, Compression::default());
    let options = DecodeOptions::strict()
        .with_max_decompression_ratio(0)
        .with_max_decompressed_size(10_000)
        .with_read_chunk_size(4096);

    let err = decode_stream_with_options(&compressed, &names(&["Fl"]), None, Some(&options))
        .unwrap_err();
    assert!(err.to_string().contains("exceeds limit 10000 bytes"));
}

#[test]
fn test_lenient_mode_keeps_prefix() {
    let original = sample_text(20_000);
    let compressed = zlib(&original, Compression::best());
    let truncated = &compressed[..compressed.len() * 3 / 4];
    let flate = names(&["FlateDecode"]);

    let strict = DecodeOptions::strict().with_max_decompression_ratio(0);
    let err = decode_stream_with_options(truncated, &flate, None, Some(&strict)).unwrap_err();
    assert!(err.is_format_error());

    let lenient = DecodeOptions::lenient().with_max_decompression_ratio(0);
    let partial = decode_stream_with_options(truncated, &flate, None, Some(&lenient)).unwrap();
    assert!(!partial.is_empty());
    assert!(partial.len() < original.len());
    assert!(original.starts_with(&partial));
}

#[test]
fn test_sequence_of_content_streams() {
    let first = zlib(b"BT /F1 12 Tf ", Compression::default());
    let second = zlib(b"(Hello) Tj ET", Compression::default());
    let parts: Vec<Box<dyn Stream>> = vec![
        Box::new(FlateStream::new(Box::new(MemoryStream::from_slice(&first)), None).unwrap()),
        Box::new(FlateStream::new(Box::new(MemoryStream::from_slice(&second)), None).unwrap()),
    ];

    let mut sequence = StreamSequence::new(parts);
    assert_eq!(sequence.get_bytes(None).unwrap(), b"BT /F1 12 Tf (Hello) Tj ET");
}

#[test]
fn test_chain_reports_base_stream() {
    let compressed = zlib(b"base", Compression::default());
    let specs = [
        FilterSpec::from_name("FlateDecode", None).unwrap(),
        FilterSpec::from_name("ASCIIHexDecode", None).unwrap(),
    ];
    let stream = build_filter_chain(MemoryStream::from_slice(&compressed), &specs).unwrap();

    let bases = stream.base_streams().unwrap();
    assert_eq!(bases.len(), 1);
    assert_eq!(bases[0].length(), Some(compressed.len()));
}

#[test]
fn test_sub_stream_of_decoded_data() {
    let compressed = zlib(b"0123456789", Compression::default());
    let mut stream =
        FlateStream::new(Box::new(MemoryStream::from_slice(&compressed)), None).unwrap();

    let mut sub = stream.make_sub_stream(3, Some(4)).unwrap();
    assert_eq!(sub.get_bytes(None).unwrap(), b"3456");
    assert_eq!(stream.peek_bytes(Some(2)).unwrap(), b"01");
}

#[test]
fn test_dct_bulk_decode() {
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    let img = GrayImage::from_pixel(16, 8, Luma([200]));
    let mut jpeg = Cursor::new(Vec::new());
    img.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
    let jpeg = jpeg.into_inner();

    let source = Box::new(MemoryStream::from_slice(&jpeg));
    let mut stream = BulkDecodeStream::new(source, Some(jpeg.len()), DctCodec);
    assert!(stream.can_async_decode_image_from_buffer());
    assert_eq!(stream.decode_image_blocking(None).unwrap().len(), 16 * 8);
}
