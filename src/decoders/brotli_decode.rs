//! BrotliDecode implementation.

use crate::decoders::bulk::ImageCodec;
use crate::error::{Error, Result};

/// BrotliDecode codec. Brotli frames are decoded in one piece.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrotliCodec;

impl ImageCodec for BrotliCodec {
    fn name(&self) -> &'static str {
        "BrotliDecode"
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = data;
        let mut decompressed = Vec::new();
        brotli::BrotliDecompress(&mut reader, &mut decompressed)
            .map_err(|e| Error::Decode(format!("BrotliDecode: {}", e)))?;
        Ok(decompressed)
    }
}
