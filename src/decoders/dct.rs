//! DCTDecode (JPEG) implementation.
//!
//! Decodes baseline and progressive JPEG data to raw samples with the
//! `image` crate. JPEG needs its whole input, so this is an [`ImageCodec`]
//! driven by a [`BulkDecodeStream`](crate::decoders::BulkDecodeStream).

use crate::decoders::bulk::ImageCodec;
use crate::error::{Error, Result};
use image::ImageFormat;

/// DCTDecode codec.
///
/// Output is the decoded samples, row by row, in the image's own color
/// layout (one byte per gray sample, three per RGB pixel).
#[derive(Debug, Clone, Copy, Default)]
pub struct DctCodec;

impl ImageCodec for DctCodec {
    fn name(&self) -> &'static str {
        "DCTDecode"
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| Error::Image(format!("DCTDecode: {}", e)))?;
        log::debug!(
            "DCTDecode: {}x{} {:?}",
            image.width(),
            image.height(),
            image.color()
        );
        Ok(image.into_bytes())
    }

    fn is_async_decoder(&self) -> bool {
        true
    }
}
