//! Whole-buffer decoding for filters that cannot work incrementally.
//!
//! Image codecs (JPEG, JPEG 2000, JBIG2) and Brotli need all of their input
//! before they produce anything. A [`BulkDecodeStream`] collects the encoded
//! bytes once, hands them to an [`ImageCodec`], and then serves the decoded
//! result through the ordinary [`Stream`] read surface. Incremental reads
//! before [`BulkDecodeStream::decode_image`] are refused.

use std::sync::Arc;

use bytes::Bytes;

use crate::decoders::decode_stream::{DecodeBuffer, DecodeStream, StreamDecoder};
use crate::error::{Error, Result};
use crate::stream::Stream;

/// A codec that decodes a complete encoded buffer in one call.
pub trait ImageCodec: Send + Sync + 'static {
    /// Filter name, e.g. "DCTDecode".
    fn name(&self) -> &'static str;

    /// Decode the complete encoded buffer.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Whether decoding is heavy enough to be moved off the calling task.
    fn is_async_decoder(&self) -> bool {
        false
    }
}

/// Collects encoded bytes for an [`ImageCodec`].
pub struct BulkDecoder<C> {
    source: Box<dyn Stream>,
    codec: Arc<C>,
    maybe_length: Option<usize>,
    bytes: Option<Bytes>,
}

/// Stream decoded in one piece by an [`ImageCodec`].
pub type BulkDecodeStream<C> = DecodeStream<BulkDecoder<C>>;

impl<C: ImageCodec> BulkDecodeStream<C> {
    /// Decode `source` with `codec`. `maybe_length` bounds how many encoded
    /// bytes are collected; `None` collects everything.
    pub fn new(source: Box<dyn Stream>, maybe_length: Option<usize>, codec: C) -> Self {
        DecodeStream::with_decoder(
            BulkDecoder {
                source,
                codec: Arc::new(codec),
                maybe_length,
                bytes: None,
            },
            maybe_length,
        )
    }

    /// The encoded bytes, read from the source on first use and cached.
    pub fn bytes(&mut self) -> Result<Bytes> {
        let (decoder, _) = self.parts_mut();
        if let Some(bytes) = &decoder.bytes {
            return Ok(bytes.clone());
        }
        let bytes = Bytes::copy_from_slice(decoder.source.get_bytes(decoder.maybe_length)?);
        decoder.bytes = Some(bytes.clone());
        Ok(bytes)
    }

    /// Whether the encoded bytes can be handed over without further reads:
    /// they are cached already or the source knows its exact length.
    pub fn can_async_decode_image_from_buffer(&self) -> bool {
        let decoder = self.decoder();
        decoder.bytes.is_some() || decoder.source.length().is_some()
    }

    /// Whether the codec runs off the calling task.
    pub fn is_async_decoder(&self) -> bool {
        self.decoder().codec.is_async_decoder()
    }

    /// Decode `bytes` (or the source's bytes when `None`) on the calling
    /// thread and return the decoded data.
    ///
    /// Once decoded, later calls return the same data without decoding again.
    pub fn decode_image_blocking(&mut self, bytes: Option<Bytes>) -> Result<&[u8]> {
        if !self.is_eof() {
            let data = self.input(bytes)?;
            let decoded = self.decoder().codec.decode(&data)?;
            self.finish(decoded);
        }
        Ok(self.buffer().as_slice())
    }

    /// Decode `bytes` (or the source's bytes when `None`) and return the
    /// decoded data.
    ///
    /// With the `async` feature, codecs reporting
    /// [`ImageCodec::is_async_decoder`] run on tokio's blocking pool.
    pub async fn decode_image(&mut self, bytes: Option<Bytes>) -> Result<&[u8]> {
        if !self.is_eof() {
            let data = self.input(bytes)?;
            let decoded = self.run_codec(data).await?;
            self.finish(decoded);
        }
        Ok(self.buffer().as_slice())
    }

    #[cfg(feature = "async")]
    async fn run_codec(&self, data: Bytes) -> Result<Vec<u8>> {
        let codec = Arc::clone(&self.decoder().codec);
        if !codec.is_async_decoder() {
            return codec.decode(&data);
        }
        let name = codec.name();
        tokio::task::spawn_blocking(move || codec.decode(&data))
            .await
            .map_err(|e| Error::Decode(format!("{}: decoder task failed: {}", name, e)))?
    }

    #[cfg(not(feature = "async"))]
    async fn run_codec(&self, data: Bytes) -> Result<Vec<u8>> {
        self.decoder().codec.decode(&data)
    }

    fn input(&mut self, bytes: Option<Bytes>) -> Result<Bytes> {
        match bytes {
            Some(bytes) => Ok(bytes),
            None => self.bytes(),
        }
    }

    fn finish(&mut self, decoded: Vec<u8>) {
        log::debug!(
            "{}: decoded {} bytes in one piece",
            self.decoder().codec.name(),
            decoded.len()
        );
        self.replace_buffer(DecodeBuffer::from_decoded(decoded));
    }
}

impl<C: ImageCodec> StreamDecoder for BulkDecoder<C> {
    fn read_block(&mut self, _out: &mut DecodeBuffer) -> Result<()> {
        Err(Error::Unsupported(format!(
            "{} cannot be read incrementally, use decode_image",
            self.codec.name()
        )))
    }

    fn source(&self) -> Option<&dyn Stream> {
        Some(self.source.as_ref())
    }

    fn name(&self) -> &str {
        self.codec.name()
    }
}
