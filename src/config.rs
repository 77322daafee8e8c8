//! Configuration for stream decoding.
//!
//! Controls how the pipeline helpers in [`crate::decoders`] react to
//! malformed data and how far they let a stream expand.
//!
//! # Example
//!
//! ```
//! use pdf_stream_filters::config::DecodeOptions;
//!
//! // Strict mode - fail on the first format error (default)
//! let strict = DecodeOptions::strict();
//!
//! // Lenient mode - keep what decoded before a format error
//! let lenient = DecodeOptions::lenient().with_max_decompressed_size(16 * 1024 * 1024);
//! assert!(strict.strict && !lenient.strict);
//! ```

use serde::{Deserialize, Serialize};

/// Default maximum decompression ratio (decoded:encoded).
pub const DEFAULT_MAX_DECOMPRESSION_RATIO: u32 = 100;

/// Default maximum decoded size: 100 MB.
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Default number of bytes the pipeline requests per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Options for the decoding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Fail on the first format error (true) or keep the bytes decoded
    /// before it (false)
    pub strict: bool,

    /// Maximum decompression ratio (decoded:encoded)
    ///
    /// Prevents decompression bomb attacks where small compressed data
    /// expands to enormous uncompressed data, causing memory exhaustion.
    ///
    /// Default: 100 (100:1 ratio). Set to 0 to disable check.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes
    ///
    /// Default: 100 MB. Set to 0 to disable check.
    pub max_decompressed_size: usize,

    /// Bytes requested from the filter chain per read
    ///
    /// Limits are checked after every chunk, so at most one chunk (plus one
    /// decoded block) is produced past a limit before decoding stops.
    pub read_chunk_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl DecodeOptions {
    /// Strict mode: any format error fails the decode.
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_decompression_ratio: DEFAULT_MAX_DECOMPRESSION_RATIO,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    /// Lenient mode: a format error after some output keeps that output.
    ///
    /// Use this for extracting data from damaged files. Limit violations
    /// still fail.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::strict()
        }
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the decoded size limit. 0 disables it.
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Set the decompression ratio limit. 0 disables it.
    pub fn with_max_decompression_ratio(mut self, ratio: u32) -> Self {
        self.max_decompression_ratio = ratio;
        self
    }

    /// Set the per-read chunk size. Zero is treated as one byte.
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }
}
