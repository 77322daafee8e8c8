// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::needless_range_loop)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::len_without_is_empty)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Stream Filters
//!
//! Pull-based decoders for the PDF stream filters (ISO 32000-1:2008, §7.4).
//!
//! ## Core Features
//!
//! - **Lazy decoding**: every filter is a [`Stream`] that decodes one block
//!   at a time, only as far as the consumer reads
//! - **Filters**: FlateDecode (self-contained inflater), LZWDecode with
//!   EarlyChange, RunLengthDecode, ASCIIHexDecode, ASCII85Decode
//! - **Predictors**: TIFF predictor 2 and PNG predictors 10-15
//! - **Fax images**: CCITTFaxDecode Group 3 (1-D) and Group 4 into packed
//!   1-bit rows
//! - **Chains**: filters stack in any order; [`StreamSequence`] concatenates
//!   content streams
//! - **Bulk codecs**: Brotli and JPEG decode their whole input at once behind
//!   the same read surface
//! - **Safety**: malformed data is a [`Error::Format`], never a panic, and the
//!   pipeline helpers stop decompression bombs while decoding
//!
//! ## Quick Start
//!
//! ```
//! use pdf_stream_filters::decoders::{build_filter_chain, FilterSpec};
//! use pdf_stream_filters::{MemoryStream, Stream};
//!
//! # fn main() -> pdf_stream_filters::Result<()> {
//! let raw = MemoryStream::from_slice(b"48656C6C6F>");
//! let specs = [FilterSpec::from_name("ASCIIHexDecode", None)?];
//! let mut stream = build_filter_chain(raw, &specs)?;
//! assert_eq!(stream.get_bytes(None)?, b"Hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Decoding options
pub mod config;

// Stream read surface
pub mod stream;

// Stream decoders
pub mod decoders;

// Re-exports
pub use config::DecodeOptions;
pub use decoders::{
    decode_stream, decode_stream_with_options, decode_stream_with_params,
    decode_stream_with_specs, CcittParams, DecodeParams, DecodeStream, Filter, FilterSpec,
    StreamSequence,
};
pub use error::{Error, Result};
pub use stream::{MemoryStream, Stream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_stream_filters");
    }
}
