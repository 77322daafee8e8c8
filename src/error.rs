//! Error types for the stream filter decoders.
//!
//! This module defines all error types that can occur while constructing or
//! reading a filter chain.

/// Result type alias for decoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during stream decoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The encoded data is unrecoverably malformed at the point of failure
    /// (bad Flate header, unknown block type, invalid predictor tag, ...).
    #[error("Format error: {0}")]
    Format(String),

    /// Stream decoding error (limit violations, codec failures)
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Operation not supported by this stream type
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error reports malformed encoded data.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let err = Error::Format("Bad FCHECK in flate stream: 120, 157".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Format error"));
        assert!(msg.contains("FCHECK"));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_unsupported_filter_error() {
        let err = Error::UnsupportedFilter("FooDecode".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Unsupported filter"));
        assert!(msg.contains("FooDecode"));
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
