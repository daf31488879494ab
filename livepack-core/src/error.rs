//! Error types for the livepack library.
//!
//! Every failure inside a packaging call collapses into one of the five
//! kinds below before it crosses the public API boundary.

use thiserror::Error;

/// Main error type for packaging operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration, wrong key/IV sizes, null sinks, unknown enums.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed fMP4/TTML/WebVTT input.
    #[error("parse error: {0}")]
    Parse(String),

    /// Subsample arithmetic mismatch or cipher failure.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Internal invariant violation while writing output.
    #[error("mux error: {0}")]
    Mux(String),

    /// Combination of format, track type and scheme that is not implemented.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an encryption error.
    pub fn encryption(msg: impl Into<String>) -> Self {
        Error::Encryption(msg.into())
    }

    /// Create a mux error.
    pub fn mux(msg: impl Into<String>) -> Self {
        Error::Mux(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
