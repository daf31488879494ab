//! Error types for timed-text packaging.

use livepack_core::Error;
use thiserror::Error;

/// Error type for timed-text operations.
#[derive(Error, Debug)]
pub enum TextError {
    /// The WebVTT document or a cue inside it is malformed.
    #[error("invalid WebVTT: {0}")]
    InvalidWebVtt(String),

    /// The payload is not valid UTF-8 text.
    #[error("text payload is not UTF-8")]
    NotUtf8,

    /// The TTML document is unusable.
    #[error("invalid TTML: {0}")]
    InvalidTtml(String),

    /// Writing the MP4 wrapper failed.
    #[error("text packaging failed: {0}")]
    Packaging(String),
}

/// Result type alias for timed-text operations.
pub type Result<T> = std::result::Result<T, TextError>;

impl From<TextError> for Error {
    fn from(err: TextError) -> Self {
        match err {
            TextError::Packaging(_) => Error::Mux(err.to_string()),
            _ => Error::Parse(err.to_string()),
        }
    }
}
