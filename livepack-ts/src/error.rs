//! Error types for transport stream muxing.

use livepack_core::Error;
use thiserror::Error;

/// Error type for TS operations.
#[derive(Error, Debug)]
pub enum TsError {
    /// The track codec has no TS mapping.
    #[error("unsupported codec for TS output: {0}")]
    UnsupportedCodec(String),

    /// The elementary stream payload cannot be converted.
    #[error("malformed elementary stream: {0}")]
    MalformedStream(String),

    /// Packet layout arithmetic failed; indicates a muxer bug.
    #[error("packet assembly error: {0}")]
    PacketAssembly(String),
}

/// Result type alias for TS operations.
pub type Result<T> = std::result::Result<T, TsError>;

impl From<TsError> for Error {
    fn from(err: TsError) -> Self {
        match err {
            TsError::UnsupportedCodec(_) => Error::Unsupported(err.to_string()),
            TsError::MalformedStream(_) => Error::Parse(err.to_string()),
            TsError::PacketAssembly(_) => Error::Mux(err.to_string()),
        }
    }
}
