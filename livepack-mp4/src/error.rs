//! Error types for ISO-BMFF parsing and writing.

use livepack_core::Error;
use thiserror::Error;

/// Error type for MP4 operations.
#[derive(Error, Debug)]
pub enum Mp4Error {
    /// A box size points past the end of the available data.
    #[error("truncated {box_type} box at offset {offset}")]
    Truncated {
        /// Type of the offending box.
        box_type: String,
        /// Absolute offset of the box header.
        offset: usize,
    },

    /// A required box was not found.
    #[error("missing required {0} box")]
    MissingBox(String),

    /// A box payload does not match its declared layout.
    #[error("malformed {box_type} box: {message}")]
    Malformed {
        /// Type of the offending box.
        box_type: String,
        /// What was wrong with it.
        message: String,
    },

    /// A sample range resolved outside the media data.
    #[error("sample data out of range: {0}")]
    SampleOutOfRange(String),

    /// Inconsistent writer input.
    #[error("writer invariant violated: {0}")]
    WriterInvariant(String),
}

impl Mp4Error {
    /// Create a malformed-box error.
    pub fn malformed(box_type: &[u8; 4], message: impl Into<String>) -> Self {
        Mp4Error::Malformed {
            box_type: crate::boxes::fourcc_to_string(box_type),
            message: message.into(),
        }
    }
}

/// Result type alias for MP4 operations.
pub type Result<T> = std::result::Result<T, Mp4Error>;

impl From<Mp4Error> for Error {
    fn from(err: Mp4Error) -> Self {
        match err {
            Mp4Error::WriterInvariant(_) => Error::Mux(err.to_string()),
            _ => Error::Parse(err.to_string()),
        }
    }
}
