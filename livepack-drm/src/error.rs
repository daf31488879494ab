//! Error types for encryption and PSSH operations.

use livepack_core::Error;
use thiserror::Error;

/// Error type for DRM operations.
#[derive(Error, Debug)]
pub enum DrmError {
    /// Key or IV sizes unusable by the configured cipher.
    #[error("invalid key and IV supplied to encryptor")]
    InvalidKeyIv,

    /// Key identifier is not 16 bytes.
    #[error("invalid key id length: expected 16 bytes, got {0}")]
    InvalidKeyIdLength(usize),

    /// Rejected PSSH generator input; the message names the offending field.
    #[error("{0}")]
    InvalidPsshInput(String),

    /// Subsample ranges do not add up to the sample size.
    #[error("invalid subsample: {0}")]
    InvalidSubsample(String),

    /// Ciphertext padding did not verify during decryption.
    #[error("bad PKCS#7 padding")]
    BadPadding,

    /// Sample payload structure unusable for the configured scheme.
    #[error("malformed sample payload: {0}")]
    MalformedPayload(String),
}

/// Result type alias for DRM operations.
pub type Result<T> = std::result::Result<T, DrmError>;

impl From<DrmError> for Error {
    fn from(err: DrmError) -> Self {
        match err {
            DrmError::InvalidKeyIv
            | DrmError::InvalidKeyIdLength(_)
            | DrmError::InvalidPsshInput(_) => Error::InvalidArgument(err.to_string()),
            DrmError::InvalidSubsample(_)
            | DrmError::BadPadding
            | DrmError::MalformedPayload(_) => Error::Encryption(err.to_string()),
        }
    }
}
