//! # Livepack DRM
//!
//! Content encryption and protection-system signaling for the livepack
//! packager.
//!
//! # Features
//!
//! - **AES-128-CTR** sample encryption for `cenc`
//! - **AES-128-CBC pattern** encryption for `cbcs` and HLS SAMPLE-AES
//! - **Whole-segment AES-128-CBC** with PKCS#7 padding for encrypted TS
//! - **Subsample construction** that keeps NAL framing bytes in the clear
//! - **PSSH generation** for the common, Widevine and PlayReady systems,
//!   byte-deterministic for a given key set
//!
//! # Example
//!
//! ```
//! use livepack_drm::pssh::{generate_pssh_data, scheme_fourcc, PsshGeneratorInput};
//!
//! let input = PsshGeneratorInput {
//!     protection_scheme: scheme_fourcc::CENC,
//!     key: vec![0u8; 16],
//!     key_id: vec![1u8; 16],
//!     key_ids: vec![vec![1u8; 16]],
//! };
//! let pssh = generate_pssh_data(&input).unwrap();
//! assert_eq!(&pssh.cenc_box[4..8], b"pssh");
//! ```

#![warn(missing_docs)]

pub mod aes_cbc;
pub mod aes_ctr;
pub mod error;
pub mod key;
pub mod playready;
pub mod pssh;
pub mod sample_enc;
pub mod widevine;

pub use aes_cbc::{AesCbc, CbcPatternCryptor, Pattern};
pub use aes_ctr::{crypt_subsamples, AesCtr};
pub use error::{DrmError, Result};
pub use key::{system_ids, ContentKey, Iv, KeyId};
pub use pssh::{generate_pssh_data, PsshData, PsshGeneratorInput};
pub use sample_enc::SampleEncryptor;
