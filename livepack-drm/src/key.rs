//! Key material for content encryption.
//!
//! # Security
//!
//! Content keys are zeroized on drop so key bytes do not linger in memory
//! after the packager releases them.

use crate::error::{DrmError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-128 key in bytes.
pub const AES_128_KEY_SIZE: usize = 16;

/// Size of a full initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Well-known protection system identifiers.
pub mod system_ids {
    use uuid::Uuid;

    /// Common (CENC) system id.
    pub const COMMON: Uuid = Uuid::from_bytes([
        0x10, 0x77, 0xef, 0xec, 0xc0, 0xb2, 0x4d, 0x02, 0xac, 0xe3, 0x3c, 0x1e, 0x52, 0xe2,
        0xfb, 0x4b,
    ]);

    /// Widevine system id.
    pub const WIDEVINE: Uuid = Uuid::from_bytes([
        0xed, 0xef, 0x8b, 0xa9, 0x79, 0xd6, 0x4a, 0xce, 0xa3, 0xc8, 0x27, 0xdc, 0xd5, 0x1d,
        0x21, 0xed,
    ]);

    /// PlayReady system id.
    pub const PLAYREADY: Uuid = Uuid::from_bytes([
        0x9a, 0x04, 0xf0, 0x79, 0x98, 0x40, 0x42, 0x86, 0xab, 0x92, 0xe6, 0x5b, 0xe0, 0x88,
        0x5f, 0x95,
    ]);
}

/// Content encryption key for AES-128.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; AES_128_KEY_SIZE],
}

impl ContentKey {
    /// Create a content key from raw bytes.
    pub fn new(key: [u8; AES_128_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Create a content key from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != AES_128_KEY_SIZE {
            return Err(DrmError::InvalidKeyIv);
        }
        let mut key = [0u8; AES_128_KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self { key })
    }

    /// Derive a per-key-id content key from a master key.
    pub fn derive(key_id: &KeyId, master_key: &ContentKey) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(master_key.as_bytes());
        hasher.update(key_id.as_bytes());
        let hash = hasher.finalize();

        let mut key = [0u8; AES_128_KEY_SIZE];
        key.copy_from_slice(&hash[..AES_128_KEY_SIZE]);
        Self { key }
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AES_128_KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

/// Initialization vector, 8 or 16 bytes.
///
/// An 8-byte IV is the nonce half of a CTR counter block; the counter half
/// starts at zero for each sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Iv {
    bytes: Vec<u8>,
}

impl Iv {
    /// Create an IV from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if !matches!(slice.len(), 8 | IV_SIZE) {
            return Err(DrmError::InvalidKeyIv);
        }
        Ok(Self {
            bytes: slice.to_vec(),
        })
    }

    /// IV length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check whether the IV is empty (never true for a constructed IV).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the raw IV bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Expand to a 16-byte cipher block, zero-filling the counter half of an
    /// 8-byte IV.
    pub fn to_block(&self) -> [u8; IV_SIZE] {
        let mut block = [0u8; IV_SIZE];
        block[..self.bytes.len()].copy_from_slice(&self.bytes);
        block
    }

    /// Derive a new IV by adding `count` to the trailing 64 bits, treated as
    /// a big-endian counter.
    pub fn add_counter(&self, count: u64) -> Iv {
        let mut bytes = self.bytes.clone();
        let tail = bytes.len() - 8;
        let mut counter = u64::from_be_bytes(bytes[tail..].try_into().unwrap_or([0u8; 8]));
        counter = counter.wrapping_add(count);
        bytes[tail..].copy_from_slice(&counter.to_be_bytes());
        Iv { bytes }
    }
}

/// 16-byte key identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId([u8; 16]);

impl KeyId {
    /// Create a key id from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create a key id from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 16 {
            return Err(DrmError::InvalidKeyIdLength(slice.len()));
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the raw bytes of the key id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Get the key id as a UUID.
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    /// Reorder into the little-endian GUID layout used by PlayReady.
    pub fn to_little_endian_bytes(&self) -> [u8; 16] {
        let b = &self.0;
        [
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15],
        ]
    }

    /// Encode as base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.as_uuid())
    }
}
