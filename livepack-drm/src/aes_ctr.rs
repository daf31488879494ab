//! AES-128-CTR primitives for CENC sample encryption.

use crate::error::{DrmError, Result};
use crate::key::{ContentKey, Iv};
use aes::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use aes::Aes128;
use livepack_core::SubsampleEntry;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// AES-CTR keystream applied in place.
///
/// CTR mode is symmetric; decryption is the same operation as encryption.
pub struct AesCtr {
    key: ContentKey,
    iv: Iv,
    byte_offset: u64,
}

impl AesCtr {
    /// Create a new AES-CTR cryptor.
    pub fn new(key: ContentKey, iv: Iv) -> Self {
        Self {
            key,
            iv,
            byte_offset: 0,
        }
    }

    fn create_cipher(&self) -> Aes128Ctr {
        Aes128Ctr::new(self.key.as_bytes().into(), &self.iv.to_block().into())
    }

    /// Apply the keystream to `data`, continuing from the current offset.
    pub fn crypt(&mut self, data: &mut [u8]) {
        if data.is_empty() {
            return;
        }
        let mut cipher = self.create_cipher();
        cipher.seek(self.byte_offset);
        cipher.apply_keystream(data);
        self.byte_offset += data.len() as u64;
    }

    /// Replace the IV and rewind the keystream offset.
    pub fn set_iv(&mut self, iv: Iv) {
        self.iv = iv;
        self.byte_offset = 0;
    }

    /// Current keystream byte offset.
    pub fn offset(&self) -> u64 {
        self.byte_offset
    }
}

/// Apply the keystream to the protected ranges of a subsampled payload.
///
/// The keystream is continuous across protected ranges, as CENC requires.
pub fn crypt_subsamples(
    cipher: &mut AesCtr,
    data: &mut [u8],
    subsamples: &[SubsampleEntry],
) -> Result<()> {
    let total: u64 = subsamples.iter().map(|s| s.total_size()).sum();
    if total != data.len() as u64 {
        return Err(DrmError::InvalidSubsample(format!(
            "subsample ranges cover {} bytes, sample is {}",
            total,
            data.len()
        )));
    }

    let mut offset = 0usize;
    for subsample in subsamples {
        offset += subsample.clear_bytes as usize;
        let end = offset + subsample.protected_bytes as usize;
        cipher.crypt(&mut data[offset..end]);
        offset = end;
    }

    Ok(())
}
