//! AES-128-CBC primitives: whole-buffer PKCS#7 and pattern encryption.

use crate::error::{DrmError, Result};
use crate::key::{ContentKey, Iv};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Crypt/skip block pattern for partial encryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Number of consecutive encrypted blocks.
    pub crypt_blocks: u32,
    /// Number of consecutive clear blocks following them.
    pub skip_blocks: u32,
}

impl Pattern {
    /// The 1:9 pattern used by `cbcs` and SAMPLE-AES video.
    pub fn one_nine() -> Self {
        Self {
            crypt_blocks: 1,
            skip_blocks: 9,
        }
    }

    /// Encrypt every block.
    pub fn full() -> Self {
        Self {
            crypt_blocks: 1,
            skip_blocks: 0,
        }
    }

    /// Check whether the block at `index` is encrypted.
    pub fn is_crypt_block(&self, index: u32) -> bool {
        if self.skip_blocks == 0 {
            return true;
        }
        index % (self.crypt_blocks + self.skip_blocks) < self.crypt_blocks
    }
}

/// Whole-buffer AES-CBC with PKCS#7 padding and a constant IV.
///
/// Used for AES-128 full-segment encryption of TS output.
pub struct AesCbc {
    cipher: Aes128,
    iv: [u8; AES_BLOCK_SIZE],
}

impl AesCbc {
    /// Create a new CBC cryptor.
    pub fn new(key: &ContentKey, iv: &Iv) -> Self {
        Self {
            cipher: Aes128::new(key.as_bytes().into()),
            iv: iv.to_block(),
        }
    }

    /// Encrypt `plaintext`, appending PKCS#7 padding.
    ///
    /// The output length is the input length rounded up to the next block
    /// boundary; an aligned input gains a full padding block.
    pub fn encrypt_pkcs7(&self, plaintext: &[u8]) -> Vec<u8> {
        let pad = AES_BLOCK_SIZE - (plaintext.len() % AES_BLOCK_SIZE);
        let mut out = Vec::with_capacity(plaintext.len() + pad);
        out.extend_from_slice(plaintext);
        out.resize(plaintext.len() + pad, pad as u8);

        let mut chain = self.iv;
        for block in out.chunks_exact_mut(AES_BLOCK_SIZE) {
            for (byte, chain_byte) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chain_byte;
            }
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
            chain.copy_from_slice(block);
        }

        out
    }

    /// Decrypt `ciphertext` and strip PKCS#7 padding.
    pub fn decrypt_pkcs7(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(DrmError::BadPadding);
        }

        let mut out = ciphertext.to_vec();
        let mut chain = self.iv;
        for block in out.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut next_chain = [0u8; AES_BLOCK_SIZE];
            next_chain.copy_from_slice(block);
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
            for (byte, chain_byte) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chain_byte;
            }
            chain = next_chain;
        }

        let pad = *out.last().unwrap_or(&0) as usize;
        if pad == 0 || pad > AES_BLOCK_SIZE || pad > out.len() {
            return Err(DrmError::BadPadding);
        }
        if out[out.len() - pad..].iter().any(|&b| b as usize != pad) {
            return Err(DrmError::BadPadding);
        }
        out.truncate(out.len() - pad);

        Ok(out)
    }
}

/// Pattern-based AES-CBC over a protected byte region.
///
/// The cipher chain starts at the IV for each region and carries across
/// skipped blocks, so only the blocks the pattern selects are transformed.
/// A trailing partial block is always left clear.
pub struct CbcPatternCryptor {
    cipher: Aes128,
    iv: [u8; AES_BLOCK_SIZE],
    pattern: Pattern,
}

impl CbcPatternCryptor {
    /// Create a new pattern cryptor.
    pub fn new(key: &ContentKey, iv: &Iv, pattern: Pattern) -> Self {
        Self {
            cipher: Aes128::new(key.as_bytes().into()),
            iv: iv.to_block(),
            pattern,
        }
    }

    /// Encrypt one protected region in place.
    pub fn encrypt_region(&self, data: &mut [u8]) {
        let full_blocks = data.len() / AES_BLOCK_SIZE;
        let mut chain = self.iv;

        for index in 0..full_blocks {
            if !self.pattern.is_crypt_block(index as u32) {
                continue;
            }
            let start = index * AES_BLOCK_SIZE;
            let block = &mut data[start..start + AES_BLOCK_SIZE];
            for (byte, chain_byte) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chain_byte;
            }
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
            chain.copy_from_slice(block);
        }
    }

    /// Decrypt one protected region in place.
    pub fn decrypt_region(&self, data: &mut [u8]) {
        let full_blocks = data.len() / AES_BLOCK_SIZE;
        let mut chain = self.iv;

        for index in 0..full_blocks {
            if !self.pattern.is_crypt_block(index as u32) {
                continue;
            }
            let start = index * AES_BLOCK_SIZE;
            let block = &mut data[start..start + AES_BLOCK_SIZE];
            let mut next_chain = [0u8; AES_BLOCK_SIZE];
            next_chain.copy_from_slice(block);
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
            for (byte, chain_byte) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chain_byte;
            }
            chain = next_chain;
        }
    }
}
