//! Sample-level encryption engine.
//!
//! Applies the configured scheme to demuxed samples (for fMP4 output) or to
//! converted elementary-stream payloads (for SAMPLE-AES TS output), and
//! whole-segment AES-128-CBC for encrypted TS.
//!
//! Subsample layout keeps everything a downstream parser needs for framing
//! in the clear: NAL length prefixes and NAL headers for common encryption,
//! plus the 32-byte slice-data lead that SAMPLE-AES requires.

use crate::aes_cbc::{AesCbc, CbcPatternCryptor, Pattern};
use crate::aes_ctr::{crypt_subsamples, AesCtr};
use crate::error::{DrmError, Result};
use crate::key::{ContentKey, Iv, KeyId};
use livepack_core::{
    LiveConfig, MediaSample, ProtectionScheme, SubsampleEntry, TrackInfo, TrackProtection,
};

/// SAMPLE-AES keeps this many bytes of each video NAL unit in the clear
/// (including the NAL header).
const SAMPLE_AES_VIDEO_CLEAR_LEAD: usize = 32;

/// SAMPLE-AES only encrypts video NAL units larger than this.
const SAMPLE_AES_MIN_NAL_SIZE: usize = 48;

/// SAMPLE-AES keeps this many bytes of each audio frame payload clear.
const SAMPLE_AES_AUDIO_CLEAR_LEAD: usize = 16;

/// ADTS header size without CRC.
const ADTS_HEADER_SIZE: usize = 7;

/// Per-segment sample encryptor.
///
/// One instance serves a single packaging call; per-sample IV state is
/// recomputed from the configured base IV each call, so segments stay
/// independent.
pub struct SampleEncryptor {
    scheme: ProtectionScheme,
    key: ContentKey,
    iv: Iv,
    key_id: KeyId,
    sample_index: u64,
    block_counter: u64,
}

impl SampleEncryptor {
    /// Build an encryptor from the packager configuration.
    pub fn new(config: &LiveConfig) -> Result<Self> {
        let key = ContentKey::from_slice(&config.key)?;
        let iv = Iv::from_slice(&config.iv)?;
        let key_id = KeyId::from_slice(&config.key_id)?;

        Ok(Self {
            scheme: config.protection_scheme,
            key,
            iv,
            key_id,
            sample_index: 0,
            block_counter: 0,
        })
    }

    /// Track-level protection parameters for `tenc`/`sinf`, or `None` when
    /// the scheme does not mark samples.
    pub fn track_protection(&self) -> Option<TrackProtection> {
        match self.scheme {
            ProtectionScheme::Cenc => Some(TrackProtection {
                scheme: *b"cenc",
                default_kid: *self.key_id.as_bytes(),
                per_sample_iv_size: self.iv.len() as u8,
                constant_iv: None,
                crypt_byte_block: 0,
                skip_byte_block: 0,
            }),
            ProtectionScheme::Cbcs | ProtectionScheme::SampleAes => Some(TrackProtection {
                scheme: *b"cbcs",
                default_kid: *self.key_id.as_bytes(),
                per_sample_iv_size: 0,
                constant_iv: Some(self.iv.to_block().to_vec()),
                crypt_byte_block: 1,
                skip_byte_block: 9,
            }),
            ProtectionScheme::None | ProtectionScheme::Aes128 => None,
        }
    }

    /// Encrypt one demuxed sample in place for fMP4 output.
    pub fn encrypt_sample(&mut self, sample: &mut MediaSample, track: &TrackInfo) -> Result<()> {
        match self.scheme {
            ProtectionScheme::Cenc => self.encrypt_sample_cenc(sample, track),
            ProtectionScheme::Cbcs => self.encrypt_sample_cbc(sample, track, 1, false),
            ProtectionScheme::SampleAes => {
                self.encrypt_sample_cbc(sample, track, SAMPLE_AES_VIDEO_CLEAR_LEAD, true)
            }
            ProtectionScheme::None | ProtectionScheme::Aes128 => Ok(()),
        }
    }

    fn encrypt_sample_cenc(&mut self, sample: &mut MediaSample, track: &TrackInfo) -> Result<()> {
        let iv = self.iv.add_counter(self.block_counter);
        let mut cipher = AesCtr::new(self.key.clone(), iv.clone());

        let protected_bytes = if track.codec.is_video() {
            sample.subsamples =
                video_subsamples(&sample.data, track.nal_length_size as usize, 1, 0)?;
            crypt_subsamples(&mut cipher, &mut sample.data, &sample.subsamples)?;
            sample
                .subsamples
                .iter()
                .map(|s| s.protected_bytes as u64)
                .sum()
        } else {
            cipher.crypt(&mut sample.data);
            sample.data.len() as u64
        };

        sample.iv = Some(iv.as_slice().to_vec());
        sample.is_encrypted = true;
        self.block_counter += protected_bytes.div_ceil(16);
        self.sample_index += 1;

        Ok(())
    }

    fn encrypt_sample_cbc(
        &mut self,
        sample: &mut MediaSample,
        track: &TrackInfo,
        nal_clear_lead: usize,
        min_nal_size: bool,
    ) -> Result<()> {
        if track.codec.is_video() {
            let min_size = if min_nal_size { SAMPLE_AES_MIN_NAL_SIZE } else { 0 };
            sample.subsamples = video_subsamples(
                &sample.data,
                track.nal_length_size as usize,
                nal_clear_lead,
                min_size,
            )?;
            let cryptor = CbcPatternCryptor::new(&self.key, &self.iv, Pattern::one_nine());

            let mut offset = 0usize;
            for subsample in &sample.subsamples {
                offset += subsample.clear_bytes as usize;
                let end = offset + subsample.protected_bytes as usize;
                cryptor.encrypt_region(&mut sample.data[offset..end]);
                offset = end;
            }
        } else if self.scheme == ProtectionScheme::SampleAes {
            if sample.data.len() > SAMPLE_AES_AUDIO_CLEAR_LEAD + 16 {
                sample.subsamples = vec![SubsampleEntry::new(
                    SAMPLE_AES_AUDIO_CLEAR_LEAD as u16,
                    (sample.data.len() - SAMPLE_AES_AUDIO_CLEAR_LEAD) as u32,
                )];
                let cryptor = CbcPatternCryptor::new(&self.key, &self.iv, Pattern::full());
                cryptor.encrypt_region(&mut sample.data[SAMPLE_AES_AUDIO_CLEAR_LEAD..]);
            } else {
                sample.subsamples = vec![SubsampleEntry::new(sample.data.len() as u16, 0)];
            }
        } else {
            // cbcs audio: full-sample CBC, trailing partial block clear.
            let cryptor = CbcPatternCryptor::new(&self.key, &self.iv, Pattern::full());
            cryptor.encrypt_region(&mut sample.data);
        }

        sample.iv = None;
        sample.is_encrypted = true;
        self.sample_index += 1;

        Ok(())
    }

    /// Decrypt one sample in place using the metadata the demuxer recovered
    /// (`iv`, subsamples) and this encryptor's key and scheme.
    pub fn decrypt_sample(&self, sample: &mut MediaSample, track: &TrackInfo) -> Result<()> {
        if !sample.is_encrypted {
            return Ok(());
        }

        match self.scheme {
            ProtectionScheme::Cenc => {
                let iv = match &sample.iv {
                    Some(bytes) => Iv::from_slice(bytes)?,
                    None => self.iv.clone(),
                };
                let mut cipher = AesCtr::new(self.key.clone(), iv);
                if sample.subsamples.is_empty() {
                    cipher.crypt(&mut sample.data);
                } else {
                    crypt_subsamples(&mut cipher, &mut sample.data, &sample.subsamples)?;
                }
            }
            ProtectionScheme::Cbcs | ProtectionScheme::SampleAes => {
                let pattern = if track.codec.is_video() {
                    Pattern::one_nine()
                } else {
                    Pattern::full()
                };
                let cryptor = CbcPatternCryptor::new(&self.key, &self.iv, pattern);
                if sample.subsamples.is_empty() {
                    cryptor.decrypt_region(&mut sample.data);
                } else {
                    let subsamples = sample.subsamples.clone();
                    let mut offset = 0usize;
                    for subsample in &subsamples {
                        offset += subsample.clear_bytes as usize;
                        let end = offset + subsample.protected_bytes as usize;
                        if end > sample.data.len() {
                            return Err(DrmError::InvalidSubsample(
                                "subsample range past end of sample".into(),
                            ));
                        }
                        cryptor.decrypt_region(&mut sample.data[offset..end]);
                        offset = end;
                    }
                }
            }
            ProtectionScheme::None | ProtectionScheme::Aes128 => {}
        }

        sample.is_encrypted = false;
        sample.subsamples.clear();
        sample.iv = None;

        Ok(())
    }

    /// Encrypt an Annex B access unit in place per HLS SAMPLE-AES rules.
    ///
    /// Only slice NAL units (types 1 and 5) longer than 48 bytes are
    /// touched; each keeps its first 32 bytes clear and gets the 1:9 block
    /// pattern, chained from the per-sample IV and restarted per NAL unit.
    pub fn encrypt_annexb_access_unit(&mut self, data: &mut [u8]) -> Result<()> {
        let iv = self.iv.add_counter(self.sample_index);
        let cryptor = CbcPatternCryptor::new(&self.key, &iv, Pattern::one_nine());

        let ranges = annexb_nal_ranges(data);
        for (start, len) in ranges {
            let nal_type = data[start] & 0x1F;
            if !matches!(nal_type, 1 | 5) || len <= SAMPLE_AES_MIN_NAL_SIZE {
                continue;
            }
            let region = &mut data[start + SAMPLE_AES_VIDEO_CLEAR_LEAD..start + len];
            cryptor.encrypt_region(region);
        }

        self.sample_index += 1;
        Ok(())
    }

    /// Encrypt one ADTS frame in place per HLS SAMPLE-AES rules.
    ///
    /// The ADTS header and the first 16 payload bytes stay clear; the rest
    /// is full-block AES-CBC with a trailing clear partial block.
    pub fn encrypt_adts_frame(&mut self, data: &mut [u8]) -> Result<()> {
        let iv = self.iv.add_counter(self.sample_index);
        self.sample_index += 1;

        let clear = ADTS_HEADER_SIZE + SAMPLE_AES_AUDIO_CLEAR_LEAD;
        if data.len() <= clear + 16 {
            return Ok(());
        }

        let cryptor = CbcPatternCryptor::new(&self.key, &iv, Pattern::full());
        cryptor.encrypt_region(&mut data[clear..]);
        Ok(())
    }

    /// Encrypt a whole TS segment with AES-128-CBC and PKCS#7 padding.
    pub fn encrypt_whole_segment(&self, data: &[u8]) -> Vec<u8> {
        AesCbc::new(&self.key, &self.iv).encrypt_pkcs7(data)
    }
}

/// Build subsample entries over length-prefixed NAL units.
///
/// Each NAL unit keeps its length prefix plus `clear_lead` payload bytes in
/// the clear. NAL units no larger than `min_protected_size` (or the clear
/// lead) stay entirely clear and are merged into the next entry.
fn video_subsamples(
    data: &[u8],
    nal_length_size: usize,
    clear_lead: usize,
    min_protected_size: usize,
) -> Result<Vec<SubsampleEntry>> {
    let mut subsamples: Vec<SubsampleEntry> = Vec::new();
    let mut pending_clear: u64 = 0;
    let mut offset = 0usize;

    while offset < data.len() {
        if offset + nal_length_size > data.len() {
            return Err(DrmError::MalformedPayload(
                "truncated NAL length prefix".into(),
            ));
        }
        let mut nal_size = 0usize;
        for &byte in &data[offset..offset + nal_length_size] {
            nal_size = (nal_size << 8) | byte as usize;
        }
        let total = nal_length_size + nal_size;
        if offset + total > data.len() {
            return Err(DrmError::MalformedPayload(format!(
                "NAL unit of {} bytes exceeds sample end",
                nal_size
            )));
        }

        if nal_size <= clear_lead || nal_size <= min_protected_size {
            pending_clear += total as u64;
        } else {
            let clear = pending_clear + (nal_length_size + clear_lead) as u64;
            let protected = (nal_size - clear_lead) as u32;
            push_with_clear(&mut subsamples, clear, protected);
            pending_clear = 0;
        }

        offset += total;
    }

    if pending_clear > 0 {
        push_with_clear(&mut subsamples, pending_clear, 0);
    }

    Ok(subsamples)
}

/// Append an entry, splitting clear runs that exceed the u16 field range.
fn push_with_clear(subsamples: &mut Vec<SubsampleEntry>, mut clear: u64, protected: u32) {
    while clear > u16::MAX as u64 {
        subsamples.push(SubsampleEntry::new(u16::MAX, 0));
        clear -= u16::MAX as u64;
    }
    subsamples.push(SubsampleEntry::new(clear as u16, protected));
}

/// Locate NAL unit payloads in an Annex B buffer.
///
/// Returns `(payload offset, payload length)` pairs, where the payload
/// starts at the NAL header byte.
fn annexb_nal_ranges(data: &[u8]) -> Vec<(usize, usize)> {
    let mut starts = Vec::new();
    let mut i = 0usize;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                starts.push(i + 3);
                i += 3;
                continue;
            }
            if i + 4 <= data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                starts.push(i + 4);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    let mut ranges = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = if n + 1 < starts.len() {
            // Back off over the next start code (3 or 4 bytes).
            let next = starts[n + 1];
            if next >= 4 && data[next - 4] == 0 && data[next - 3] == 0 && data[next - 2] == 0 {
                next - 4
            } else {
                next - 3
            }
        } else {
            data.len()
        };
        if end > start {
            ranges.push((start, end - start));
        }
    }
    ranges
}
