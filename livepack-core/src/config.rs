//! Packager configuration.
//!
//! A [`LiveConfig`] fully describes one packaging pipeline: the output
//! container, the track kind, and the content protection applied to every
//! segment. The configuration is immutable for the lifetime of a packager
//! instance.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fragmented MP4 (CMAF).
    Fmp4,
    /// MPEG-2 Transport Stream.
    Ts,
    /// WebVTT cues packed into MP4 fragments.
    VttMp4,
    /// TTML document packed into an MP4 fragment.
    TtmlMp4,
    /// Raw TTML pass-through.
    Ttml,
}

impl OutputFormat {
    /// Check whether this format carries timed text.
    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::VttMp4 | OutputFormat::TtmlMp4 | OutputFormat::Ttml)
    }
}

/// Kind of elementary track being packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
    /// Timed-text track.
    Text,
}

/// Content protection scheme applied to packaged segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionScheme {
    /// No encryption.
    #[default]
    None,
    /// Apple HLS SAMPLE-AES (per-sample AES-CBC with NAL patterning).
    SampleAes,
    /// Whole-segment AES-128-CBC with PKCS#7 padding (TS only).
    Aes128,
    /// ISO common encryption, AES-CBC with 1:9 pattern and constant IV.
    Cbcs,
    /// ISO common encryption, AES-CTR.
    Cenc,
}

impl ProtectionScheme {
    /// Check whether this scheme encrypts individual samples.
    pub fn is_sample_level(&self) -> bool {
        matches!(
            self,
            ProtectionScheme::SampleAes | ProtectionScheme::Cbcs | ProtectionScheme::Cenc
        )
    }
}

/// Protection system selector bits for PSSH emission.
pub mod protection_systems {
    /// Common (CENC clear-key style) system box.
    pub const COMMON: u32 = 1 << 0;
    /// Widevine system box.
    pub const WIDEVINE: u32 = 1 << 1;
    /// PlayReady system box.
    pub const PLAYREADY: u32 = 1 << 2;
    /// All supported systems.
    pub const ALL: u32 = COMMON | WIDEVINE | PLAYREADY;
}

/// Immutable configuration for a packager instance.
#[derive(Clone)]
pub struct LiveConfig {
    /// Output container format.
    pub format: OutputFormat,
    /// Kind of track in the input.
    pub track_type: TrackType,
    /// Content protection scheme.
    pub protection_scheme: ProtectionScheme,
    /// Initialization vector, 8 or 16 bytes when a scheme is configured.
    pub iv: Vec<u8>,
    /// AES-128 content key, 16 bytes when a scheme is configured.
    pub key: Vec<u8>,
    /// Key identifier, 16 bytes when a scheme is configured.
    pub key_id: Vec<u8>,
    /// Bitset of protection systems whose PSSH boxes go into fMP4 init output.
    pub protection_systems: u32,
    /// Used as the fragment sequence number when greater than zero, and to
    /// seed the PAT/PMT continuity counters (mod 16) for TS output.
    pub segment_number: u32,
    /// Milliseconds added to every PTS/DTS written into TS output.
    pub m2ts_offset_ms: i32,
    /// Base decode time for VTT/TTML-in-MP4 output.
    pub timed_text_decode_time: i64,
    /// Key for decrypting pre-encrypted input before re-encryption.
    pub decryption_key: Option<Vec<u8>>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Fmp4,
            track_type: TrackType::Video,
            protection_scheme: ProtectionScheme::None,
            iv: Vec::new(),
            key: Vec::new(),
            key_id: Vec::new(),
            protection_systems: 0,
            segment_number: 0,
            m2ts_offset_ms: 0,
            timed_text_decode_time: 0,
            decryption_key: None,
        }
    }
}

impl fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConfig")
            .field("format", &self.format)
            .field("track_type", &self.track_type)
            .field("protection_scheme", &self.protection_scheme)
            .field("iv", &format_args!("[{} bytes]", self.iv.len()))
            .field("key", &format_args!("[REDACTED]"))
            .field("key_id", &format_args!("[{} bytes]", self.key_id.len()))
            .field("protection_systems", &self.protection_systems)
            .field("segment_number", &self.segment_number)
            .field("m2ts_offset_ms", &self.m2ts_offset_ms)
            .field("timed_text_decode_time", &self.timed_text_decode_time)
            .finish()
    }
}

impl LiveConfig {
    /// Validate the configuration.
    ///
    /// Checks key material lengths, the format/scheme combination and the
    /// protection system bitset.
    pub fn validate(&self) -> Result<()> {
        if self.protection_scheme != ProtectionScheme::None {
            if self.key.len() != 16 || !matches!(self.iv.len(), 8 | 16) {
                return Err(Error::invalid_argument(
                    "invalid key and IV supplied to encryptor",
                ));
            }
            if self.key_id.len() != 16 {
                return Err(Error::invalid_argument(format!(
                    "key id must be 16 bytes, got {}",
                    self.key_id.len()
                )));
            }
        }

        if self.protection_scheme == ProtectionScheme::Aes128
            && self.format != OutputFormat::Ts
        {
            return Err(Error::unsupported(
                "AES-128 whole-segment encryption requires TS output",
            ));
        }

        if self.protection_systems != 0 {
            if self.protection_systems & !protection_systems::ALL != 0 {
                return Err(Error::invalid_argument(
                    "unknown bit in protection system set",
                ));
            }
            if self.protection_scheme == ProtectionScheme::None {
                return Err(Error::invalid_argument(
                    "protection systems requested without an encryption scheme",
                ));
            }
        }

        if let Some(ref dk) = self.decryption_key {
            if dk.len() != 16 {
                return Err(Error::invalid_argument(format!(
                    "decryption key must be 16 bytes, got {}",
                    dk.len()
                )));
            }
        }

        if self.format.is_text() && self.track_type != TrackType::Text {
            return Err(Error::unsupported(
                "timed-text output formats require a text track",
            ));
        }

        Ok(())
    }

    /// Sequence number written into `mfhd`, clamped to a minimum of 1.
    pub fn moof_sequence_number(&self) -> u32 {
        self.segment_number.max(1)
    }
}
