//! Widevine PSSH data generation.
//!
//! Widevine carries a protobuf message in the PSSH data field. Only the
//! handful of fields the packager emits are encoded here: the key ids, an
//! optional provider and content id, and the protection scheme fourcc.

use crate::key::{system_ids, KeyId};
use uuid::Uuid;

/// Widevine system ID.
pub const WIDEVINE_SYSTEM_ID: Uuid = system_ids::WIDEVINE;

/// Data portion of a Widevine PSSH box.
#[derive(Clone, Debug, Default)]
pub struct WidevineData {
    /// Key IDs included in this PSSH.
    pub key_ids: Vec<KeyId>,
    /// Content provider name.
    pub provider: Option<String>,
    /// Content ID.
    pub content_id: Option<Vec<u8>>,
    /// Protection scheme fourcc (`cenc`, `cbc1`, `cens`, `cbcs`).
    pub protection_scheme: [u8; 4],
}

impl WidevineData {
    /// Create Widevine data for a key set and scheme.
    pub fn new(key_ids: Vec<KeyId>, protection_scheme: [u8; 4]) -> Self {
        Self {
            key_ids,
            provider: None,
            content_id: None,
            protection_scheme,
        }
    }

    /// Set the content provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the content ID.
    pub fn with_content_id(mut self, content_id: Vec<u8>) -> Self {
        self.content_id = Some(content_id);
        self
    }

    /// Serialize as the protobuf wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // Field 2: key_id, length-delimited, repeated.
        for key_id in &self.key_ids {
            data.push(0x12);
            data.push(16);
            data.extend_from_slice(key_id.as_bytes());
        }

        // Field 3: provider.
        if let Some(ref provider) = self.provider {
            data.push(0x1a);
            encode_varint(&mut data, provider.len() as u64);
            data.extend_from_slice(provider.as_bytes());
        }

        // Field 4: content_id.
        if let Some(ref content_id) = self.content_id {
            data.push(0x22);
            encode_varint(&mut data, content_id.len() as u64);
            data.extend_from_slice(content_id);
        }

        // Field 9: protection_scheme, the big-endian fourcc as a varint.
        data.push(0x48);
        encode_varint(&mut data, u32::from_be_bytes(self.protection_scheme) as u64);

        data
    }
}

/// Encode a protobuf varint.
fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}
