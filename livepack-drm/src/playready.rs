//! PlayReady header object (PRO) generation.
//!
//! The PRO wraps a WRMHEADER v4.0.0.0 XML record encoded as UTF-16LE. Key
//! ids appear as base64 little-endian GUIDs together with an 8-byte key
//! checksum, so the output is fully determined by the key material.

use crate::error::Result;
use crate::key::{system_ids, ContentKey, KeyId};
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use uuid::Uuid;

/// PlayReady system ID.
pub const PLAYREADY_SYSTEM_ID: Uuid = system_ids::PLAYREADY;

/// Algorithm identifier written into the WRMHEADER.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayReadyAlgorithm {
    /// AES-CTR content encryption.
    AesCtr,
    /// AES-CBC content encryption.
    AesCbc,
    /// Cocktail (used for CBCS-packaged HLS content).
    Cocktail,
}

impl PlayReadyAlgorithm {
    /// Algorithm id string for the header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AesCtr => "AESCTR",
            Self::AesCbc => "AESCBC",
            Self::Cocktail => "COCKTAIL",
        }
    }

    /// Pick the algorithm for a protection scheme fourcc.
    pub fn for_scheme(scheme: [u8; 4]) -> Self {
        match &scheme {
            b"cbcs" => Self::Cocktail,
            b"cbc1" => Self::AesCbc,
            _ => Self::AesCtr,
        }
    }
}

/// Compute the PlayReady key checksum.
///
/// The little-endian key id GUID is AES-128-ECB encrypted with the content
/// key; the first 8 bytes of the ciphertext are the checksum.
pub fn key_checksum(key: &ContentKey, key_id: &KeyId) -> [u8; 8] {
    let cipher = Aes128::new(key.as_bytes().into());
    let mut block = key_id.to_little_endian_bytes();
    cipher.encrypt_block((&mut block).into());

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&block[..8]);
    checksum
}

/// Generate the WRMHEADER v4.0.0.0 XML for one key.
pub fn wrm_header_xml(key: &ContentKey, key_id: &KeyId, algorithm: PlayReadyAlgorithm) -> String {
    let kid_b64 = BASE64.encode(key_id.to_little_endian_bytes());
    let checksum_b64 = BASE64.encode(key_checksum(key, key_id));

    format!(
        "<WRMHEADER xmlns=\"http://schemas.microsoft.com/DRM/2007/03/PlayReadyHeader\" \
         version=\"4.0.0.0\"><DATA><PROTECTINFO><KEYLEN>16</KEYLEN><ALGID>{}</ALGID>\
         </PROTECTINFO><KID>{}</KID><CHECKSUM>{}</CHECKSUM></DATA></WRMHEADER>",
        algorithm.as_str(),
        kid_b64,
        checksum_b64
    )
}

/// Generate the binary PlayReady header object.
///
/// Layout: u32-LE total length, u16-LE record count, then one record of
/// type 1 (rights management header) holding the UTF-16LE XML.
pub fn generate_pro(
    key: &ContentKey,
    key_id: &KeyId,
    algorithm: PlayReadyAlgorithm,
) -> Result<Vec<u8>> {
    let xml = wrm_header_xml(key, key_id, algorithm);
    let xml_bytes: Vec<u8> = xml
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();

    let pro_length = 4 + 2 + 2 + 2 + xml_bytes.len();
    let mut pro = Vec::with_capacity(pro_length);
    pro.extend_from_slice(&(pro_length as u32).to_le_bytes());
    pro.extend_from_slice(&1u16.to_le_bytes());
    pro.extend_from_slice(&1u16.to_le_bytes());
    pro.extend_from_slice(&(xml_bytes.len() as u16).to_le_bytes());
    pro.extend_from_slice(&xml_bytes);

    Ok(pro)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> ContentKey {
        let bytes: Vec<u8> = (0..16).map(|i| i as u8 * 3).collect();
        ContentKey::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_playready_system_id() {
        assert_eq!(
            PLAYREADY_SYSTEM_ID.to_string(),
            "9a04f079-9840-4286-ab92-e65be0885f95"
        );
    }

    #[test]
    fn test_algorithm_selection() {
        assert_eq!(PlayReadyAlgorithm::for_scheme(*b"cenc").as_str(), "AESCTR");
        assert_eq!(PlayReadyAlgorithm::for_scheme(*b"cens").as_str(), "AESCTR");
        assert_eq!(
            PlayReadyAlgorithm::for_scheme(*b"cbcs").as_str(),
            "COCKTAIL"
        );
        assert_eq!(PlayReadyAlgorithm::for_scheme(*b"cbc1").as_str(), "AESCBC");
    }

    #[test]
    fn test_xml_shape() {
        let key_id = KeyId::from_bytes([0x11; 16]);
        let xml = wrm_header_xml(&test_key(), &key_id, PlayReadyAlgorithm::AesCtr);

        assert!(xml.starts_with("<WRMHEADER xmlns="));
        assert!(xml.contains("version=\"4.0.0.0\""));
        assert!(xml.contains("<KEYLEN>16</KEYLEN>"));
        assert!(xml.contains("<ALGID>AESCTR</ALGID>"));
        assert!(xml.contains("<KID>"));
        assert!(xml.contains("<CHECKSUM>"));
        assert!(xml.ends_with("</DATA></WRMHEADER>"));
    }

    #[test]
    fn test_pro_layout() {
        let key_id = KeyId::from_bytes([0x22; 16]);
        let pro = generate_pro(&test_key(), &key_id, PlayReadyAlgorithm::AesCtr).unwrap();

        let total = u32::from_le_bytes(pro[0..4].try_into().unwrap()) as usize;
        assert_eq!(total, pro.len());
        assert_eq!(u16::from_le_bytes(pro[4..6].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(pro[6..8].try_into().unwrap()), 1);

        let record_len = u16::from_le_bytes(pro[8..10].try_into().unwrap()) as usize;
        assert_eq!(record_len, pro.len() - 10);
        // UTF-16LE starts with '<' 0x00.
        assert_eq!(&pro[10..12], &[b'<', 0]);
    }

    #[test]
    fn test_checksum_is_stable() {
        let key_id = KeyId::from_bytes([0x33; 16]);
        let a = key_checksum(&test_key(), &key_id);
        let b = key_checksum(&test_key(), &key_id);
        assert_eq!(a, b);
    }
}
