//! PSSH box generation.
//!
//! Produces the protection-system headers embedded into fMP4 init segments:
//! the common (CENC) box carrying the key id list, the Widevine box, and
//! the PlayReady box together with its inner PRO object. All outputs are
//! byte-deterministic for a given input.

use crate::error::{DrmError, Result};
use crate::key::{system_ids, ContentKey, KeyId};
use crate::playready::{generate_pro, PlayReadyAlgorithm};
use crate::widevine::WidevineData;
use uuid::Uuid;

/// MP4 protection scheme fourcc values accepted by the generator.
pub mod scheme_fourcc {
    /// AES-CTR, no pattern.
    pub const CENC: u32 = u32::from_be_bytes(*b"cenc");
    /// AES-CBC, no pattern.
    pub const CBC1: u32 = u32::from_be_bytes(*b"cbc1");
    /// AES-CTR with pattern.
    pub const CENS: u32 = u32::from_be_bytes(*b"cens");
    /// AES-CBC with pattern.
    pub const CBCS: u32 = u32::from_be_bytes(*b"cbcs");
}

/// Input to the PSSH generator.
#[derive(Clone, Debug, Default)]
pub struct PsshGeneratorInput {
    /// Protection scheme fourcc (see [`scheme_fourcc`]).
    pub protection_scheme: u32,
    /// Content key for the current crypto period.
    pub key: Vec<u8>,
    /// Key id for the current crypto period.
    pub key_id: Vec<u8>,
    /// Every key id the asset uses.
    pub key_ids: Vec<Vec<u8>>,
}

/// Generated protection-system headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PsshData {
    /// Common system `pssh` box (version 1, key ids only).
    pub cenc_box: Vec<u8>,
    /// PlayReady `pssh` box.
    pub mspr_box: Vec<u8>,
    /// Inner PlayReady PRO object.
    pub mspr_pro: Vec<u8>,
    /// Widevine `pssh` box.
    pub wv_box: Vec<u8>,
}

/// Serialize a `pssh` box.
///
/// Version 1 boxes carry the key id list in the header; version 0 boxes
/// carry only system data.
pub fn serialize_pssh_box(
    version: u8,
    system_id: &Uuid,
    key_ids: &[KeyId],
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(version);
    body.extend_from_slice(&[0, 0, 0]); // flags
    body.extend_from_slice(system_id.as_bytes());

    if version >= 1 {
        body.extend_from_slice(&(key_ids.len() as u32).to_be_bytes());
        for key_id in key_ids {
            body.extend_from_slice(key_id.as_bytes());
        }
    }

    body.extend_from_slice(&(data.len() as u32).to_be_bytes());
    body.extend_from_slice(data);

    let mut boxed = Vec::with_capacity(8 + body.len());
    boxed.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
    boxed.extend_from_slice(b"pssh");
    boxed.extend_from_slice(&body);
    boxed
}

fn validate(input: &PsshGeneratorInput) -> Result<[u8; 4]> {
    let scheme = match input.protection_scheme {
        s if s == scheme_fourcc::CENC
            || s == scheme_fourcc::CBC1
            || s == scheme_fourcc::CENS
            || s == scheme_fourcc::CBCS =>
        {
            s.to_be_bytes()
        }
        _ => {
            return Err(DrmError::InvalidPsshInput(
                "invalid encryption scheme in PSSH generator input".into(),
            ))
        }
    };

    if input.key.len() != 16 {
        return Err(DrmError::InvalidPsshInput(
            "invalid key length in PSSH generator input".into(),
        ));
    }
    if input.key_id.len() != 16 {
        return Err(DrmError::InvalidPsshInput(
            "invalid key id length in PSSH generator input".into(),
        ));
    }
    if input.key_ids.is_empty() {
        return Err(DrmError::InvalidPsshInput(
            "key ids cannot be empty in PSSH generator input".into(),
        ));
    }
    for (index, key_id) in input.key_ids.iter().enumerate() {
        if key_id.len() != 16 {
            return Err(DrmError::InvalidPsshInput(format!(
                "invalid key id length in key ids array in PSSH generator input, index {}",
                index
            )));
        }
    }

    Ok(scheme)
}

/// Generate the common, Widevine and PlayReady headers for a key set.
pub fn generate_pssh_data(input: &PsshGeneratorInput) -> Result<PsshData> {
    let scheme = validate(input)?;

    let key = ContentKey::from_slice(&input.key)?;
    let key_id = KeyId::from_slice(&input.key_id)?;
    let key_ids = input
        .key_ids
        .iter()
        .map(|kid| KeyId::from_slice(kid))
        .collect::<Result<Vec<_>>>()?;

    let cenc_box = serialize_pssh_box(1, &system_ids::COMMON, &key_ids, &[]);

    let wv_data = WidevineData::new(key_ids, scheme).encode();
    let wv_box = serialize_pssh_box(0, &system_ids::WIDEVINE, &[], &wv_data);

    let algorithm = PlayReadyAlgorithm::for_scheme(scheme);
    let mspr_pro = generate_pro(&key, &key_id, algorithm)?;
    let mspr_box = serialize_pssh_box(0, &system_ids::PLAYREADY, &[], &mspr_pro);

    Ok(PsshData {
        cenc_box,
        mspr_box,
        mspr_pro,
        wv_box,
    })
}
