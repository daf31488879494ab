//! Elementary stream conversion.
//!
//! fMP4 carries H.264 as length-prefixed NAL units and AAC as raw frames;
//! TS needs Annex B start codes (with access unit delimiters and in-band
//! parameter sets) and ADTS framing.

use crate::error::{Result, TsError};
use livepack_core::TrackInfo;

/// Annex B start code.
const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Access unit delimiter NAL unit (type 9, primary_pic_type any).
const AUD_NAL: [u8; 2] = [0x09, 0xF0];

/// ADTS header size without CRC.
pub const ADTS_HEADER_SIZE: usize = 7;

/// Convert one length-prefixed sample into an Annex B access unit.
///
/// An AUD opens the access unit; SPS and PPS are prepended to keyframes so
/// every segment is independently decodable.
pub fn avcc_to_annexb(track: &TrackInfo, data: &[u8], is_key: bool) -> Result<Vec<u8>> {
    let nal_length_size = track.nal_length_size as usize;
    if nal_length_size == 0 || nal_length_size > 4 {
        return Err(TsError::MalformedStream(format!(
            "NAL length prefix of {} bytes",
            nal_length_size
        )));
    }

    let mut out = Vec::with_capacity(data.len() + 64);
    out.extend_from_slice(&START_CODE);
    out.extend_from_slice(&AUD_NAL);

    if is_key {
        for sps in &track.sps {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(sps);
        }
        for pps in &track.pps {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(pps);
        }
    }

    let mut offset = 0usize;
    while offset < data.len() {
        if offset + nal_length_size > data.len() {
            return Err(TsError::MalformedStream(
                "truncated NAL length prefix".into(),
            ));
        }
        let mut nal_size = 0usize;
        for &byte in &data[offset..offset + nal_length_size] {
            nal_size = (nal_size << 8) | byte as usize;
        }
        offset += nal_length_size;
        if offset + nal_size > data.len() {
            return Err(TsError::MalformedStream(format!(
                "NAL unit of {} bytes exceeds sample end",
                nal_size
            )));
        }

        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(&data[offset..offset + nal_size]);
        offset += nal_size;
    }

    Ok(out)
}

/// Wrap one AAC frame in an ADTS header derived from the
/// AudioSpecificConfig.
pub fn wrap_adts(track: &TrackInfo, data: &[u8]) -> Result<Vec<u8>> {
    let asc = &track.audio_specific_config;
    if asc.len() < 2 {
        return Err(TsError::MalformedStream(
            "missing AudioSpecificConfig for ADTS".into(),
        ));
    }

    let object_type = asc[0] >> 3;
    if object_type == 0 || object_type > 4 {
        return Err(TsError::MalformedStream(format!(
            "AAC object type {} has no ADTS profile",
            object_type
        )));
    }
    let frequency_index = ((asc[0] & 0x07) << 1) | (asc[1] >> 7);
    let channel_config = (asc[1] >> 3) & 0x0F;

    let frame_length = data.len() + ADTS_HEADER_SIZE;
    if frame_length > 0x1FFF {
        return Err(TsError::MalformedStream(
            "AAC frame too large for ADTS length field".into(),
        ));
    }

    let mut out = Vec::with_capacity(frame_length);
    out.push(0xFF);
    out.push(0xF1); // MPEG-4, layer 0, no CRC
    out.push(((object_type - 1) << 6) | (frequency_index << 2) | (channel_config >> 2));
    out.push(((channel_config & 0x03) << 6) | ((frame_length >> 11) as u8 & 0x03));
    out.push((frame_length >> 3) as u8);
    out.push(((frame_length as u8 & 0x07) << 5) | 0x1F);
    out.push(0xFC);
    out.extend_from_slice(data);

    Ok(out)
}
