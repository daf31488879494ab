//! PES packet header construction.

use crate::error::{Result, TsError};

/// PES start code prefix.
pub const PES_START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// Video stream id used for H.264/H.265 elementary streams.
pub const STREAM_ID_VIDEO: u8 = 0xE0;

/// Audio stream id used for AAC/AC-3 elementary streams.
pub const STREAM_ID_AUDIO: u8 = 0xC0;

/// 33-bit PES timestamp on the 90 kHz clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PesTimestamp {
    /// Timestamp value, wrapped to 33 bits.
    pub value: u64,
}

impl PesTimestamp {
    /// Maximum value of the 33-bit field.
    pub const MAX_VALUE: u64 = (1u64 << 33) - 1;

    /// Create a timestamp, wrapping to 33 bits.
    pub fn new(value: u64) -> Self {
        Self {
            value: value & Self::MAX_VALUE,
        }
    }

    /// Parse a 5-byte marker-bit encoded timestamp.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(TsError::MalformedStream("timestamp requires 5 bytes".into()));
        }
        let value = ((data[0] as u64 & 0x0E) << 29)
            | ((data[1] as u64) << 22)
            | ((data[2] as u64 & 0xFE) << 14)
            | ((data[3] as u64) << 7)
            | ((data[4] as u64) >> 1);
        Ok(Self::new(value))
    }

    /// Write the 5-byte encoding with the given 4-bit prefix
    /// (`0x2` PTS-only, `0x3` PTS with DTS present, `0x1` DTS).
    pub fn write(&self, data: &mut [u8], prefix: u8) -> Result<()> {
        if data.len() < 5 {
            return Err(TsError::PacketAssembly("need 5 bytes for timestamp".into()));
        }
        data[0] = (prefix << 4) | ((((self.value >> 30) as u8) & 0x07) << 1) | 0x01;
        data[1] = ((self.value >> 22) & 0xFF) as u8;
        data[2] = ((((self.value >> 15) & 0x7F) << 1) | 0x01) as u8;
        data[3] = ((self.value >> 7) & 0xFF) as u8;
        data[4] = (((self.value & 0x7F) << 1) | 0x01) as u8;
        Ok(())
    }
}

/// Build a PES header for one access unit.
///
/// DTS is only written when it differs from PTS. A payload too large for
/// the 16-bit length field is marked unbounded (length 0), which is only
/// legal for video stream ids.
pub fn build_pes_header(
    stream_id: u8,
    pts: PesTimestamp,
    dts: Option<PesTimestamp>,
    payload_len: usize,
) -> Result<Vec<u8>> {
    let write_dts = dts.map(|d| d.value != pts.value).unwrap_or(false);
    let header_data_len = if write_dts { 10 } else { 5 };

    let mut header = Vec::with_capacity(9 + header_data_len);
    header.extend_from_slice(&PES_START_CODE_PREFIX);
    header.push(stream_id);

    let pes_packet_len = 3 + header_data_len + payload_len;
    if pes_packet_len > u16::MAX as usize {
        if stream_id != STREAM_ID_VIDEO {
            return Err(TsError::PacketAssembly(
                "audio PES too large for bounded length".into(),
            ));
        }
        header.extend_from_slice(&[0, 0]);
    } else {
        header.extend_from_slice(&(pes_packet_len as u16).to_be_bytes());
    }

    header.push(0x80); // marker bits, no scrambling
    header.push(if write_dts { 0xC0 } else { 0x80 });
    header.push(header_data_len as u8);

    let mut timestamp = [0u8; 5];
    pts.write(&mut timestamp, if write_dts { 0x3 } else { 0x2 })?;
    header.extend_from_slice(&timestamp);

    if write_dts {
        if let Some(dts) = dts {
            dts.write(&mut timestamp, 0x1)?;
            header.extend_from_slice(&timestamp);
        }
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip() {
        let original = PesTimestamp::new(8_589_934_591); // max 33-bit value
        let mut bytes = [0u8; 5];
        original.write(&mut bytes, 0x2).unwrap();

        let parsed = PesTimestamp::parse(&bytes).unwrap();
        assert_eq!(parsed.value, original.value);
    }

    #[test]
    fn test_timestamp_wraps_to_33_bits() {
        let ts = PesTimestamp::new(1u64 << 34);
        assert_eq!(ts.value, 0);
    }

    #[test]
    fn test_header_pts_only() {
        let header =
            build_pes_header(STREAM_ID_VIDEO, PesTimestamp::new(90_000), None, 100).unwrap();
        assert_eq!(&header[..3], &PES_START_CODE_PREFIX);
        assert_eq!(header[3], STREAM_ID_VIDEO);
        assert_eq!(header.len(), 14);
        assert_eq!(header[7], 0x80); // PTS only
        assert_eq!(header[8], 5);
    }

    #[test]
    fn test_header_pts_and_dts() {
        let header = build_pes_header(
            STREAM_ID_VIDEO,
            PesTimestamp::new(93_000),
            Some(PesTimestamp::new(90_000)),
            100,
        )
        .unwrap();
        assert_eq!(header.len(), 19);
        assert_eq!(header[7], 0xC0);
        assert_eq!(header[8], 10);

        let pts = PesTimestamp::parse(&header[9..14]).unwrap();
        let dts = PesTimestamp::parse(&header[14..19]).unwrap();
        assert_eq!(pts.value, 93_000);
        assert_eq!(dts.value, 90_000);
    }

    #[test]
    fn test_equal_pts_dts_collapses() {
        let header = build_pes_header(
            STREAM_ID_AUDIO,
            PesTimestamp::new(90_000),
            Some(PesTimestamp::new(90_000)),
            10,
        )
        .unwrap();
        assert_eq!(header[7], 0x80);
        assert_eq!(header.len(), 14);
    }

    #[test]
    fn test_oversized_video_payload_unbounded() {
        let header =
            build_pes_header(STREAM_ID_VIDEO, PesTimestamp::new(0), None, 100_000).unwrap();
        assert_eq!(&header[4..6], &[0, 0]);
    }

    #[test]
    fn test_oversized_audio_payload_rejected() {
        let result = build_pes_header(STREAM_ID_AUDIO, PesTimestamp::new(0), None, 100_000);
        assert!(result.is_err());
    }
}
