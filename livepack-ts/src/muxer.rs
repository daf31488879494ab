//! Per-segment transport stream muxer.
//!
//! Packetizes one segment's samples into 188-byte TS packets: a PAT and a
//! PMT whose continuity counters are seeded from the segment number, then
//! PES packets on the elementary PID with counters starting at zero. PCR
//! rides the first packet of each keyframe access unit.

use crate::error::{Result as TsResult, TsError};
use crate::es::{avcc_to_annexb, wrap_adts};
use crate::packet::{
    AdaptationField, AdaptationFieldControl, Pcr, TsHeader, TS_PACKET_SIZE,
};
use crate::pes::{build_pes_header, PesTimestamp, STREAM_ID_AUDIO, STREAM_ID_VIDEO};
use crate::psi::{Pat, Pmt, StreamType};
use livepack_core::{CodecType, Error, MediaSample, Result, TrackInfo};
use livepack_drm::SampleEncryptor;

/// PID carrying the PMT.
pub const PID_PMT: u16 = 0x0020;

/// PID carrying video elementary streams.
pub const PID_VIDEO: u16 = 0x0080;

/// PID carrying AAC elementary streams.
pub const PID_AUDIO_AAC: u16 = 0x0081;

/// PID carrying AC-3/E-AC-3 elementary streams.
pub const PID_AUDIO_AC3: u16 = 0x0082;

/// 90 kHz ticks per millisecond.
const TICKS_PER_MS: i64 = 90;

/// Muxer settings for one segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsMuxerConfig {
    /// Seeds the PAT/PMT continuity counters (mod 16).
    pub segment_number: u32,
    /// Milliseconds added to every PTS/DTS before writing.
    pub offset_ms: i32,
}

/// Stateful muxer for a single segment.
pub struct TsSegmentMuxer<'a> {
    track: &'a TrackInfo,
    config: TsMuxerConfig,
    elementary_pid: u16,
    stream_type: u8,
    out: Vec<u8>,
    es_continuity: u8,
}

impl<'a> TsSegmentMuxer<'a> {
    /// Create a muxer for one track and segment.
    pub fn new(
        track: &'a TrackInfo,
        config: TsMuxerConfig,
        sample_aes: bool,
    ) -> TsResult<Self> {
        let (elementary_pid, stream_type) = match (track.codec, sample_aes) {
            (CodecType::H264, false) => (PID_VIDEO, StreamType::H264 as u8),
            (CodecType::H264, true) => (PID_VIDEO, StreamType::EncryptedH264 as u8),
            (CodecType::Aac, false) => (PID_AUDIO_AAC, StreamType::AacAdts as u8),
            (CodecType::Aac, true) => (PID_AUDIO_AAC, StreamType::EncryptedAacAdts as u8),
            (CodecType::Ac3, false) | (CodecType::Eac3, false) => {
                (PID_AUDIO_AC3, StreamType::Ac3 as u8)
            }
            (CodecType::Ac3, true) | (CodecType::Eac3, true) => {
                (PID_AUDIO_AC3, StreamType::EncryptedAc3 as u8)
            }
            (codec, _) => {
                return Err(TsError::UnsupportedCodec(format!("{:?}", codec)));
            }
        };

        Ok(Self {
            track,
            config,
            elementary_pid,
            stream_type,
            out: Vec::new(),
            es_continuity: 0,
        })
    }

    /// Mux a full segment, applying SAMPLE-AES through `encryptor` when
    /// one is supplied.
    pub fn mux(
        mut self,
        samples: &[MediaSample],
        mut encryptor: Option<&mut SampleEncryptor>,
    ) -> Result<Vec<u8>> {
        self.write_pat()?;
        self.write_pmt()?;

        for sample in samples {
            let mut es = self.convert_sample(sample)?;

            if let Some(encryptor) = encryptor.as_deref_mut() {
                if self.track.codec.is_video() {
                    encryptor.encrypt_annexb_access_unit(&mut es)?;
                } else {
                    encryptor.encrypt_adts_frame(&mut es)?;
                }
            }

            self.write_pes(sample, &es)?;
        }

        tracing::debug!(
            "muxed {} samples into {} TS packets",
            samples.len(),
            self.out.len() / TS_PACKET_SIZE
        );
        Ok(self.out)
    }

    fn convert_sample(&self, sample: &MediaSample) -> Result<Vec<u8>> {
        let es = match self.track.codec {
            CodecType::H264 => avcc_to_annexb(self.track, &sample.data, sample.is_key)?,
            CodecType::Aac => wrap_adts(self.track, &sample.data)?,
            // AC-3 frames are self-framing.
            CodecType::Ac3 | CodecType::Eac3 => sample.data.clone(),
            codec => {
                return Err(TsError::UnsupportedCodec(format!("{:?}", codec)).into());
            }
        };
        Ok(es)
    }

    /// Rescale a track timestamp to the 90 kHz clock and apply the
    /// configured offset.
    fn to_90khz(&self, value: i64) -> Result<u64> {
        let rescaled =
            (value as i128 * 90_000 / self.track.timescale as i128) as i64;
        let shifted = rescaled + self.config.offset_ms as i64 * TICKS_PER_MS;
        if shifted < 0 {
            return Err(Error::Mux(format!(
                "timestamp {} still negative after offset; increase the TS offset",
                shifted
            )));
        }
        Ok(shifted as u64)
    }

    fn psi_continuity(&self) -> u8 {
        (self.config.segment_number % 16) as u8
    }

    fn write_pat(&mut self) -> TsResult<()> {
        let section = Pat {
            transport_stream_id: 1,
            program_number: 1,
            pmt_pid: PID_PMT,
        }
        .serialize();
        self.write_psi_packet(crate::packet::PID_PAT, &section)
    }

    fn write_pmt(&mut self) -> TsResult<()> {
        let section = Pmt {
            program_number: 1,
            pcr_pid: self.elementary_pid,
            stream_type: self.stream_type,
            elementary_pid: self.elementary_pid,
        }
        .serialize();
        self.write_psi_packet(PID_PMT, &section)
    }

    /// One PSI section always fits a single packet here; spare bytes are
    /// stuffed with 0xFF after the section, per ISO 13818-1.
    fn write_psi_packet(&mut self, pid: u16, section: &[u8]) -> TsResult<()> {
        let mut packet = [0xFFu8; TS_PACKET_SIZE];

        let mut header = TsHeader::new(pid);
        header.payload_unit_start = true;
        header.continuity_counter = self.psi_continuity();
        header.write(&mut packet[..4])?;

        packet[4] = 0; // pointer field
        packet[5..5 + section.len()].copy_from_slice(section);

        self.out.extend_from_slice(&packet);
        Ok(())
    }

    fn next_es_continuity(&mut self) -> u8 {
        let counter = self.es_continuity;
        self.es_continuity = (self.es_continuity + 1) & 0x0F;
        counter
    }

    fn write_pes(&mut self, sample: &MediaSample, es: &[u8]) -> Result<()> {
        let pts_90k = self.to_90khz(sample.pts)?;
        let dts_90k = self.to_90khz(sample.dts)?;

        let stream_id = if self.track.codec.is_video() {
            STREAM_ID_VIDEO
        } else {
            STREAM_ID_AUDIO
        };
        let header = build_pes_header(
            stream_id,
            PesTimestamp::new(pts_90k),
            Some(PesTimestamp::new(dts_90k)),
            es.len(),
        )?;

        let mut pes = header;
        pes.extend_from_slice(es);

        let mut remaining = pes.as_slice();
        let mut first = true;

        while !remaining.is_empty() {
            let mut packet = [0xFFu8; TS_PACKET_SIZE];

            // Keyframe access units open with PCR and the random access
            // indicator.
            let field = if first && sample.is_key {
                Some(AdaptationField::with_pcr(
                    Pcr::from_27mhz(dts_90k * 300),
                    true,
                ))
            } else {
                None
            };

            let mut field_size = field.as_ref().map(|f| f.total_size).unwrap_or(0);
            let available = TS_PACKET_SIZE - 4 - field_size;
            let payload_len = remaining.len().min(available);

            // Short final payloads stuff through the adaptation field.
            let stuffing = available - payload_len;
            let mut field = field;
            if stuffing > 0 {
                match field.as_mut() {
                    Some(field) => field.pad_to(field.total_size + stuffing),
                    None => field = Some(AdaptationField::stuffing(stuffing)),
                }
                field_size += stuffing;
            }

            let mut header = TsHeader::new(self.elementary_pid);
            header.payload_unit_start = first;
            header.continuity_counter = self.next_es_continuity();
            header.adaptation_field_control = if field.is_some() {
                AdaptationFieldControl::AdaptationFieldAndPayload
            } else {
                AdaptationFieldControl::PayloadOnly
            };
            header.write(&mut packet[..4])?;

            let mut offset = 4;
            if let Some(field) = field {
                offset += field.write(&mut packet[4..])?;
            }
            debug_assert_eq!(offset, 4 + field_size);

            packet[offset..offset + payload_len].copy_from_slice(&remaining[..payload_len]);
            remaining = &remaining[payload_len..];

            if offset + payload_len != TS_PACKET_SIZE {
                return Err(Error::Mux(format!(
                    "packet layout left {} spare bytes",
                    TS_PACKET_SIZE - offset - payload_len
                )));
            }

            self.out.extend_from_slice(&packet);
            first = false;
        }

        Ok(())
    }
}
