//! # Livepack TS
//!
//! MPEG-2 transport stream output for the livepack packager.
//!
//! This crate turns one segment's demuxed samples into a self-contained TS
//! segment:
//!
//! - **188-byte packets** with sync byte validation
//! - **PAT/PMT** emitted once per segment, continuity counters seeded from
//!   the segment number so segments are addressable out of order
//! - **PES packetization** with PTS/DTS, adaptation-field stuffing and PCR
//!   on keyframe access units
//! - **Elementary stream conversion**: Annex B with AUD and in-band
//!   SPS/PPS for H.264, ADTS framing for AAC
//! - **SAMPLE-AES** application through the encryption engine
//!
//! ```no_run
//! use livepack_ts::{TsMuxerConfig, TsSegmentMuxer};
//! # fn demo(track: &livepack_core::TrackInfo, samples: &[livepack_core::MediaSample])
//! # -> livepack_core::Result<()> {
//! let config = TsMuxerConfig { segment_number: 4, offset_ms: 9000 };
//! let segment = TsSegmentMuxer::new(track, config, false)?.mux(samples, None)?;
//! assert_eq!(segment.len() % 188, 0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod es;
pub mod muxer;
pub mod packet;
pub mod pes;
pub mod psi;

pub use error::{Result, TsError};
pub use muxer::{TsMuxerConfig, TsSegmentMuxer, PID_AUDIO_AAC, PID_AUDIO_AC3, PID_PMT, PID_VIDEO};
pub use packet::{AdaptationField, Pcr, TsHeader, PID_NULL, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE};
pub use pes::{build_pes_header, PesTimestamp};
pub use psi::{calculate_crc32, Pat, Pmt, StreamType};
