//! # Livepack
//!
//! A stateless, per-segment live media packager. Each call takes a
//! fragmented-MP4 init segment plus one media segment and re-emits the
//! content as a CMAF fragment, an MPEG-2 transport stream segment, or a
//! timed-text container, applying content encryption on the way when
//! configured.
//!
//! # Example
//!
//! ```no_run
//! use livepack::{FullSegmentBuffer, LiveConfig, LivePackager, OutputFormat, TrackType};
//!
//! # fn load(_: &str) -> Vec<u8> { Vec::new() }
//! let config = LiveConfig {
//!     format: OutputFormat::Fmp4,
//!     track_type: TrackType::Video,
//!     segment_number: 7,
//!     ..Default::default()
//! };
//! let packager = LivePackager::new(config)?;
//!
//! let init = load("init.mp4");
//! let media = load("0007.m4s");
//!
//! let mut output = FullSegmentBuffer::new();
//! packager.package(&init, &media, &mut output)?;
//!
//! // The output holds a normalized init segment and the rewritten fragment.
//! assert!(output.init_segment_size() > 0);
//! assert!(output.segment_size() > 0);
//! # Ok::<(), livepack::Error>(())
//! ```
//!
//! # Encryption
//!
//! Five schemes are supported: none, whole-segment AES-128 (TS only),
//! HLS SAMPLE-AES, and common encryption in its `cenc` and `cbcs`
//! flavours (fMP4 only). Key material comes from the [`LiveConfig`];
//! Widevine, PlayReady and common-system PSSH boxes are embedded into
//! fMP4 init output on request.
//!
//! # Concurrency
//!
//! A packager holds no mutable state between calls. Distinct instances may
//! run on distinct threads; a single instance is not re-entrant.

mod packager;

pub use livepack_core::{
    config::protection_systems, logging, CodecType, Error, FullSegmentBuffer, LiveConfig,
    LogRecord, MediaSample, OutputFormat, ProtectionScheme, Result, SegmentBuffer, Severity,
    SubsampleEntry, TrackInfo, TrackType,
};
pub use livepack_drm::pssh::{generate_pssh_data, PsshData, PsshGeneratorInput};
pub use packager::LivePackager;
