//! # Livepack Core
//!
//! Core types for the livepack live media packager.
//!
//! This crate provides the building blocks shared by every packager
//! component:
//! - Error handling types covering the packaging error taxonomy
//! - The immutable [`LiveConfig`] describing one packaging pipeline
//! - Append-only segment output buffers
//! - The elementary sample and track model produced by the demuxer
//! - An opt-in buffered log sink for host applications

pub mod buffer;
pub mod config;
pub mod error;
pub mod logging;
pub mod sample;

pub use buffer::{FullSegmentBuffer, SegmentBuffer};
pub use config::{LiveConfig, OutputFormat, ProtectionScheme, TrackType};
pub use error::{Error, Result};
pub use logging::{LogRecord, Severity};
pub use sample::{CodecType, MediaSample, SubsampleEntry, TrackInfo, TrackProtection};
