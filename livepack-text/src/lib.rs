//! # Livepack Text
//!
//! Timed-text packaging for the livepack packager: WebVTT cue parsing and
//! the VTT-in-MP4 / TTML-in-MP4 wrappers of ISO/IEC 14496-30. Raw TTML
//! output is a pass-through handled by the facade.

pub mod error;
pub mod mp4text;
pub mod vtt;

pub use error::{Result, TextError};
pub use mp4text::{package_ttml_mp4, package_vtt_mp4};
pub use vtt::{parse_cues, Cue};
