//! Timed text in MP4.
//!
//! Packs WebVTT cues as `vttc` samples (ISO/IEC 14496-30) or a TTML
//! document as a single `mett` sample, emitting an init segment plus one
//! fragment whose base decode time the caller controls.

use crate::error::{Result, TextError};
use crate::vtt::{parse_cues, Cue};
use livepack_core::{
    CodecType, FullSegmentBuffer, MediaSample, SegmentBuffer, TrackInfo, TrackType,
};
use livepack_mp4::{write_init_segment, write_media_segment, BoxBuilder};

/// Track id used for generated text tracks.
const TEXT_TRACK_ID: u32 = 1;

/// Text tracks run on a millisecond timescale.
const TEXT_TIMESCALE: u32 = 1000;

/// Package WebVTT cues as an MP4 fragment.
///
/// The fragment's base decode time is `decode_time`; cue times are mapped
/// onto it relative to the first cue's start.
pub fn package_vtt_mp4(
    input: &[u8],
    decode_time: i64,
    sequence_number: u32,
    output: &mut FullSegmentBuffer,
) -> Result<()> {
    let text = std::str::from_utf8(input).map_err(|_| TextError::NotUtf8)?;
    let cues = parse_cues(text)?;
    tracing::debug!("packaging {} WebVTT cues", cues.len());

    let track = text_track(wvtt_entry());
    let samples = cue_samples(&cues, decode_time)?;

    write_text_segment(&track, &samples, sequence_number, output)
}

/// Package a TTML document as a single-sample MP4 fragment.
pub fn package_ttml_mp4(
    input: &[u8],
    decode_time: i64,
    sequence_number: u32,
    output: &mut FullSegmentBuffer,
) -> Result<()> {
    let text = std::str::from_utf8(input).map_err(|_| TextError::NotUtf8)?;
    if !text.contains("<tt") {
        return Err(TextError::InvalidTtml("missing <tt> root element".into()));
    }

    let track = text_track(mett_entry());
    let mut sample = MediaSample::new(
        TEXT_TRACK_ID,
        decode_time,
        decode_time,
        0,
        input.to_vec(),
    );
    sample.is_key = true;

    write_text_segment(&track, &[sample], sequence_number, output)
}

fn write_text_segment(
    track: &TrackInfo,
    samples: &[MediaSample],
    sequence_number: u32,
    output: &mut FullSegmentBuffer,
) -> Result<()> {
    let mut init = SegmentBuffer::new();
    write_init_segment(track, None, &[], &mut init)
        .map_err(|e| TextError::Packaging(e.to_string()))?;
    output.set_init_segment(init.data());

    let mut body = SegmentBuffer::new();
    write_media_segment(track, samples, sequence_number, None, &mut body)
        .map_err(|e| TextError::Packaging(e.to_string()))?;
    output.append_data(body.data());

    Ok(())
}

fn text_track(stsd_entry: Vec<u8>) -> TrackInfo {
    let mut track = TrackInfo::new(TEXT_TRACK_ID, TrackType::Text, TEXT_TIMESCALE);
    track.codec = CodecType::Text;
    track.stsd_entry = stsd_entry;
    track
}

/// WVTTSampleEntry: plain sample entry fields plus a `vttC` configuration
/// box holding the document header.
fn wvtt_entry() -> Vec<u8> {
    let mut builder = BoxBuilder::new();
    builder.open(b"wvtt");
    builder.bytes(&[0u8; 6]);
    builder.u16(1); // data reference index
    builder.open(b"vttC").bytes(b"WEBVTT").close();
    builder.close();
    builder.finish()
}

/// TextMetaDataSampleEntry with the TTML mime type.
fn mett_entry() -> Vec<u8> {
    let mut builder = BoxBuilder::new();
    builder.open(b"mett");
    builder.bytes(&[0u8; 6]);
    builder.u16(1);
    builder.u8(0); // empty content_encoding
    builder.bytes(b"application/ttml+xml\0");
    builder.close();
    builder.finish()
}

/// Map cues onto samples: one `vttc` per cue, timed relative to the first
/// cue and rebased onto the fragment decode time.
fn cue_samples(cues: &[Cue], decode_time: i64) -> Result<Vec<MediaSample>> {
    if cues.is_empty() {
        return Ok(Vec::new());
    }

    let origin = cues[0].start_ms;
    let mut samples = Vec::with_capacity(cues.len());

    for cue in cues {
        let dts = decode_time + (cue.start_ms - origin) as i64;
        let duration = (cue.end_ms - cue.start_ms) as u32;

        let mut sample = MediaSample::new(TEXT_TRACK_ID, dts, dts, duration, vttc_box(cue));
        sample.is_key = true;
        samples.push(sample);
    }

    Ok(samples)
}

/// Serialize one cue as a `vttc` box with `iden`, `sttg` and `payl`
/// children.
fn vttc_box(cue: &Cue) -> Vec<u8> {
    let mut builder = BoxBuilder::new();
    builder.open(b"vttc");
    if let Some(ref identifier) = cue.identifier {
        builder.open(b"iden").bytes(identifier.as_bytes()).close();
    }
    if !cue.settings.is_empty() {
        builder.open(b"sttg").bytes(cue.settings.as_bytes()).close();
    }
    builder.open(b"payl").bytes(cue.payload.as_bytes()).close();
    builder.close();
    builder.finish()
}
