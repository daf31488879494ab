//! fMP4 writing.
//!
//! Emits normalized init segments (`ftyp` + `moov`) and media fragments
//! (`styp` + `sidx` + `moof` + `mdat`). Fragment sequencing, decode times
//! and composition offsets are rewritten from the sample run; encryption
//! boxes (`senc`/`saiz`/`saio` and the init-side `sinf`/`tenc`) are
//! interleaved when protection parameters are supplied.

use crate::boxes::BoxBuilder;
use crate::error::{Mp4Error, Result};
use livepack_core::{MediaSample, SegmentBuffer, TrackInfo, TrackProtection, TrackType};

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

// Sample flag words written into trun.
const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

/// Write a normalized init segment for one track.
///
/// When `protection` is given the sample entry is wrapped into
/// `encv`/`enca` with a `sinf` carrying `frma`, `schm` and `tenc`; any
/// `pssh` boxes are appended at the end of `moov`.
pub fn write_init_segment(
    track: &TrackInfo,
    protection: Option<&TrackProtection>,
    pssh_boxes: &[Vec<u8>],
    out: &mut SegmentBuffer,
) -> Result<()> {
    if track.stsd_entry.len() < 8 {
        return Err(Mp4Error::WriterInvariant(
            "track has no sample description entry".into(),
        ));
    }

    let mut builder = BoxBuilder::new();

    builder.open(b"ftyp");
    builder.bytes(b"mp41");
    builder.u32(0);
    builder.bytes(b"mp41").bytes(b"iso6").bytes(b"cmfc").bytes(b"dash");
    builder.close();

    builder.open(b"moov");
    write_mvhd(&mut builder, track);
    write_trak(&mut builder, track, protection)?;
    write_mvex(&mut builder, track);
    for pssh in pssh_boxes {
        builder.bytes(pssh);
    }
    builder.close();

    out.append(&builder.finish());
    Ok(())
}

fn write_mvhd(builder: &mut BoxBuilder, track: &TrackInfo) {
    builder.open_full(b"mvhd", 0, 0);
    builder.u32(0); // creation time
    builder.u32(0); // modification time
    builder.u32(track.timescale);
    builder.u32(0); // duration unknown for live
    builder.u32(0x0001_0000); // rate 1.0
    builder.u16(0x0100); // volume 1.0
    builder.u16(0);
    builder.u64(0);
    for value in UNITY_MATRIX {
        builder.u32(value);
    }
    builder.bytes(&[0u8; 24]); // pre-defined
    builder.u32(track.track_id + 1);
    builder.close();
}

fn write_trak(
    builder: &mut BoxBuilder,
    track: &TrackInfo,
    protection: Option<&TrackProtection>,
) -> Result<()> {
    builder.open(b"trak");

    builder.open_full(b"tkhd", 0, 3);
    builder.u32(0);
    builder.u32(0);
    builder.u32(track.track_id);
    builder.u32(0);
    builder.u32(0); // duration
    builder.u64(0);
    builder.u16(0); // layer
    builder.u16(0); // alternate group
    builder.u16(if track.track_type == TrackType::Audio { 0x0100 } else { 0 });
    builder.u16(0);
    for value in UNITY_MATRIX {
        builder.u32(value);
    }
    builder.u32((track.width as u32) << 16);
    builder.u32((track.height as u32) << 16);
    builder.close();

    builder.open(b"mdia");

    builder.open_full(b"mdhd", 0, 0);
    builder.u32(0);
    builder.u32(0);
    builder.u32(track.timescale);
    builder.u32(0);
    builder.u16(0x55C4); // "und"
    builder.u16(0);
    builder.close();

    let (handler, name): (&[u8; 4], &[u8]) = match track.track_type {
        TrackType::Video => (b"vide", b"VideoHandler\0"),
        TrackType::Audio => (b"soun", b"SoundHandler\0"),
        TrackType::Text => (b"subt", b"TextHandler\0"),
    };
    builder.open_full(b"hdlr", 0, 0);
    builder.u32(0);
    builder.bytes(handler);
    builder.bytes(&[0u8; 12]);
    builder.bytes(name);
    builder.close();

    builder.open(b"minf");

    match track.track_type {
        TrackType::Video => {
            builder.open_full(b"vmhd", 0, 1);
            builder.u64(0); // graphics mode + opcolor
            builder.close();
        }
        TrackType::Audio => {
            builder.open_full(b"smhd", 0, 0);
            builder.u32(0); // balance
            builder.close();
        }
        TrackType::Text => {
            builder.open_full(b"sthd", 0, 0);
            builder.close();
        }
    }

    builder.open(b"dinf");
    builder.open_full(b"dref", 0, 0);
    builder.u32(1);
    builder.open_full(b"url ", 0, 1).close();
    builder.close();
    builder.close();

    builder.open(b"stbl");
    write_stsd(builder, track, protection)?;
    builder.open_full(b"stts", 0, 0).u32(0).close();
    builder.open_full(b"stsc", 0, 0).u32(0).close();
    builder.open_full(b"stsz", 0, 0).u32(0).u32(0).close();
    builder.open_full(b"stco", 0, 0).u32(0).close();
    builder.close(); // stbl

    builder.close(); // minf
    builder.close(); // mdia
    builder.close(); // trak
    Ok(())
}

fn write_stsd(
    builder: &mut BoxBuilder,
    track: &TrackInfo,
    protection: Option<&TrackProtection>,
) -> Result<()> {
    builder.open_full(b"stsd", 0, 0);
    builder.u32(1);

    match protection {
        None => {
            builder.bytes(&track.stsd_entry);
        }
        Some(protection) => {
            // Re-emit the clear entry as encv/enca with an appended sinf,
            // patching the entry size afterwards.
            let wrapped_fourcc: &[u8; 4] = match track.track_type {
                TrackType::Video => b"encv",
                TrackType::Audio => b"enca",
                TrackType::Text => {
                    return Err(Mp4Error::WriterInvariant(
                        "text tracks cannot carry sample encryption".into(),
                    ))
                }
            };

            let entry_start = builder.len();
            builder.bytes(&track.stsd_entry);
            write_sinf(builder, &track.stsd_entry[4..8], protection);
            let entry_size = (builder.len() - entry_start) as u32;

            let patched = builder.patch(entry_start);
            patched[0..4].copy_from_slice(&entry_size.to_be_bytes());
            patched[4..8].copy_from_slice(wrapped_fourcc);
        }
    }

    builder.close();
    Ok(())
}

fn write_sinf(builder: &mut BoxBuilder, original_format: &[u8], protection: &TrackProtection) {
    builder.open(b"sinf");

    builder.open(b"frma").bytes(original_format).close();

    builder.open_full(b"schm", 0, 0);
    builder.bytes(&protection.scheme);
    builder.u32(0x0001_0000);
    builder.close();

    builder.open(b"schi");
    builder.open_full(b"tenc", if protection.uses_pattern() { 1 } else { 0 }, 0);
    builder.u8(0); // reserved
    builder.u8(protection.crypt_byte_block << 4 | (protection.skip_byte_block & 0x0F));
    builder.u8(1); // default_isProtected
    builder.u8(protection.per_sample_iv_size);
    builder.bytes(&protection.default_kid);
    if protection.per_sample_iv_size == 0 {
        let constant_iv = protection.constant_iv.as_deref().unwrap_or(&[]);
        builder.u8(constant_iv.len() as u8);
        builder.bytes(constant_iv);
    }
    builder.close(); // tenc
    builder.close(); // schi

    builder.close(); // sinf
}

fn write_mvex(builder: &mut BoxBuilder, track: &TrackInfo) {
    builder.open(b"mvex");
    builder.open_full(b"trex", 0, 0);
    builder.u32(track.track_id);
    builder.u32(1);
    builder.u32(track.default_sample_duration);
    builder.u32(track.default_sample_size);
    builder.u32(track.default_sample_flags);
    builder.close();
    builder.close();
}

/// Write one media fragment.
///
/// Layout is `styp`, `sidx`, `moof` (with `senc`/`saiz`/`saio` when
/// encrypted) and `mdat`. An empty sample run writes nothing and returns
/// success.
pub fn write_media_segment(
    track: &TrackInfo,
    samples: &[MediaSample],
    sequence_number: u32,
    protection: Option<&TrackProtection>,
    out: &mut SegmentBuffer,
) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let mdat_payload_size: usize = samples.iter().map(|s| s.data.len()).sum();
    let total_duration: u64 = samples.iter().map(|s| s.duration as u64).sum();

    let moof = build_moof(track, samples, sequence_number, protection)?;
    let referenced_size = moof.len() + 8 + mdat_payload_size;

    let mut builder = BoxBuilder::new();

    builder.open(b"styp");
    builder.bytes(b"mp41");
    builder.u32(0);
    builder.bytes(b"mp41").bytes(b"iso6");
    builder.close();

    // One reference covering the whole fragment.
    builder.open_full(b"sidx", 1, 0);
    builder.u32(track.track_id);
    builder.u32(track.timescale);
    builder.u64(samples[0].pts.max(0) as u64);
    builder.u64(0); // first offset
    builder.u16(0);
    builder.u16(1); // reference count
    builder.u32(referenced_size as u32); // reference type 0 + size
    builder.u32(total_duration as u32);
    builder.u32(0x9000_0000); // starts with SAP, type 1
    builder.close();

    builder.bytes(&moof);

    builder.open(b"mdat");
    for sample in samples {
        builder.bytes(&sample.data);
    }
    builder.close();

    out.append(&builder.finish());
    Ok(())
}

/// Assemble the `moof` box, patching the `trun` data offset and the `saio`
/// position once the final layout is known.
fn build_moof(
    track: &TrackInfo,
    samples: &[MediaSample],
    sequence_number: u32,
    protection: Option<&TrackProtection>,
) -> Result<Vec<u8>> {
    let mut builder = BoxBuilder::new();

    builder.open(b"moof");

    builder.open_full(b"mfhd", 0, 0);
    builder.u32(sequence_number);
    builder.close();

    builder.open(b"traf");

    // default-base-is-moof, explicit sample description index.
    builder.open_full(b"tfhd", 0, 0x020002);
    builder.u32(track.track_id);
    builder.u32(1);
    builder.close();

    builder.open_full(b"tfdt", 1, 0);
    builder.u64(samples[0].dts.max(0) as u64);
    builder.close();

    let trun_start = builder.len();
    write_trun(&mut builder, samples);

    let mut saio_offset_patch = None;
    if let Some(protection) = protection {
        let senc_payload_offset = write_senc(&mut builder, samples, protection)?;
        write_saiz(&mut builder, samples, protection);
        saio_offset_patch = Some((write_saio(&mut builder), senc_payload_offset));
    }

    builder.close(); // traf
    builder.close(); // moof

    let mut moof = builder.finish();
    let moof_len = moof.len();

    // trun data offset: first mdat payload byte, relative to moof start.
    let data_offset = (moof_len + 8) as i32;
    let offset_pos = trun_start + 16;
    moof[offset_pos..offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());

    // saio points at the first senc entry, relative to moof start.
    if let Some((saio_value_pos, senc_payload_offset)) = saio_offset_patch {
        moof[saio_value_pos..saio_value_pos + 8]
            .copy_from_slice(&(senc_payload_offset as u64).to_be_bytes());
    }

    Ok(moof)
}

fn write_trun(builder: &mut BoxBuilder, samples: &[MediaSample]) {
    // data offset + per-sample duration, size, flags and signed cts.
    builder.open_full(b"trun", 1, 0x000F01);
    builder.u32(samples.len() as u32);
    builder.i32(0); // patched later
    for sample in samples {
        builder.u32(sample.duration);
        builder.u32(sample.data.len() as u32);
        builder.u32(if sample.is_key {
            SAMPLE_FLAGS_SYNC
        } else {
            SAMPLE_FLAGS_NON_SYNC
        });
        let cts = sample.pts - sample.dts;
        builder.i32(cts as i32);
    }
    builder.close();
}

/// Write `senc`, returning the offset of its first sample entry relative to
/// the start of the `moof` being built.
fn write_senc(
    builder: &mut BoxBuilder,
    samples: &[MediaSample],
    protection: &TrackProtection,
) -> Result<usize> {
    let has_subsamples = samples.iter().any(|s| !s.subsamples.is_empty());
    let iv_size = protection.per_sample_iv_size as usize;

    builder.open_full(b"senc", 0, if has_subsamples { 0x2 } else { 0 });
    builder.u32(samples.len() as u32);
    let payload_offset = builder.len();

    for sample in samples {
        if iv_size > 0 {
            let iv = sample.iv.as_deref().ok_or_else(|| {
                Mp4Error::WriterInvariant("encrypted sample missing its IV".into())
            })?;
            if iv.len() != iv_size {
                return Err(Mp4Error::WriterInvariant(format!(
                    "sample IV is {} bytes, tenc declares {}",
                    iv.len(),
                    iv_size
                )));
            }
            builder.bytes(iv);
        }

        if has_subsamples {
            builder.u16(sample.subsamples.len() as u16);
            for subsample in &sample.subsamples {
                builder.u16(subsample.clear_bytes);
                builder.u32(subsample.protected_bytes);
            }
        }
    }

    builder.close();
    Ok(payload_offset)
}

fn write_saiz(builder: &mut BoxBuilder, samples: &[MediaSample], protection: &TrackProtection) {
    let iv_size = protection.per_sample_iv_size as usize;
    let has_subsamples = samples.iter().any(|s| !s.subsamples.is_empty());

    let info_size = |sample: &MediaSample| -> u8 {
        let mut size = iv_size;
        if has_subsamples {
            size += 2 + 6 * sample.subsamples.len();
        }
        size as u8
    };

    let first = info_size(&samples[0]);
    let uniform = samples.iter().all(|s| info_size(s) == first);

    builder.open_full(b"saiz", 0, 0);
    if uniform {
        builder.u8(first);
        builder.u32(samples.len() as u32);
    } else {
        builder.u8(0);
        builder.u32(samples.len() as u32);
        for sample in samples {
            builder.u8(info_size(sample));
        }
    }
    builder.close();
}

/// Write `saio` with a placeholder offset, returning the position of the
/// 8-byte offset value for later patching.
fn write_saio(builder: &mut BoxBuilder) -> usize {
    builder.open_full(b"saio", 1, 0);
    builder.u32(1);
    let value_pos = builder.len();
    builder.u64(0);
    builder.close();
    value_pos
}
