//! fMP4 demuxing.
//!
//! Turns an init segment (`ftyp` + `moov`) and a media segment
//! (`styp?` + `sidx?` + `moof` + `mdat`) into a [`TrackInfo`] and a run of
//! [`MediaSample`]s with fully resolved timing and payload bytes.

use crate::boxes::{find_box, fourcc_to_string, iter_boxes, Mp4Box};
use crate::error::{Mp4Error, Result};
use byteorder::{BigEndian, ByteOrder};
use livepack_core::{
    CodecType, MediaSample, SubsampleEntry, TrackInfo, TrackProtection, TrackType,
};

// tfhd flag bits.
const TFHD_BASE_DATA_OFFSET: u32 = 0x000001;
const TFHD_SAMPLE_DESC_INDEX: u32 = 0x000002;
const TFHD_DEFAULT_DURATION: u32 = 0x000008;
const TFHD_DEFAULT_SIZE: u32 = 0x000010;
const TFHD_DEFAULT_FLAGS: u32 = 0x000020;

// trun flag bits.
const TRUN_DATA_OFFSET: u32 = 0x000001;
const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
const TRUN_SAMPLE_DURATION: u32 = 0x000100;
const TRUN_SAMPLE_SIZE: u32 = 0x000200;
const TRUN_SAMPLE_FLAGS: u32 = 0x000400;
const TRUN_SAMPLE_CTS: u32 = 0x000800;

const SAMPLE_FLAG_NON_SYNC: u32 = 0x0001_0000;

/// Fixed byte counts ahead of the child boxes in sample entries, including
/// the entry's own header.
const VISUAL_ENTRY_CHILD_OFFSET: usize = 86;
const AUDIO_ENTRY_CHILD_OFFSET: usize = 36;

/// Parse an init segment into the description of the wanted track.
///
/// When `wanted` is given, only a track of that type matches; otherwise the
/// first track in `moov` wins.
pub fn parse_init_segment(data: &[u8], wanted: Option<TrackType>) -> Result<TrackInfo> {
    let moov = find_box(data, b"moov")?.ok_or(Mp4Error::MissingBox("moov".into()))?;

    for trak in moov.children() {
        let trak = trak?;
        if &trak.box_type != b"trak" {
            continue;
        }

        let mut track = parse_trak(&trak)?;
        if let Some(wanted) = wanted {
            if track.track_type != wanted {
                continue;
            }
        }

        // trex defaults live under moov.mvex.
        if let Some(mvex) = moov.find_child(b"mvex")? {
            for trex in mvex.children() {
                let trex = trex?;
                if &trex.box_type != b"trex" {
                    continue;
                }
                let (_, _, payload) = trex.full_box()?;
                if payload.len() < 20 {
                    return Err(Mp4Error::malformed(b"trex", "short payload"));
                }
                if BigEndian::read_u32(&payload[0..4]) == track.track_id {
                    track.default_sample_duration = BigEndian::read_u32(&payload[8..12]);
                    track.default_sample_size = BigEndian::read_u32(&payload[12..16]);
                    track.default_sample_flags = BigEndian::read_u32(&payload[16..20]);
                }
            }
        }

        return Ok(track);
    }

    Err(Mp4Error::MissingBox("trak".into()))
}

fn parse_trak(trak: &Mp4Box<'_>) -> Result<TrackInfo> {
    let tkhd = trak.child(b"tkhd")?;
    let (tkhd_version, _, tkhd_payload) = tkhd.full_box()?;
    let track_id_offset = if tkhd_version == 1 { 16 } else { 8 };
    if tkhd_payload.len() < track_id_offset + 4 {
        return Err(Mp4Error::malformed(b"tkhd", "short payload"));
    }
    let track_id = BigEndian::read_u32(&tkhd_payload[track_id_offset..track_id_offset + 4]);

    let mdia = trak.child(b"mdia")?;
    let mdhd = mdia.child(b"mdhd")?;
    let (mdhd_version, _, mdhd_payload) = mdhd.full_box()?;
    let timescale_offset = if mdhd_version == 1 { 16 } else { 8 };
    if mdhd_payload.len() < timescale_offset + 4 {
        return Err(Mp4Error::malformed(b"mdhd", "short payload"));
    }
    let timescale = BigEndian::read_u32(&mdhd_payload[timescale_offset..timescale_offset + 4]);

    let hdlr = mdia.child(b"hdlr")?;
    let (_, _, hdlr_payload) = hdlr.full_box()?;
    if hdlr_payload.len() < 8 {
        return Err(Mp4Error::malformed(b"hdlr", "short payload"));
    }
    let handler = [
        hdlr_payload[4],
        hdlr_payload[5],
        hdlr_payload[6],
        hdlr_payload[7],
    ];
    let track_type = match &handler {
        b"vide" => TrackType::Video,
        b"soun" => TrackType::Audio,
        b"subt" | b"text" | b"sbtl" => TrackType::Text,
        _ => TrackType::Video,
    };

    let mut track = TrackInfo::new(track_id, track_type, timescale);

    let stbl = mdia.child(b"minf")?.child(b"stbl")?;
    let stsd = stbl.child(b"stsd")?;
    parse_stsd(&stsd, &mut track)?;

    Ok(track)
}

fn parse_stsd(stsd: &Mp4Box<'_>, track: &mut TrackInfo) -> Result<()> {
    let (_, _, payload) = stsd.full_box()?;
    if payload.len() < 4 {
        return Err(Mp4Error::malformed(b"stsd", "short payload"));
    }
    let entry_count = BigEndian::read_u32(&payload[0..4]);
    if entry_count == 0 || payload.len() < 12 {
        return Err(Mp4Error::malformed(b"stsd", "no sample entries"));
    }

    // Only the first entry matters per track in this pipeline.
    let entry_size = BigEndian::read_u32(&payload[4..8]) as usize;
    if entry_size < 16 || entry_size > payload.len() - 4 {
        return Err(Mp4Error::malformed(b"stsd", "entry size out of range"));
    }
    let entry = &payload[4..4 + entry_size];
    let mut fourcc = [entry[4], entry[5], entry[6], entry[7]];

    let encrypted = matches!(&fourcc, b"encv" | b"enca");
    let is_visual = matches!(&fourcc, b"encv" | b"avc1" | b"avc3" | b"hev1" | b"hvc1");
    let child_offset = if is_visual {
        VISUAL_ENTRY_CHILD_OFFSET
    } else {
        AUDIO_ENTRY_CHILD_OFFSET
    };

    if encrypted {
        let (original_format, protection, sinf_range) = parse_sinf(entry, child_offset)?;
        fourcc = original_format;
        track.input_protection = Some(protection);
        track.is_encrypted = true;

        // Reconstruct the clear entry: drop the sinf box and restore the
        // original format fourcc.
        let mut clear = Vec::with_capacity(entry.len() - (sinf_range.1 - sinf_range.0));
        clear.extend_from_slice(&entry[..sinf_range.0]);
        clear.extend_from_slice(&entry[sinf_range.1..]);
        clear[4..8].copy_from_slice(&fourcc);
        let size = clear.len() as u32;
        clear[0..4].copy_from_slice(&size.to_be_bytes());
        track.stsd_entry = clear;
    } else {
        track.stsd_entry = entry.to_vec();
    }

    track.codec = CodecType::from_fourcc(&fourcc);

    if is_visual {
        if entry.len() < 36 {
            return Err(Mp4Error::malformed(b"stsd", "visual entry too short"));
        }
        track.width = BigEndian::read_u16(&entry[32..34]);
        track.height = BigEndian::read_u16(&entry[34..36]);
        parse_visual_children(&track.stsd_entry.clone(), track)?;
    } else if CodecType::from_fourcc(&fourcc).is_audio() {
        if entry.len() < 36 {
            return Err(Mp4Error::malformed(b"stsd", "audio entry too short"));
        }
        track.channel_count = BigEndian::read_u16(&entry[24..26]);
        track.sample_rate = BigEndian::read_u32(&entry[32..36]) >> 16;
        parse_audio_children(&track.stsd_entry.clone(), track)?;
    }

    Ok(())
}

/// Parse `sinf` out of an encrypted entry, returning the original format,
/// the recovered protection parameters, and the sinf byte range within the
/// entry.
fn parse_sinf(
    entry: &[u8],
    child_offset: usize,
) -> Result<([u8; 4], TrackProtection, (usize, usize))> {
    if entry.len() < child_offset {
        return Err(Mp4Error::malformed(b"sinf", "encrypted entry too short"));
    }

    for child in iter_boxes(&entry[child_offset..]) {
        let child = child?;
        if &child.box_type != b"sinf" {
            continue;
        }

        let frma = child.child(b"frma")?;
        if frma.payload.len() < 4 {
            return Err(Mp4Error::malformed(b"frma", "short payload"));
        }
        let original_format = [
            frma.payload[0],
            frma.payload[1],
            frma.payload[2],
            frma.payload[3],
        ];

        let schm = child.child(b"schm")?;
        let (_, _, schm_payload) = schm.full_box()?;
        if schm_payload.len() < 4 {
            return Err(Mp4Error::malformed(b"schm", "short payload"));
        }
        let scheme = [
            schm_payload[0],
            schm_payload[1],
            schm_payload[2],
            schm_payload[3],
        ];

        let tenc = child.child(b"schi")?.child(b"tenc")?;
        let (tenc_version, _, tenc_payload) = tenc.full_box()?;
        if tenc_payload.len() < 20 {
            return Err(Mp4Error::malformed(b"tenc", "short payload"));
        }

        let (crypt, skip) = if tenc_version >= 1 {
            (tenc_payload[1] >> 4, tenc_payload[1] & 0x0F)
        } else {
            (0, 0)
        };
        let per_sample_iv_size = tenc_payload[3];
        let mut default_kid = [0u8; 16];
        default_kid.copy_from_slice(&tenc_payload[4..20]);

        let constant_iv = if per_sample_iv_size == 0 {
            if tenc_payload.len() < 21 {
                return Err(Mp4Error::malformed(b"tenc", "missing constant IV"));
            }
            let iv_size = tenc_payload[20] as usize;
            if tenc_payload.len() < 21 + iv_size {
                return Err(Mp4Error::malformed(b"tenc", "short constant IV"));
            }
            Some(tenc_payload[21..21 + iv_size].to_vec())
        } else {
            None
        };

        let start = child_offset + child.offset;
        let range = (start, start + child.size());
        let protection = TrackProtection {
            scheme,
            default_kid,
            per_sample_iv_size,
            constant_iv,
            crypt_byte_block: crypt,
            skip_byte_block: skip,
        };

        return Ok((original_format, protection, range));
    }

    Err(Mp4Error::MissingBox("sinf".into()))
}

fn parse_visual_children(entry: &[u8], track: &mut TrackInfo) -> Result<()> {
    if entry.len() <= VISUAL_ENTRY_CHILD_OFFSET {
        return Ok(());
    }
    for child in iter_boxes(&entry[VISUAL_ENTRY_CHILD_OFFSET..]) {
        let child = child?;
        if &child.box_type == b"avcC" {
            parse_avcc(child.payload, track)?;
        }
    }
    Ok(())
}

fn parse_avcc(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    if data.len() < 7 {
        return Err(Mp4Error::malformed(b"avcC", "short payload"));
    }

    track.nal_length_size = (data[4] & 0x03) + 1;

    let sps_count = (data[5] & 0x1F) as usize;
    let mut offset = 6;
    for _ in 0..sps_count {
        if offset + 2 > data.len() {
            return Err(Mp4Error::malformed(b"avcC", "truncated SPS"));
        }
        let len = BigEndian::read_u16(&data[offset..offset + 2]) as usize;
        offset += 2;
        if offset + len > data.len() {
            return Err(Mp4Error::malformed(b"avcC", "truncated SPS"));
        }
        track.sps.push(data[offset..offset + len].to_vec());
        offset += len;
    }

    if offset >= data.len() {
        return Err(Mp4Error::malformed(b"avcC", "missing PPS count"));
    }
    let pps_count = data[offset] as usize;
    offset += 1;
    for _ in 0..pps_count {
        if offset + 2 > data.len() {
            return Err(Mp4Error::malformed(b"avcC", "truncated PPS"));
        }
        let len = BigEndian::read_u16(&data[offset..offset + 2]) as usize;
        offset += 2;
        if offset + len > data.len() {
            return Err(Mp4Error::malformed(b"avcC", "truncated PPS"));
        }
        track.pps.push(data[offset..offset + len].to_vec());
        offset += len;
    }

    Ok(())
}

fn parse_audio_children(entry: &[u8], track: &mut TrackInfo) -> Result<()> {
    if entry.len() <= AUDIO_ENTRY_CHILD_OFFSET {
        return Ok(());
    }
    for child in iter_boxes(&entry[AUDIO_ENTRY_CHILD_OFFSET..]) {
        let child = child?;
        if &child.box_type == b"esds" {
            let (_, _, payload) = child.full_box()?;
            track.audio_specific_config = parse_esds(payload)?;
        }
    }
    Ok(())
}

/// Walk the MPEG-4 descriptor chain in `esds` down to the
/// DecoderSpecificInfo, which holds the AudioSpecificConfig.
fn parse_esds(data: &[u8]) -> Result<Vec<u8>> {
    fn read_descriptor(data: &[u8]) -> Result<(u8, usize, usize)> {
        if data.is_empty() {
            return Err(Mp4Error::malformed(b"esds", "empty descriptor"));
        }
        let tag = data[0];
        let mut size = 0usize;
        let mut offset = 1;
        loop {
            if offset >= data.len() {
                return Err(Mp4Error::malformed(b"esds", "truncated descriptor size"));
            }
            let byte = data[offset];
            offset += 1;
            size = (size << 7) | (byte & 0x7F) as usize;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok((tag, size, offset))
    }

    // ES_Descriptor.
    let (tag, _, header) = read_descriptor(data)?;
    if tag != 0x03 {
        return Err(Mp4Error::malformed(b"esds", "missing ES descriptor"));
    }
    let mut offset = header + 2; // ES_ID
    if offset >= data.len() {
        return Err(Mp4Error::malformed(b"esds", "truncated ES descriptor"));
    }
    let stream_flags = data[offset];
    offset += 1;
    if stream_flags & 0x80 != 0 {
        offset += 2; // dependsOn_ES_ID
    }
    if stream_flags & 0x40 != 0 {
        // URL string.
        if offset >= data.len() {
            return Err(Mp4Error::malformed(b"esds", "truncated URL descriptor"));
        }
        offset += 1 + data[offset] as usize;
    }

    // DecoderConfigDescriptor.
    let (tag, _, header) = read_descriptor(&data[offset..])?;
    if tag != 0x04 {
        return Err(Mp4Error::malformed(b"esds", "missing decoder config"));
    }
    offset += header + 13;

    // DecoderSpecificInfo.
    if offset >= data.len() {
        return Ok(Vec::new());
    }
    let (tag, size, header) = read_descriptor(&data[offset..])?;
    if tag != 0x05 {
        return Ok(Vec::new());
    }
    offset += header;
    if offset + size > data.len() {
        return Err(Mp4Error::malformed(b"esds", "truncated specific info"));
    }
    Ok(data[offset..offset + size].to_vec())
}

/// Parse one media segment into samples.
///
/// `styp` and `sidx` are tolerated but not required. Every `moof`+`mdat`
/// pair found in the buffer contributes samples in order.
pub fn parse_media_segment(data: &[u8], track: &TrackInfo) -> Result<Vec<MediaSample>> {
    let mut samples = Vec::new();
    let mut seen_moof = false;

    for item in iter_boxes(data) {
        let item = item?;
        match &item.box_type {
            b"moof" => {
                seen_moof = true;
                parse_moof(&item, data, track, &mut samples)?;
            }
            b"styp" | b"sidx" | b"mdat" | b"prft" => {}
            other => {
                tracing::debug!("skipping {} box in media segment", fourcc_to_string(other));
            }
        }
    }

    if !seen_moof {
        return Err(Mp4Error::MissingBox("moof".into()));
    }

    Ok(samples)
}

struct FragmentHeader {
    base_data_offset: u64,
    default_duration: u32,
    default_size: u32,
    default_flags: u32,
}

fn parse_moof(
    moof: &Mp4Box<'_>,
    data: &[u8],
    track: &TrackInfo,
    samples: &mut Vec<MediaSample>,
) -> Result<()> {
    for traf in moof.children() {
        let traf = traf?;
        if &traf.box_type != b"traf" {
            continue;
        }

        let tfhd = traf.child(b"tfhd")?;
        let (_, tfhd_flags, tfhd_payload) = tfhd.full_box()?;
        let short_tfhd = || Mp4Error::malformed(b"tfhd", "short payload");
        let mut offset = 4; // track_id
        if tfhd_payload.len() < offset {
            return Err(short_tfhd());
        }

        let mut header = FragmentHeader {
            base_data_offset: moof.offset as u64,
            default_duration: track.default_sample_duration,
            default_size: track.default_sample_size,
            default_flags: track.default_sample_flags,
        };

        if tfhd_flags & TFHD_BASE_DATA_OFFSET != 0 {
            if tfhd_payload.len() < offset + 8 {
                return Err(short_tfhd());
            }
            header.base_data_offset = BigEndian::read_u64(&tfhd_payload[offset..offset + 8]);
            offset += 8;
        }
        if tfhd_flags & TFHD_SAMPLE_DESC_INDEX != 0 {
            offset += 4;
        }
        if tfhd_flags & TFHD_DEFAULT_DURATION != 0 {
            if tfhd_payload.len() < offset + 4 {
                return Err(short_tfhd());
            }
            header.default_duration = BigEndian::read_u32(&tfhd_payload[offset..offset + 4]);
            offset += 4;
        }
        if tfhd_flags & TFHD_DEFAULT_SIZE != 0 {
            if tfhd_payload.len() < offset + 4 {
                return Err(short_tfhd());
            }
            header.default_size = BigEndian::read_u32(&tfhd_payload[offset..offset + 4]);
            offset += 4;
        }
        if tfhd_flags & TFHD_DEFAULT_FLAGS != 0 {
            if tfhd_payload.len() < offset + 4 {
                return Err(short_tfhd());
            }
            header.default_flags = BigEndian::read_u32(&tfhd_payload[offset..offset + 4]);
        }

        let mut dts = match traf.find_child(b"tfdt")? {
            Some(tfdt) => {
                let (version, _, payload) = tfdt.full_box()?;
                if version == 1 {
                    if payload.len() < 8 {
                        return Err(Mp4Error::malformed(b"tfdt", "short payload"));
                    }
                    BigEndian::read_u64(&payload[0..8]) as i64
                } else {
                    if payload.len() < 4 {
                        return Err(Mp4Error::malformed(b"tfdt", "short payload"));
                    }
                    BigEndian::read_u32(&payload[0..4]) as i64
                }
            }
            None => 0,
        };

        let first_new_sample = samples.len();
        let mut data_cursor = header.base_data_offset;

        for trun in traf.children() {
            let trun = trun?;
            if &trun.box_type != b"trun" {
                continue;
            }
            data_cursor =
                parse_trun(&trun, data, track, &header, &mut dts, data_cursor, samples)?;
        }

        if let Some(senc) = traf.find_child(b"senc")? {
            attach_senc(&senc, track, &mut samples[first_new_sample..])?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn parse_trun(
    trun: &Mp4Box<'_>,
    data: &[u8],
    track: &TrackInfo,
    header: &FragmentHeader,
    dts: &mut i64,
    data_cursor: u64,
    samples: &mut Vec<MediaSample>,
) -> Result<u64> {
    let (version, flags, payload) = trun.full_box()?;
    if payload.len() < 4 {
        return Err(Mp4Error::malformed(b"trun", "short payload"));
    }
    let sample_count = BigEndian::read_u32(&payload[0..4]) as usize;
    let mut offset = 4;

    let mut position = data_cursor;
    if flags & TRUN_DATA_OFFSET != 0 {
        if payload.len() < offset + 4 {
            return Err(Mp4Error::malformed(b"trun", "missing data offset"));
        }
        let data_offset = BigEndian::read_i32(&payload[offset..offset + 4]);
        offset += 4;
        position = header
            .base_data_offset
            .checked_add_signed(data_offset as i64)
            .ok_or_else(|| Mp4Error::malformed(b"trun", "data offset underflow"))?;
    }

    let mut first_sample_flags = None;
    if flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
        if payload.len() < offset + 4 {
            return Err(Mp4Error::malformed(b"trun", "missing first sample flags"));
        }
        first_sample_flags = Some(BigEndian::read_u32(&payload[offset..offset + 4]));
        offset += 4;
    }

    for index in 0..sample_count {
        let mut duration = header.default_duration;
        let mut size = header.default_size;
        let mut sample_flags = header.default_flags;
        let mut cts = 0i64;

        if flags & TRUN_SAMPLE_DURATION != 0 {
            ensure_len(payload, offset + 4)?;
            duration = BigEndian::read_u32(&payload[offset..offset + 4]);
            offset += 4;
        }
        if flags & TRUN_SAMPLE_SIZE != 0 {
            ensure_len(payload, offset + 4)?;
            size = BigEndian::read_u32(&payload[offset..offset + 4]);
            offset += 4;
        }
        if flags & TRUN_SAMPLE_FLAGS != 0 {
            ensure_len(payload, offset + 4)?;
            sample_flags = BigEndian::read_u32(&payload[offset..offset + 4]);
            offset += 4;
        }
        if flags & TRUN_SAMPLE_CTS != 0 {
            ensure_len(payload, offset + 4)?;
            cts = if version >= 1 {
                BigEndian::read_i32(&payload[offset..offset + 4]) as i64
            } else {
                BigEndian::read_u32(&payload[offset..offset + 4]) as i64
            };
            offset += 4;
        }

        if index == 0 {
            if let Some(first_flags) = first_sample_flags {
                sample_flags = first_flags;
            }
        }

        let start = position as usize;
        let end = start
            .checked_add(size as usize)
            .ok_or_else(|| Mp4Error::SampleOutOfRange("sample size overflow".into()))?;
        if end > data.len() {
            return Err(Mp4Error::SampleOutOfRange(format!(
                "sample bytes {}..{} beyond segment of {} bytes",
                start,
                end,
                data.len()
            )));
        }

        let mut sample = MediaSample::new(
            track.track_id,
            *dts,
            *dts + cts,
            duration,
            data[start..end].to_vec(),
        );
        sample.is_key = sample_flags & SAMPLE_FLAG_NON_SYNC == 0;
        samples.push(sample);

        *dts += duration as i64;
        position = end as u64;
    }

    Ok(position)
}

fn ensure_len(payload: &[u8], needed: usize) -> Result<()> {
    if payload.len() < needed {
        return Err(Mp4Error::malformed(b"trun", "truncated sample table"));
    }
    Ok(())
}

/// Attach per-sample encryption metadata from `senc` to freshly parsed
/// samples.
fn attach_senc(senc: &Mp4Box<'_>, track: &TrackInfo, samples: &mut [MediaSample]) -> Result<()> {
    let iv_size = track
        .input_protection
        .as_ref()
        .map(|p| p.per_sample_iv_size as usize)
        .unwrap_or(0);

    let (_, flags, payload) = senc.full_box()?;
    if payload.len() < 4 {
        return Err(Mp4Error::malformed(b"senc", "short payload"));
    }
    let sample_count = BigEndian::read_u32(&payload[0..4]) as usize;
    if sample_count != samples.len() {
        return Err(Mp4Error::malformed(
            b"senc",
            format!(
                "{} entries for {} samples",
                sample_count,
                samples.len()
            ),
        ));
    }

    let has_subsamples = flags & 0x2 != 0;
    let mut offset = 4;

    for sample in samples.iter_mut() {
        if iv_size > 0 {
            if payload.len() < offset + iv_size {
                return Err(Mp4Error::malformed(b"senc", "truncated IV"));
            }
            sample.iv = Some(payload[offset..offset + iv_size].to_vec());
            offset += iv_size;
        }

        if has_subsamples {
            if payload.len() < offset + 2 {
                return Err(Mp4Error::malformed(b"senc", "truncated subsample count"));
            }
            let count = BigEndian::read_u16(&payload[offset..offset + 2]) as usize;
            offset += 2;
            for _ in 0..count {
                if payload.len() < offset + 6 {
                    return Err(Mp4Error::malformed(b"senc", "truncated subsample entry"));
                }
                sample.subsamples.push(SubsampleEntry::new(
                    BigEndian::read_u16(&payload[offset..offset + 2]),
                    BigEndian::read_u32(&payload[offset + 2..offset + 6]),
                ));
                offset += 6;
            }
        }

        sample.is_encrypted = track.is_encrypted;
    }

    Ok(())
}

/// Read `mfhd.sequence_number` from a media segment, if a fragment exists.
pub fn read_sequence_number(data: &[u8]) -> Result<Option<u32>> {
    let Some(moof) = find_box(data, b"moof")? else {
        return Ok(None);
    };
    let mfhd = moof.child(b"mfhd")?;
    let (_, _, payload) = mfhd.full_box()?;
    if payload.len() < 4 {
        return Err(Mp4Error::malformed(b"mfhd", "short payload"));
    }
    Ok(Some(BigEndian::read_u32(&payload[0..4])))
}
