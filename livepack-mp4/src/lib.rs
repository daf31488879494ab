//! # Livepack MP4
//!
//! ISO-BMFF support for the livepack packager: box parsing primitives, an
//! fMP4 demuxer for init + media segment pairs, and writers for normalized
//! init segments and media fragments.
//!
//! ## Reading
//!
//! ```no_run
//! use livepack_mp4::demuxer::{parse_init_segment, parse_media_segment};
//!
//! # fn load(_: &str) -> Vec<u8> { Vec::new() }
//! let init = load("init.mp4");
//! let media = load("0001.m4s");
//!
//! let track = parse_init_segment(&init, None)?;
//! let samples = parse_media_segment(&media, &track)?;
//! for sample in &samples {
//!     println!("dts={} pts={} bytes={}", sample.dts, sample.pts, sample.data.len());
//! }
//! # Ok::<(), livepack_mp4::Mp4Error>(())
//! ```
//!
//! ## Writing
//!
//! Fragments are rewritten from sample runs; the sequence number and base
//! decode time land in `mfhd` and `tfdt`, and composition offsets are
//! emitted signed so negative offsets survive.

pub mod boxes;
pub mod demuxer;
pub mod error;
pub mod muxer;

pub use boxes::{find_box, iter_boxes, BoxBuilder, BoxIter, Mp4Box};
pub use demuxer::{parse_init_segment, parse_media_segment, read_sequence_number};
pub use error::{Mp4Error, Result};
pub use muxer::{write_init_segment, write_media_segment};

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};
    use livepack_core::{
        CodecType, MediaSample, SegmentBuffer, SubsampleEntry, TrackInfo, TrackProtection,
        TrackType,
    };

    /// Build an `avc1` sample description entry with an `avcC` child.
    fn avc1_entry(width: u16, height: u16) -> Vec<u8> {
        let mut builder = BoxBuilder::new();
        builder.open(b"avc1");
        builder.bytes(&[0u8; 6]);
        builder.u16(1); // data reference index
        builder.bytes(&[0u8; 16]);
        builder.u16(width);
        builder.u16(height);
        builder.u32(0x0048_0000);
        builder.u32(0x0048_0000);
        builder.u32(0);
        builder.u16(1); // frame count
        builder.bytes(&[0u8; 32]);
        builder.u16(0x0018);
        builder.u16(0xFFFF);

        builder.open(b"avcC");
        builder.u8(1); // configuration version
        builder.bytes(&[0x64, 0x00, 0x1F]); // profile, compat, level
        builder.u8(0xFF); // 4-byte NAL lengths
        builder.u8(0xE1); // one SPS
        let sps = [0x67, 0x64, 0x00, 0x1F, 0xAC];
        builder.u16(sps.len() as u16);
        builder.bytes(&sps);
        builder.u8(1); // one PPS
        let pps = [0x68, 0xEB, 0xE3, 0xCB];
        builder.u16(pps.len() as u16);
        builder.bytes(&pps);
        builder.close();

        builder.close();
        builder.finish()
    }

    fn video_track() -> TrackInfo {
        let mut track = TrackInfo::new(1, TrackType::Video, 10_000_000);
        track.codec = CodecType::H264;
        track.width = 1024;
        track.height = 576;
        track.stsd_entry = avc1_entry(1024, 576);
        track
    }

    fn sample(dts: i64, cts: i64, duration: u32, key: bool, fill: u8, len: usize) -> MediaSample {
        let mut sample = MediaSample::new(1, dts, dts + cts, duration, vec![fill; len]);
        sample.is_key = key;
        sample
    }

    #[test]
    fn test_init_segment_roundtrip() {
        let track = video_track();
        let mut out = SegmentBuffer::new();
        write_init_segment(&track, None, &[], &mut out).unwrap();

        // First box is ftyp with major brand mp41.
        let data = out.data();
        assert_eq!(&data[4..8], b"ftyp");
        assert_eq!(&data[8..12], b"mp41");

        let parsed = parse_init_segment(data, Some(TrackType::Video)).unwrap();
        assert_eq!(parsed.track_id, 1);
        assert_eq!(parsed.timescale, 10_000_000);
        assert_eq!(parsed.width, 1024);
        assert_eq!(parsed.height, 576);
        assert_eq!(parsed.codec, CodecType::H264);
        assert_eq!(parsed.nal_length_size, 4);
        assert_eq!(parsed.sps.len(), 1);
        assert_eq!(parsed.pps.len(), 1);
        assert!(!parsed.is_encrypted);
    }

    #[test]
    fn test_encrypted_init_roundtrip() {
        let track = video_track();
        let protection = TrackProtection {
            scheme: *b"cbcs",
            default_kid: [0x42; 16],
            per_sample_iv_size: 0,
            constant_iv: Some(vec![0x24; 16]),
            crypt_byte_block: 1,
            skip_byte_block: 9,
        };

        let mut out = SegmentBuffer::new();
        write_init_segment(&track, Some(&protection), &[], &mut out).unwrap();

        let parsed = parse_init_segment(out.data(), Some(TrackType::Video)).unwrap();
        assert!(parsed.is_encrypted);
        assert_eq!(parsed.codec, CodecType::H264);
        assert_eq!(parsed.width, 1024);

        let recovered = parsed.input_protection.unwrap();
        assert_eq!(&recovered.scheme, b"cbcs");
        assert_eq!(recovered.default_kid, [0x42; 16]);
        assert_eq!(recovered.per_sample_iv_size, 0);
        assert_eq!(recovered.constant_iv.as_deref(), Some(&[0x24u8; 16][..]));
        assert_eq!(recovered.crypt_byte_block, 1);
        assert_eq!(recovered.skip_byte_block, 9);
    }

    #[test]
    fn test_pssh_boxes_land_in_moov() {
        let track = video_track();
        let protection = TrackProtection {
            scheme: *b"cenc",
            default_kid: [0; 16],
            per_sample_iv_size: 16,
            constant_iv: None,
            crypt_byte_block: 0,
            skip_byte_block: 0,
        };
        let pssh = {
            let mut builder = BoxBuilder::new();
            builder.open(b"pssh").bytes(&[0u8; 24]).close();
            builder.finish()
        };

        let mut out = SegmentBuffer::new();
        write_init_segment(&track, Some(&protection), &[pssh.clone()], &mut out).unwrap();

        let moov = find_box(out.data(), b"moov").unwrap().unwrap();
        let embedded = moov.find_child(b"pssh").unwrap().unwrap();
        assert_eq!(embedded.size(), pssh.len());
    }

    #[test]
    fn test_fragment_roundtrip_preserves_timing() {
        let track = video_track();
        let samples = vec![
            sample(1000, -200, 500, true, 0xAA, 64),
            sample(1500, 300, 500, false, 0xBB, 32),
            sample(2000, 0, 500, false, 0xCC, 48),
        ];

        let mut out = SegmentBuffer::new();
        write_media_segment(&track, &samples, 7, None, &mut out).unwrap();

        assert_eq!(read_sequence_number(out.data()).unwrap(), Some(7));

        let parsed = parse_media_segment(out.data(), &track).unwrap();
        assert_eq!(parsed.len(), 3);
        for (original, reparsed) in samples.iter().zip(&parsed) {
            assert_eq!(original.dts, reparsed.dts);
            assert_eq!(original.pts, reparsed.pts);
            assert_eq!(original.duration, reparsed.duration);
            assert_eq!(original.is_key, reparsed.is_key);
            assert_eq!(original.data, reparsed.data);
        }
    }

    #[test]
    fn test_fragment_layout_order() {
        let track = video_track();
        let samples = vec![sample(0, 0, 100, true, 0x11, 16)];

        let mut out = SegmentBuffer::new();
        write_media_segment(&track, &samples, 1, None, &mut out).unwrap();

        let types: Vec<[u8; 4]> = iter_boxes(out.data())
            .map(|b| b.unwrap().box_type)
            .collect();
        assert_eq!(types, vec![*b"styp", *b"sidx", *b"moof", *b"mdat"]);

        // styp major brand is mp41, sidx carries the track timescale.
        let data = out.data();
        let styp = find_box(data, b"styp").unwrap().unwrap();
        assert_eq!(&styp.payload[..4], b"mp41");

        let sidx = find_box(data, b"sidx").unwrap().unwrap();
        let (version, _, payload) = sidx.full_box().unwrap();
        assert_eq!(version, 1);
        assert_eq!(BigEndian::read_u32(&payload[4..8]), 10_000_000);
    }

    #[test]
    fn test_empty_sample_run_writes_nothing() {
        let track = video_track();
        let mut out = SegmentBuffer::new();
        write_media_segment(&track, &[], 3, None, &mut out).unwrap();
        assert_eq!(out.size(), 0);
    }

    #[test]
    fn test_encrypted_fragment_roundtrip() {
        let track = video_track();
        let protection = TrackProtection {
            scheme: *b"cenc",
            default_kid: [1; 16],
            per_sample_iv_size: 16,
            constant_iv: None,
            crypt_byte_block: 0,
            skip_byte_block: 0,
        };

        let mut first = sample(0, 0, 100, true, 0xAA, 64);
        first.is_encrypted = true;
        first.iv = Some(vec![0x10; 16]);
        first.subsamples = vec![SubsampleEntry::new(5, 59)];
        let mut second = sample(100, 0, 100, false, 0xBB, 32);
        second.is_encrypted = true;
        second.iv = Some(vec![0x11; 16]);
        second.subsamples = vec![SubsampleEntry::new(5, 27)];

        let mut out = SegmentBuffer::new();
        write_media_segment(&track, &[first, second], 2, Some(&protection), &mut out).unwrap();

        // Reading back needs a track that knows the fragment is encrypted.
        let mut enc_track = video_track();
        enc_track.is_encrypted = true;
        enc_track.input_protection = Some(protection);

        let parsed = parse_media_segment(out.data(), &enc_track).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].is_encrypted);
        assert_eq!(parsed[0].iv.as_deref(), Some(&[0x10u8; 16][..]));
        assert_eq!(parsed[0].subsamples, vec![SubsampleEntry::new(5, 59)]);
        assert_eq!(parsed[1].iv.as_deref(), Some(&[0x11u8; 16][..]));

        // senc/saiz/saio all present inside the fragment.
        let moof = find_box(out.data(), b"moof").unwrap().unwrap();
        let traf = moof.child(b"traf").unwrap();
        assert!(traf.find_child(b"senc").unwrap().is_some());
        assert!(traf.find_child(b"saiz").unwrap().is_some());
        assert!(traf.find_child(b"saio").unwrap().is_some());
    }

    #[test]
    fn test_saio_points_at_senc_entries() {
        let track = video_track();
        let protection = TrackProtection {
            scheme: *b"cenc",
            default_kid: [1; 16],
            per_sample_iv_size: 16,
            constant_iv: None,
            crypt_byte_block: 0,
            skip_byte_block: 0,
        };

        let mut enc = sample(0, 0, 100, true, 0xAA, 64);
        enc.is_encrypted = true;
        enc.iv = Some(vec![0x77; 16]);

        let mut out = SegmentBuffer::new();
        write_media_segment(&track, &[enc], 1, Some(&protection), &mut out).unwrap();

        let data = out.data();
        let moof = find_box(data, b"moof").unwrap().unwrap();
        let traf = moof.child(b"traf").unwrap();
        let saio = traf.find_child(b"saio").unwrap().unwrap();
        let (_, _, payload) = saio.full_box().unwrap();
        assert_eq!(BigEndian::read_u32(&payload[..4]), 1);
        let aux_offset = BigEndian::read_u64(&payload[4..12]) as usize;

        // The bytes at moof start + offset are the first sample's IV.
        let iv_bytes = &data[moof.offset + aux_offset..moof.offset + aux_offset + 16];
        assert_eq!(iv_bytes, &[0x77; 16]);
    }
}
