//! End-to-end packaging tests.
//!
//! Inputs are synthetic fMP4 segments produced by the writer layer, so
//! every scenario runs hermetically: package them through the facade, then
//! reparse the output and check the wire-level invariants.

use livepack::{
    protection_systems, CodecType, FullSegmentBuffer, LiveConfig, LivePackager, MediaSample,
    OutputFormat, ProtectionScheme, SegmentBuffer, TrackInfo, TrackType,
};
use livepack_drm::{AesCbc, AesCtr, ContentKey, Iv};
use livepack_mp4::{
    find_box, iter_boxes, parse_init_segment, parse_media_segment, read_sequence_number,
    write_init_segment, write_media_segment, BoxBuilder,
};
use livepack_ts::{PesTimestamp, TsHeader, PID_PAT, PID_PMT, PID_VIDEO, TS_PACKET_SIZE};

const TIMESCALE: u32 = 10_000_000;
const KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x10, 0x11, 0x12, 0x13, 0x14,
    0x15,
];

fn avc1_entry(width: u16, height: u16) -> Vec<u8> {
    let mut builder = BoxBuilder::new();
    builder.open(b"avc1");
    builder.bytes(&[0u8; 6]);
    builder.u16(1);
    builder.bytes(&[0u8; 16]);
    builder.u16(width);
    builder.u16(height);
    builder.u32(0x0048_0000);
    builder.u32(0x0048_0000);
    builder.u32(0);
    builder.u16(1);
    builder.bytes(&[0u8; 32]);
    builder.u16(0x0018);
    builder.u16(0xFFFF);

    builder.open(b"avcC");
    builder.u8(1);
    builder.bytes(&[0x64, 0x00, 0x1F]);
    builder.u8(0xFF);
    builder.u8(0xE1);
    let sps = [0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40];
    builder.u16(sps.len() as u16);
    builder.bytes(&sps);
    builder.u8(1);
    let pps = [0x68, 0xEB, 0xE3, 0xCB];
    builder.u16(pps.len() as u16);
    builder.bytes(&pps);
    builder.close();

    builder.close();
    builder.finish()
}

fn mp4a_entry() -> Vec<u8> {
    let mut builder = BoxBuilder::new();
    builder.open(b"mp4a");
    builder.bytes(&[0u8; 6]);
    builder.u16(1);
    builder.bytes(&[0u8; 8]);
    builder.u16(2); // channel count
    builder.u16(16); // sample size
    builder.u32(0);
    builder.u32(48_000 << 16);

    // ES descriptor chain down to the AudioSpecificConfig (AAC-LC, 48 kHz,
    // stereo).
    builder.open_full(b"esds", 0, 0);
    builder.bytes(&[
        0x03, 0x16, 0x00, 0x01, 0x00, 0x04, 0x11, 0x40, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x02, 0x11, 0x90,
    ]);
    builder.close();

    builder.close();
    builder.finish()
}

fn audio_track() -> TrackInfo {
    let mut track = TrackInfo::new(1, TrackType::Audio, 48_000);
    track.codec = CodecType::Aac;
    track.sample_rate = 48_000;
    track.channel_count = 2;
    track.stsd_entry = mp4a_entry();
    track
}

fn audio_init_bytes() -> Vec<u8> {
    let mut buf = SegmentBuffer::new();
    write_init_segment(&audio_track(), None, &[], &mut buf).unwrap();
    buf.into_vec()
}

fn audio_media_bytes() -> Vec<u8> {
    let mut samples = Vec::new();
    for i in 0..4i64 {
        let dts = i * 1024;
        let data: Vec<u8> = (0..240).map(|n| (n as u8).wrapping_add(i as u8)).collect();
        let mut sample = MediaSample::new(1, dts, dts, 1024, data);
        sample.is_key = true;
        samples.push(sample);
    }

    let mut buf = SegmentBuffer::new();
    write_media_segment(&audio_track(), &samples, 1, None, &mut buf).unwrap();
    buf.into_vec()
}

fn source_track() -> TrackInfo {
    let mut track = TrackInfo::new(1, TrackType::Video, TIMESCALE);
    track.codec = CodecType::H264;
    track.width = 1024;
    track.height = 576;
    track.nal_length_size = 4;
    track.stsd_entry = avc1_entry(1024, 576);
    track
}

fn init_bytes() -> Vec<u8> {
    let mut buf = SegmentBuffer::new();
    write_init_segment(&source_track(), None, &[], &mut buf).unwrap();
    buf.into_vec()
}

/// One length-prefixed NAL unit per sample; the first sample is a keyframe
/// and every sample carries a negative composition offset.
fn media_bytes(segment_index: u32) -> Vec<u8> {
    let base_dts = segment_index as i64 * 3 * 5_000_000;
    let mut samples = Vec::new();
    for i in 0..3i64 {
        let mut data = Vec::new();
        let nal_len = 180 + i as usize * 40;
        data.extend_from_slice(&(nal_len as u32).to_be_bytes());
        data.push(if i == 0 { 0x65 } else { 0x41 });
        data.extend((0..nal_len - 1).map(|n| (n as u8).wrapping_mul(31)));

        let dts = base_dts + i * 5_000_000;
        let mut sample = MediaSample::new(1, dts, dts - 2_000_000, 5_000_000, data);
        sample.is_key = i == 0;
        samples.push(sample);
    }

    let mut buf = SegmentBuffer::new();
    write_media_segment(&source_track(), &samples, 1, None, &mut buf).unwrap();
    buf.into_vec()
}

fn config(format: OutputFormat, scheme: ProtectionScheme, segment_number: u32) -> LiveConfig {
    let keyed = scheme != ProtectionScheme::None;
    LiveConfig {
        format,
        track_type: TrackType::Video,
        protection_scheme: scheme,
        key: if keyed { KEY.to_vec() } else { Vec::new() },
        iv: if keyed { KEY.to_vec() } else { Vec::new() },
        key_id: if keyed { KEY.to_vec() } else { Vec::new() },
        segment_number,
        m2ts_offset_ms: 9000,
        ..Default::default()
    }
}

#[test]
fn init_segment_only() {
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::None, 0)).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package_init(&init_bytes(), &mut out).unwrap();

    assert!(out.init_segment_size() > 0);
    assert_eq!(out.segment_size(), 0);

    let init = out.init_segment_data();
    assert_eq!(&init[4..8], b"ftyp");
    assert_eq!(&init[8..12], b"mp41");

    let track = parse_init_segment(init, Some(TrackType::Video)).unwrap();
    assert_eq!(track.codec, CodecType::H264);
    assert_eq!(track.width, 1024);
    assert_eq!(track.height, 576);
    assert!(!track.is_encrypted);
}

#[test]
fn init_segment_only_with_cbcs() {
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::Cbcs, 0)).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package_init(&init_bytes(), &mut out).unwrap();

    assert!(out.init_segment_size() > 0);
    assert_eq!(out.segment_size(), 0);

    // The sample entry is wrapped as encv with a cbcs tenc: no per-sample
    // IVs, a 16-byte constant IV.
    let moov = find_box(out.init_segment_data(), b"moov").unwrap().unwrap();
    let stsd = moov
        .child(b"trak")
        .unwrap()
        .child(b"mdia")
        .unwrap()
        .child(b"minf")
        .unwrap()
        .child(b"stbl")
        .unwrap()
        .child(b"stsd")
        .unwrap();
    assert_eq!(&stsd.payload[12..16], b"encv");

    let track = parse_init_segment(out.init_segment_data(), Some(TrackType::Video)).unwrap();
    assert!(track.is_encrypted);
    let protection = track.input_protection.unwrap();
    assert_eq!(&protection.scheme, b"cbcs");
    assert_eq!(protection.per_sample_iv_size, 0);
    assert_eq!(protection.constant_iv.map(|iv| iv.len()), Some(16));
    assert_eq!(protection.default_kid, KEY);
}

#[test]
fn init_segment_with_cenc_embeds_requested_pssh() {
    let mut cfg = config(OutputFormat::Fmp4, ProtectionScheme::Cenc, 0);
    cfg.protection_systems = protection_systems::WIDEVINE | protection_systems::PLAYREADY;
    let packager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package_init(&init_bytes(), &mut out).unwrap();

    let moov = find_box(out.init_segment_data(), b"moov").unwrap().unwrap();
    let mut pssh_count = 0;
    for child in moov.children() {
        if &child.unwrap().box_type == b"pssh" {
            pssh_count += 1;
        }
    }
    assert_eq!(pssh_count, 2);
}

#[test]
fn aes128_segments_decrypt_to_whole_ts_packets() {
    let init = init_bytes();
    let key = ContentKey::from_slice(&KEY).unwrap();
    let iv = Iv::from_slice(&KEY).unwrap();
    let cbc = AesCbc::new(&key, &iv);

    for i in 0..10u32 {
        let packager =
            LivePackager::new(config(OutputFormat::Ts, ProtectionScheme::Aes128, i)).unwrap();
        let mut out = FullSegmentBuffer::new();
        packager.package(&init, &media_bytes(i), &mut out).unwrap();
        assert!(out.segment_size() > 0);

        let clear = cbc.decrypt_pkcs7(out.segment_data()).unwrap();
        assert_eq!(clear.len() % TS_PACKET_SIZE, 0);
        for chunk in clear.chunks(TS_PACKET_SIZE) {
            assert_eq!(chunk[0], 0x47);
        }
    }
}

#[test]
fn encryption_failure_names_key_and_iv() {
    let mut cfg = config(OutputFormat::Ts, ProtectionScheme::Aes128, 0);
    cfg.key = vec![0u8; 15];
    cfg.iv = vec![0u8; 14];

    let err = LivePackager::new(cfg).unwrap_err();
    assert!(err
        .to_string()
        .contains("invalid key and IV supplied to encryptor"));
}

#[test]
fn continuity_counters_across_segments() {
    let init = init_bytes();

    for i in 0..10u32 {
        let packager =
            LivePackager::new(config(OutputFormat::Ts, ProtectionScheme::None, i)).unwrap();
        let mut out = FullSegmentBuffer::new();
        packager.package(&init, &media_bytes(i), &mut out).unwrap();

        let mut es_counter = 0u8;
        let mut saw_pes = false;
        for chunk in out.segment_data().chunks(TS_PACKET_SIZE) {
            let header = TsHeader::parse(&chunk[..4]).unwrap();
            if header.payload_unit_start && (header.pid == PID_PAT || header.pid == PID_PMT) {
                assert_eq!(header.continuity_counter, (i % 16) as u8);
            } else if header.pid == PID_VIDEO {
                assert_eq!(header.continuity_counter, es_counter);
                es_counter = (es_counter + 1) & 0x0F;
                saw_pes = true;
            }
        }
        assert!(saw_pes);
    }
}

#[test]
fn ts_pts_never_precedes_dts() {
    let init = init_bytes();
    let packager = LivePackager::new(config(OutputFormat::Ts, ProtectionScheme::None, 0)).unwrap();
    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media_bytes(0), &mut out).unwrap();

    let mut checked = 0;
    for chunk in out.segment_data().chunks(TS_PACKET_SIZE) {
        let header = TsHeader::parse(&chunk[..4]).unwrap();
        if header.pid != PID_VIDEO || !header.payload_unit_start {
            continue;
        }

        let mut offset = 4;
        if header.adaptation_field_control.to_bits() & 0x2 != 0 {
            offset += 1 + chunk[4] as usize;
        }
        let pes = &chunk[offset..];
        assert_eq!(&pes[..3], &[0, 0, 1]);

        if pes[7] & 0xC0 == 0xC0 {
            let pts = PesTimestamp::parse(&pes[9..14]).unwrap();
            let dts = PesTimestamp::parse(&pes[14..19]).unwrap();
            assert!(pts.value >= dts.value);
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn moof_sequence_number_follows_config() {
    let init = init_bytes();

    for i in 0..10u32 {
        let packager = LivePackager::new(config(
            OutputFormat::Fmp4,
            ProtectionScheme::None,
            i + 1,
        ))
        .unwrap();
        let mut out = FullSegmentBuffer::new();
        packager.package(&init, &media_bytes(i), &mut out).unwrap();

        assert!(out.init_segment_size() > 0);
        assert!(out.segment_size() > 0);
        assert_eq!(
            read_sequence_number(out.segment_data()).unwrap(),
            Some(i + 1)
        );
    }
}

#[test]
fn moof_sequence_number_floors_at_one() {
    let init = init_bytes();
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::None, 0)).unwrap();
    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media_bytes(0), &mut out).unwrap();
    assert_eq!(read_sequence_number(out.segment_data()).unwrap(), Some(1));
}

#[test]
fn fmp4_body_layout() {
    let init = init_bytes();
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::None, 2)).unwrap();
    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media_bytes(0), &mut out).unwrap();

    let types: Vec<[u8; 4]> = iter_boxes(out.segment_data())
        .map(|b| b.unwrap().box_type)
        .collect();
    assert_eq!(types, vec![*b"styp", *b"sidx", *b"moof", *b"mdat"]);
}

/// Decrypting CENC output with the configured key restores the exact clear
/// samples and timing.
#[test]
fn cenc_roundtrip_restores_clear_samples() {
    let init = init_bytes();
    let media = media_bytes(0);

    let clear_samples = {
        let track = parse_init_segment(&init, Some(TrackType::Video)).unwrap();
        parse_media_segment(&media, &track).unwrap()
    };

    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::Cenc, 1)).unwrap();
    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media, &mut out).unwrap();

    let enc_track = parse_init_segment(out.init_segment_data(), Some(TrackType::Video)).unwrap();
    assert!(enc_track.is_encrypted);
    let protection = enc_track.input_protection.as_ref().unwrap();
    assert_eq!(&protection.scheme, b"cenc");
    assert_eq!(protection.per_sample_iv_size, 16);

    let mut enc_samples = parse_media_segment(out.segment_data(), &enc_track).unwrap();
    assert_eq!(enc_samples.len(), clear_samples.len());

    let key = ContentKey::from_slice(&KEY).unwrap();
    for (enc, clear) in enc_samples.iter_mut().zip(&clear_samples) {
        assert!(enc.is_encrypted);
        assert_ne!(enc.data, clear.data);

        let iv = Iv::from_slice(enc.iv.as_deref().unwrap()).unwrap();
        let mut cipher = AesCtr::new(key.clone(), iv);
        livepack_drm::crypt_subsamples(&mut cipher, &mut enc.data, &enc.subsamples).unwrap();

        assert_eq!(enc.data, clear.data);
        assert_eq!(enc.dts, clear.dts);
        assert_eq!(enc.pts, clear.pts);
        assert_eq!(enc.duration, clear.duration);
    }
}

/// Pre-encrypted cenc input is decrypted with the supplied key and
/// repackaged clear.
#[test]
fn encrypted_input_repackages_clear() {
    let init = init_bytes();
    let media = media_bytes(0);

    // First pass: produce encrypted output.
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::Cenc, 1)).unwrap();
    let mut encrypted = FullSegmentBuffer::new();
    packager.package(&init, &media, &mut encrypted).unwrap();

    // Second pass: feed that output back in as pre-encrypted input.
    let mut cfg = config(OutputFormat::Fmp4, ProtectionScheme::None, 1);
    cfg.decryption_key = Some(KEY.to_vec());
    let repackager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    repackager
        .package(
            encrypted.init_segment_data(),
            encrypted.segment_data(),
            &mut out,
        )
        .unwrap();

    let track = parse_init_segment(&init, Some(TrackType::Video)).unwrap();
    let clear_samples = parse_media_segment(&media, &track).unwrap();
    let out_track = parse_init_segment(out.init_segment_data(), Some(TrackType::Video)).unwrap();
    let out_samples = parse_media_segment(out.segment_data(), &out_track).unwrap();

    assert!(!out_track.is_encrypted);
    assert_eq!(out_samples.len(), clear_samples.len());
    for (a, b) in out_samples.iter().zip(&clear_samples) {
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn sample_aes_ts_keeps_packet_grid() {
    let init = init_bytes();
    let packager =
        LivePackager::new(config(OutputFormat::Ts, ProtectionScheme::SampleAes, 1)).unwrap();
    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media_bytes(0), &mut out).unwrap();

    assert!(out.segment_size() > 0);
    assert_eq!(out.segment_size() % TS_PACKET_SIZE, 0);
    for chunk in out.segment_data().chunks(TS_PACKET_SIZE) {
        assert_eq!(chunk[0], 0x47);
    }

    // PMT signals the SAMPLE-AES stream type for H.264.
    let pmt_packet = &out.segment_data()[TS_PACKET_SIZE..2 * TS_PACKET_SIZE];
    let pmt = livepack_ts::Pmt::parse(&pmt_packet[5..]).unwrap();
    assert_eq!(pmt.stream_type, 0xDB);
}

#[test]
fn audio_segments_mux_to_ts_with_sample_aes() {
    let init = audio_init_bytes();
    let mut cfg = config(OutputFormat::Ts, ProtectionScheme::SampleAes, 2);
    cfg.track_type = TrackType::Audio;
    let packager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &audio_media_bytes(), &mut out).unwrap();

    assert!(out.segment_size() > 0);
    assert_eq!(out.segment_size() % TS_PACKET_SIZE, 0);

    // Audio rides its own PID with the SAMPLE-AES AAC stream type.
    let pmt_packet = &out.segment_data()[TS_PACKET_SIZE..2 * TS_PACKET_SIZE];
    let pmt = livepack_ts::Pmt::parse(&pmt_packet[5..]).unwrap();
    assert_eq!(pmt.elementary_pid, 0x81);
    assert_eq!(pmt.stream_type, 0xCF);

    // The first audio PES payload starts with an ADTS sync word.
    let pes_packet = &out.segment_data()[2 * TS_PACKET_SIZE..3 * TS_PACKET_SIZE];
    let header = TsHeader::parse(&pes_packet[..4]).unwrap();
    assert!(header.payload_unit_start);
    assert_eq!(header.pid, 0x81);
}

#[test]
fn audio_fmp4_roundtrip() {
    let init = audio_init_bytes();
    let media = audio_media_bytes();

    let mut cfg = config(OutputFormat::Fmp4, ProtectionScheme::None, 1);
    cfg.track_type = TrackType::Audio;
    let packager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package(&init, &media, &mut out).unwrap();

    let track = parse_init_segment(out.init_segment_data(), Some(TrackType::Audio)).unwrap();
    assert_eq!(track.codec, CodecType::Aac);
    assert_eq!(track.sample_rate, 48_000);
    assert_eq!(track.channel_count, 2);
    assert_eq!(track.audio_specific_config, vec![0x11, 0x90]);

    let samples = parse_media_segment(out.segment_data(), &track).unwrap();
    assert_eq!(samples.len(), 4);
    assert_eq!(samples[0].duration, 1024);
}

#[test]
fn cenc_over_ts_is_rejected() {
    let init = init_bytes();
    let packager = LivePackager::new(config(OutputFormat::Ts, ProtectionScheme::Cenc, 0)).unwrap();
    let mut out = FullSegmentBuffer::new();
    let err = packager
        .package(&init, &media_bytes(0), &mut out)
        .unwrap_err();
    assert!(matches!(err, livepack::Error::Unsupported(_)));
}

#[test]
fn aes128_over_fmp4_is_rejected_at_construction() {
    let cfg = config(OutputFormat::Fmp4, ProtectionScheme::Aes128, 0);
    assert!(matches!(
        LivePackager::new(cfg),
        Err(livepack::Error::Unsupported(_))
    ));
}

#[test]
fn garbage_input_is_a_parse_error() {
    let packager = LivePackager::new(config(OutputFormat::Fmp4, ProtectionScheme::None, 0)).unwrap();
    let mut out = FullSegmentBuffer::new();
    let err = packager.package_init(&[0u8; 32], &mut out).unwrap_err();
    assert!(matches!(err, livepack::Error::Parse(_)));
}

#[test]
fn timed_text_fragment_uses_configured_decode_time() {
    let doc = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nhello there\n";
    let mut cfg = config(OutputFormat::VttMp4, ProtectionScheme::None, 4);
    cfg.track_type = TrackType::Text;
    cfg.timed_text_decode_time = 1_234_567;
    let packager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager
        .package_timed_text(doc.as_bytes(), &mut out)
        .unwrap();

    assert!(out.init_segment_size() > 0);
    let moof = find_box(out.segment_data(), b"moof").unwrap().unwrap();
    let tfdt = moof.child(b"traf").unwrap().child(b"tfdt").unwrap();
    let (version, _, payload) = tfdt.full_box().unwrap();
    assert_eq!(version, 1);
    assert_eq!(
        u64::from_be_bytes(payload[..8].try_into().unwrap()),
        1_234_567
    );
    assert_eq!(read_sequence_number(out.segment_data()).unwrap(), Some(4));
}

#[test]
fn ttml_passthrough_is_identity() {
    let doc = b"<tt xmlns=\"http://www.w3.org/ns/ttml\"/>";
    let mut cfg = config(OutputFormat::Ttml, ProtectionScheme::None, 0);
    cfg.track_type = TrackType::Text;
    let packager = LivePackager::new(cfg).unwrap();

    let mut out = FullSegmentBuffer::new();
    packager.package_timed_text(doc, &mut out).unwrap();
    assert_eq!(out.segment_data(), doc);
}
