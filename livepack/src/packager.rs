//! The per-segment packaging pipeline.
//!
//! A [`LivePackager`] owns one [`LiveConfig`] and converts init + media
//! segment pairs into packaged output: demux to samples, optionally
//! encrypt, then re-emit as an fMP4 fragment, a TS segment, or a timed-text
//! container. Every call is self-contained; nothing carries over between
//! segments.

use livepack_core::{
    config::protection_systems, logging, Error, FullSegmentBuffer, LiveConfig, MediaSample,
    OutputFormat, ProtectionScheme, Result, SegmentBuffer, Severity, TrackInfo,
};
use livepack_drm::pssh::{generate_pssh_data, PsshGeneratorInput};
use livepack_drm::{AesCtr, CbcPatternCryptor, ContentKey, Iv, Pattern, SampleEncryptor};
use livepack_mp4::{parse_init_segment, parse_media_segment, write_init_segment, write_media_segment};
use livepack_text::{package_ttml_mp4, package_vtt_mp4};
use livepack_ts::{TsMuxerConfig, TsSegmentMuxer};

/// Stateless per-segment media packager.
///
/// An instance may serve any number of segments, but not concurrently from
/// multiple threads.
#[derive(Debug)]
pub struct LivePackager {
    config: LiveConfig,
}

impl LivePackager {
    /// Create a packager, validating the configuration.
    pub fn new(config: LiveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this packager runs with.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Package only the init segment.
    ///
    /// For fMP4 output the normalized init segment (with `encv`/`enca` and
    /// PSSH boxes when encryption is configured) lands in the output's init
    /// region. TS output has no init segment, so the output stays empty.
    pub fn package_init(&self, init_segment: &[u8], output: &mut FullSegmentBuffer) -> Result<()> {
        match self.config.format {
            OutputFormat::Fmp4 => {
                let track = parse_init_segment(init_segment, Some(self.config.track_type))?;
                self.write_init(&track, output)
            }
            OutputFormat::Ts => Ok(()),
            _ => Err(Error::unsupported(
                "timed-text formats are packaged through package_timed_text",
            )),
        }
    }

    /// Package one media segment given its init segment.
    pub fn package(
        &self,
        init_segment: &[u8],
        media_segment: &[u8],
        output: &mut FullSegmentBuffer,
    ) -> Result<()> {
        if self.config.format.is_text() {
            return self.package_timed_text(media_segment, output);
        }

        let track = parse_init_segment(init_segment, Some(self.config.track_type))?;
        let mut samples = parse_media_segment(media_segment, &track)?;
        tracing::debug!(
            "packaging {} samples from a {}-byte media segment",
            samples.len(),
            media_segment.len()
        );

        if track.is_encrypted {
            self.decrypt_input(&track, &mut samples)?;
        }

        match self.config.format {
            OutputFormat::Fmp4 => self.package_fmp4(&track, samples, output),
            OutputFormat::Ts => self.package_ts(&track, &samples, output),
            _ => unreachable!("text formats dispatched above"),
        }
    }

    /// Package a timed-text segment.
    pub fn package_timed_text(
        &self,
        segment: &[u8],
        output: &mut FullSegmentBuffer,
    ) -> Result<()> {
        match self.config.format {
            OutputFormat::VttMp4 => {
                package_vtt_mp4(
                    segment,
                    self.config.timed_text_decode_time,
                    self.config.moof_sequence_number(),
                    output,
                )?;
                Ok(())
            }
            OutputFormat::TtmlMp4 => {
                package_ttml_mp4(
                    segment,
                    self.config.timed_text_decode_time,
                    self.config.moof_sequence_number(),
                    output,
                )?;
                Ok(())
            }
            OutputFormat::Ttml => {
                output.append_data(segment);
                Ok(())
            }
            _ => Err(Error::unsupported(
                "package_timed_text requires a timed-text output format",
            )),
        }
    }

    fn sample_encryptor(&self) -> Result<Option<SampleEncryptor>> {
        if self.config.protection_scheme.is_sample_level() {
            Ok(Some(SampleEncryptor::new(&self.config)?))
        } else {
            Ok(None)
        }
    }

    /// Emit the normalized init segment into the output's init region.
    fn write_init(&self, track: &TrackInfo, output: &mut FullSegmentBuffer) -> Result<()> {
        let encryptor = self.sample_encryptor()?;
        let protection = encryptor.as_ref().and_then(|e| e.track_protection());
        let pssh_boxes = match protection.as_ref() {
            Some(protection) => self.pssh_boxes(protection.scheme)?,
            None => Vec::new(),
        };

        let mut init = SegmentBuffer::new();
        write_init_segment(track, protection.as_ref(), &pssh_boxes, &mut init)?;
        logging::emit(
            Severity::Info,
            format!("packaged init segment, {} bytes", init.size()),
        );
        output.set_init_segment(init.data());
        Ok(())
    }

    /// Build the PSSH boxes selected by the protection system bitset.
    fn pssh_boxes(&self, scheme: [u8; 4]) -> Result<Vec<Vec<u8>>> {
        let systems = self.config.protection_systems;
        if systems == 0 {
            return Ok(Vec::new());
        }

        let input = PsshGeneratorInput {
            protection_scheme: u32::from_be_bytes(scheme),
            key: self.config.key.clone(),
            key_id: self.config.key_id.clone(),
            key_ids: vec![self.config.key_id.clone()],
        };
        let pssh = generate_pssh_data(&input)?;

        let mut boxes = Vec::new();
        if systems & protection_systems::COMMON != 0 {
            boxes.push(pssh.cenc_box);
        }
        if systems & protection_systems::WIDEVINE != 0 {
            boxes.push(pssh.wv_box);
        }
        if systems & protection_systems::PLAYREADY != 0 {
            boxes.push(pssh.mspr_box);
        }
        Ok(boxes)
    }

    fn package_fmp4(
        &self,
        track: &TrackInfo,
        mut samples: Vec<MediaSample>,
        output: &mut FullSegmentBuffer,
    ) -> Result<()> {
        self.write_init(track, output)?;

        let mut encryptor = self.sample_encryptor()?;
        if let Some(encryptor) = encryptor.as_mut() {
            for sample in &mut samples {
                encryptor.encrypt_sample(sample, track)?;
            }
        }
        let protection = encryptor.as_ref().and_then(|e| e.track_protection());

        let mut body = SegmentBuffer::new();
        write_media_segment(
            track,
            &samples,
            self.config.moof_sequence_number(),
            protection.as_ref(),
            &mut body,
        )?;
        output.append_data(body.data());
        Ok(())
    }

    fn package_ts(
        &self,
        track: &TrackInfo,
        samples: &[MediaSample],
        output: &mut FullSegmentBuffer,
    ) -> Result<()> {
        match self.config.protection_scheme {
            ProtectionScheme::Cenc | ProtectionScheme::Cbcs => {
                return Err(Error::unsupported(
                    "common encryption requires fMP4 output",
                ));
            }
            _ => {}
        }

        let sample_aes = self.config.protection_scheme == ProtectionScheme::SampleAes;
        let mut encryptor = if sample_aes || self.config.protection_scheme == ProtectionScheme::Aes128
        {
            Some(SampleEncryptor::new(&self.config)?)
        } else {
            None
        };

        let muxer = TsSegmentMuxer::new(
            track,
            TsMuxerConfig {
                segment_number: self.config.segment_number,
                offset_ms: self.config.m2ts_offset_ms,
            },
            sample_aes,
        )?;

        let body = muxer.mux(
            samples,
            if sample_aes { encryptor.as_mut() } else { None },
        )?;

        let body = match self.config.protection_scheme {
            ProtectionScheme::Aes128 => match encryptor.as_ref() {
                Some(encryptor) => encryptor.encrypt_whole_segment(&body),
                None => body,
            },
            _ => body,
        };

        output.append_data(&body);
        Ok(())
    }

    /// Strip the input's own encryption so samples can be repackaged or
    /// re-encrypted.
    fn decrypt_input(&self, track: &TrackInfo, samples: &mut [MediaSample]) -> Result<()> {
        let Some(protection) = track.input_protection.as_ref() else {
            return Err(Error::parse(
                "encrypted sample description without protection parameters",
            ));
        };
        let Some(key_bytes) = self.config.decryption_key.as_ref() else {
            return Err(Error::invalid_argument(
                "encrypted input requires a decryption key",
            ));
        };
        let key = ContentKey::from_slice(key_bytes)?;

        match &protection.scheme {
            b"cenc" => {
                for sample in samples.iter_mut() {
                    let iv_bytes = sample.iv.as_deref().ok_or_else(|| {
                        Error::parse("encrypted sample without a per-sample IV")
                    })?;
                    let mut cipher = AesCtr::new(key.clone(), Iv::from_slice(iv_bytes)?);
                    if sample.subsamples.is_empty() {
                        cipher.crypt(&mut sample.data);
                    } else {
                        livepack_drm::crypt_subsamples(
                            &mut cipher,
                            &mut sample.data,
                            &sample.subsamples,
                        )?;
                    }
                    mark_clear(sample);
                }
            }
            b"cbcs" | b"cbc1" => {
                let iv_bytes = protection.constant_iv.as_deref().ok_or_else(|| {
                    Error::parse("cbcs input without a constant IV")
                })?;
                let iv = Iv::from_slice(iv_bytes)?;
                let pattern = if protection.crypt_byte_block > 0 {
                    Pattern {
                        crypt_blocks: protection.crypt_byte_block as u32,
                        skip_blocks: protection.skip_byte_block as u32,
                    }
                } else {
                    Pattern::full()
                };
                let cryptor = CbcPatternCryptor::new(&key, &iv, pattern);

                for sample in samples.iter_mut() {
                    if sample.subsamples.is_empty() {
                        cryptor.decrypt_region(&mut sample.data);
                    } else {
                        let subsamples = sample.subsamples.clone();
                        let mut offset = 0usize;
                        for subsample in &subsamples {
                            offset += subsample.clear_bytes as usize;
                            let end = offset + subsample.protected_bytes as usize;
                            if end > sample.data.len() {
                                return Err(Error::encryption(
                                    "input subsample range past end of sample",
                                ));
                            }
                            cryptor.decrypt_region(&mut sample.data[offset..end]);
                            offset = end;
                        }
                    }
                    mark_clear(sample);
                }
            }
            other => {
                return Err(Error::unsupported(format!(
                    "cannot decrypt input scheme {}",
                    other.iter().map(|&b| b as char).collect::<String>()
                )));
            }
        }

        Ok(())
    }
}

fn mark_clear(sample: &mut MediaSample) {
    sample.is_encrypted = false;
    sample.subsamples.clear();
    sample.iv = None;
}
