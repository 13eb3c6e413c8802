use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::application::AudioDecoder;
use crate::domain::{AudioClip, DomainError};

const RESAMPLE_CHUNK: usize = 4096;

/// Decodes any container symphonia can probe into mono f32 at the model rate.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_file(path: &Path, target_sample_rate: u32) -> Result<AudioClip, DomainError> {
        let (samples, source_rate) = Self::decode_mono(path)?;
        debug!(
            "Decoded {} samples at {} Hz from {}",
            samples.len(),
            source_rate,
            path.display()
        );

        let samples = resample(samples, source_rate, target_sample_rate)?;
        Ok(AudioClip::new(samples, target_sample_rate))
    }

    fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), DomainError> {
        let file = File::open(path)?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                DomainError::decode(format!("Failed to read {}: {}", path.display(), e))
            })?;
        let mut format = probed.format;

        let (track_id, codec_params) = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .map(|t| (t.id, t.codec_params.clone()))
            .ok_or_else(|| {
                DomainError::decode(format!("No audio track in {}", path.display()))
            })?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DomainError::decode(format!("Unsupported codec: {}", e)))?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut mono = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(DomainError::decode(format!(
                        "Failed to read packet: {}",
                        e
                    )))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => return Err(DomainError::decode(format!("Decoding failed: {}", e))),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            sample_rate = spec.rate;

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            mono.extend(
                buffer
                    .samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }

        if sample_rate == 0 {
            return Err(DomainError::decode(format!(
                "Unknown sample rate in {}",
                path.display()
            )));
        }

        Ok((mono, sample_rate))
    }
}

/// Band-limited sinc resampling of a mono signal.
pub fn resample(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>, DomainError> {
    if from == to || samples.is_empty() {
        return Ok(samples);
    }

    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| DomainError::decode(format!("Failed to create resampler: {}", e)))?;

    let expected = (samples.len() as u64 * to as u64).div_ceil(from as u64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut position = 0;
    while samples.len() - position >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk = resampler
            .process(&[&samples[position..position + frames]], None)
            .map_err(|e| DomainError::decode(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&chunk[0]);
        position += frames;
    }

    if position < samples.len() {
        let chunk = resampler
            .process_partial(Some(&[&samples[position..]]), None)
            .map_err(|e| DomainError::decode(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&chunk[0]);
    }

    // Flush the filter tail.
    while output.len() < expected + delay {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| DomainError::decode(format!("Resampling failed: {}", e)))?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode(&self, path: &Path, target_sample_rate: u32) -> Result<AudioClip, DomainError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::decode_file(&path, target_sample_rate))
            .await
            .map_err(|e| DomainError::internal(format!("Decoder task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_decodes_wav_at_model_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 16_000, 1, 1.0);

        let clip = SymphoniaDecoder::new().decode(&path, 16_000).await.unwrap();

        assert_eq!(clip.sample_rate(), 16_000);
        assert_eq!(clip.len(), 16_000);
    }

    #[tokio::test]
    async fn test_downmixes_and_resamples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 44_100, 2, 1.0);

        let clip = SymphoniaDecoder::new().decode(&path, 16_000).await.unwrap();

        assert_eq!(clip.len(), 16_000);
        let peak = clip.samples()[4_000..12_000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((0.4..0.6).contains(&peak), "peak was {}", peak);
    }

    #[tokio::test]
    async fn test_rejects_non_audio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.mp3");
        std::fs::write(&path, b"this is not an mp3 file at all").unwrap();

        let err = SymphoniaDecoder::new().decode(&path, 16_000).await.unwrap_err();
        assert!(matches!(err, DomainError::DecodeError(_)));
    }

    #[test]
    fn test_resample_length() {
        let samples = vec![0.25f32; 48_000];
        let out = resample(samples, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
        assert!((out[8_000] - 0.25).abs() < 0.01);
    }
}
