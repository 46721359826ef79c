//! Decoded mono audio buffers and the operations assembly needs.

use crate::error::{MdspeakError, Result};
use std::io::Cursor;

/// Mono audio as normalized `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV payload of any bit depth and channel count into mono.
    ///
    /// A header that overstates the data length (common when a WAV is
    /// streamed to stdout) is tolerated: decoding stops at the last whole
    /// sample.
    pub fn decode_wav(bytes: &[u8]) -> Result<Self> {
        let mut reader =
            hound::WavReader::new(Cursor::new(bytes)).map_err(|e| MdspeakError::AudioDecode {
                message: format!("Failed to parse WAV data: {}", e),
            })?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().map_while(|s| s.ok()).collect(),
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map_while(|s| s.ok())
                    .map(|s| s as f32 / scale)
                    .collect()
            }
        };

        if interleaved.is_empty() && reader.duration() > 0 {
            return Err(MdspeakError::AudioDecode {
                message: "WAV data contains no readable samples".to_string(),
            });
        }

        // Downmix by averaging channels
        let samples = if channels > 1 {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            interleaved
        };

        Ok(Self::new(samples, spec.sample_rate))
    }

    /// Silence of `duration_ms` at `sample_rate`.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Convert to `to_rate` using linear interpolation.
    pub fn resampled(self, to_rate: u32) -> Self {
        if self.sample_rate == to_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return Self::new(self.samples, to_rate);
        }
        let samples = resample(&self.samples, self.sample_rate, to_rate);
        Self::new(samples, to_rate)
    }

    /// Scale every sample by `db` decibels.
    pub fn apply_gain_db(&mut self, db: f64) {
        if db == 0.0 {
            return;
        }
        let factor = 10f64.powf(db / 20.0) as f32;
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Append `other`, resampling it first if the rates differ.
    pub fn append(&mut self, other: AudioSegment) {
        let other = other.resampled(self.sample_rate);
        self.samples.extend(other.samples);
    }

    /// Append `duration_ms` of silence.
    pub fn append_silence(&mut self, duration_ms: u32) {
        let len = (self.sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        self.samples.resize(self.samples.len() + len, 0.0);
    }

    /// 16-bit PCM, clipping anything driven past full scale.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect()
    }
}

/// Gain in decibels for a linear loudness factor.
///
/// Non-positive or non-finite factors leave the level unchanged.
pub fn gain_db(loudness_boost: f32) -> f64 {
    let boost = loudness_boost as f64;
    if !boost.is_finite() || boost <= 0.0 {
        return 0.0;
    }
    20.0 * boost.log10()
}

/// Duration of a WAV payload, if it is a WAV.
///
/// The header's data length is capped at the bytes actually present:
/// encoders writing to a pipe leave a placeholder length there.
pub fn wav_duration_ms(bytes: &[u8]) -> Option<u64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    // Frames, not samples: `duration` is per channel.
    let declared = reader.duration() as u64;
    let block_align = (spec.channels as u64 * spec.bits_per_sample.div_ceil(8) as u64).max(1);
    let data_offset = reader.into_inner().position();
    let available = (bytes.len() as u64).saturating_sub(data_offset) / block_align;
    Some(declared.min(available) * 1000 / spec.sample_rate as u64)
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
