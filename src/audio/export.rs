//! Encoding assembled audio into downloadable files.

use crate::error::{MdspeakError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Output container for an exported job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Mp3,
    Wav,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "audio/mpeg",
            ExportFormat::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = MdspeakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(ExportFormat::Mp3),
            "wav" => Ok(ExportFormat::Wav),
            other => Err(MdspeakError::ExportUnsupported {
                format: other.to_string(),
            }),
        }
    }
}

/// An encoded file ready to be written or served.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedAudio {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

impl ExportedAudio {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Encode mono 16-bit PCM as `format`.
pub fn encode(
    format: ExportFormat,
    samples: &[i16],
    sample_rate: u32,
    mp3_bitrate_kbps: u32,
) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Wav => encode_wav(samples, sample_rate),
        ExportFormat::Mp3 => encode_mp3(samples, sample_rate, mp3_bitrate_kbps),
    }
}

/// Encode mono 16-bit PCM as a WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Encode mono 16-bit PCM as a constant-bitrate MP3.
#[cfg(feature = "mp3")]
pub fn encode_mp3(samples: &[i16], sample_rate: u32, bitrate_kbps: u32) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Builder, FlushNoGap, MonoPcm, Quality, max_required_buffer_size};
    const FLUSH_RESERVE: usize = 7200;

    let export_error = |stage: &str, detail: String| MdspeakError::AudioExport {
        message: format!("MP3 {stage} failed: {detail}"),
    };

    let mut builder = Builder::new().ok_or_else(|| MdspeakError::AudioExport {
        message: "Failed to initialize LAME".to_string(),
    })?;
    builder
        .set_num_channels(1)
        .map_err(|e| export_error("setup", format!("{e:?}")))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| export_error("setup", format!("{e:?}")))?;
    builder
        .set_brate(bitrate(bitrate_kbps))
        .map_err(|e| export_error("setup", format!("{e:?}")))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| export_error("setup", format!("{e:?}")))?;
    let mut encoder = builder
        .build()
        .map_err(|e| export_error("setup", format!("{e:?}")))?;

    // LAME writes into spare capacity only; the flush needs up to 7200 bytes.
    let mut mp3 = Vec::with_capacity(max_required_buffer_size(samples.len()) + FLUSH_RESERVE);
    encoder
        .encode_to_vec(MonoPcm(samples), &mut mp3)
        .map_err(|e| export_error("encoding", format!("{e:?}")))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut mp3)
        .map_err(|e| export_error("flush", format!("{e:?}")))?;
    Ok(mp3)
}

#[cfg(not(feature = "mp3"))]
pub fn encode_mp3(_samples: &[i16], _sample_rate: u32, _bitrate_kbps: u32) -> Result<Vec<u8>> {
    Err(MdspeakError::ExportUnsupported {
        format: ExportFormat::Mp3.to_string(),
    })
}

/// Nearest supported LAME bitrate at or below `kbps`.
#[cfg(feature = "mp3")]
fn bitrate(kbps: u32) -> mp3lame_encoder::Bitrate {
    use mp3lame_encoder::Bitrate::*;
    match kbps {
        0..=31 => Kbps16,
        32..=47 => Kbps32,
        48..=63 => Kbps48,
        64..=95 => Kbps64,
        96..=127 => Kbps96,
        128..=159 => Kbps128,
        160..=191 => Kbps160,
        192..=255 => Kbps192,
        256..=319 => Kbps256,
        _ => Kbps320,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::Mp3.extension(), "mp3");
        assert_eq!(ExportFormat::Wav.mime_type(), "audio/wav");
        assert_eq!(ExportFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(ExportFormat::Wav.to_string(), "wav");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("MP3".parse::<ExportFormat>().unwrap(), ExportFormat::Mp3);
        assert_eq!(" wav ".parse::<ExportFormat>().unwrap(), ExportFormat::Wav);
        assert!(matches!(
            "ogg".parse::<ExportFormat>(),
            Err(MdspeakError::ExportUnsupported { .. })
        ));
    }

    #[test]
    fn test_format_serde_lowercase() {
        assert_eq!(serde_json::to_string(&ExportFormat::Mp3).unwrap(), "\"mp3\"");
        let parsed: ExportFormat = serde_json::from_str("\"wav\"").unwrap();
        assert_eq!(parsed, ExportFormat::Wav);
    }

    #[test]
    fn test_encode_wav_header() {
        let bytes = encode_wav(&[0, 100, -100, 0], 48000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 48000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_exported_audio_metadata() {
        let audio = ExportedAudio {
            format: ExportFormat::Wav,
            bytes: vec![0; 1024],
            sample_rate: 48000,
            duration_ms: 2500,
        };
        assert_eq!(audio.size_bytes(), 1024);
        assert_eq!(audio.duration_seconds(), 2.5);
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_encode_mp3_produces_frames() {
        let samples: Vec<i16> = (0..48000)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let bytes = encode_mp3(&samples, 48000, 192).unwrap();

        assert!(!bytes.is_empty());
        // Every MPEG audio frame starts with an 11-bit sync word.
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1] & 0xE0, 0xE0);
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_bitrate_rounds_down_to_supported() {
        assert!(matches!(bitrate(192), mp3lame_encoder::Bitrate::Kbps192));
        assert!(matches!(bitrate(200), mp3lame_encoder::Bitrate::Kbps192));
        assert!(matches!(bitrate(1000), mp3lame_encoder::Bitrate::Kbps320));
    }

    #[cfg(not(feature = "mp3"))]
    #[test]
    fn test_mp3_unsupported_without_feature() {
        assert!(matches!(
            encode_mp3(&[0; 10], 48000, 192),
            Err(MdspeakError::ExportUnsupported { .. })
        ));
    }
}
