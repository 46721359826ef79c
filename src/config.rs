use crate::audio::export::ExportFormat;
use crate::defaults;
use crate::error::{MdspeakError, Result};
use crate::segment::chunk::ChunkKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub segmenter: SegmenterConfig,
    pub voice: VoiceSettings,
    pub synthesis: SynthesisConfig,
    pub export: ExportConfig,
    pub provider: ProviderConfig,
}

/// Pacing and loudness applied to every chunk of one kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Prosody {
    /// Silence inserted after the chunk's audio.
    pub pause_after_ms: u32,
    /// Linear gain factor, 1.0 = unchanged.
    pub loudness_boost: f32,
}

impl Prosody {
    pub const fn new(pause_after_ms: u32, loudness_boost: f32) -> Self {
        Self {
            pause_after_ms,
            loudness_boost,
        }
    }
}

/// Markdown segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Bound for paragraph and blockquote chunks; a ceiling for every other kind.
    pub max_chunk_chars: usize,
    pub heading_max_chars: usize,
    pub bullet_max_chars: usize,
    pub code_placeholder: String,
    pub sentence_terminators: Vec<char>,
    pub h1: Prosody,
    pub h2: Prosody,
    pub h3: Prosody,
    pub paragraph: Prosody,
    pub bullet: Prosody,
    pub code: Prosody,
    pub blockquote: Prosody,
}

/// Voice parameters sent with every synthesis request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceSettings {
    pub speaker: String,
    pub target_language_code: String,
    pub pace: f32,
    pub sample_rate: u32,
    pub model: String,
    pub temperature: f32,
    pub enable_preprocessing: bool,
}

/// Scheduling, retry and failure policy for a generation job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub max_concurrent: usize,
    pub call_timeout_ms: u64,
    /// Total attempts for a rate-limited request, including the first.
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub inter_call_delay_ms: u64,
    pub provider_max_chars: usize,
    /// Number of failed chunks a job may have and still count as completed.
    pub failure_tolerance: usize,
    pub heading_pace_delta: f32,
    pub heading_pace_floor: f32,
}

/// Audio export configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub mp3_bitrate_kbps: u32,
    pub output_dir: Option<PathBuf>,
}

/// External TTS command used by the CLI
///
/// Chunk text is written to the command's stdin and WAV audio is read from
/// its stdout. Arguments may reference `{speaker}`, `{language}`, `{lang}`,
/// `{pace}`, `{wpm}`, `{sample_rate}` and `{model}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: defaults::PROVIDER_COMMAND.to_string(),
            args: defaults::PROVIDER_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: defaults::MAX_CHUNK_CHARS,
            heading_max_chars: defaults::HEADING_MAX_CHARS,
            bullet_max_chars: defaults::BULLET_MAX_CHARS,
            code_placeholder: defaults::CODE_PLACEHOLDER.to_string(),
            sentence_terminators: defaults::SENTENCE_TERMINATORS.to_vec(),
            h1: Prosody::new(800, 1.3),
            h2: Prosody::new(600, 1.2),
            h3: Prosody::new(400, 1.1),
            paragraph: Prosody::new(300, 1.0),
            bullet: Prosody::new(200, 1.0),
            code: Prosody::new(300, 1.0),
            blockquote: Prosody::new(300, 1.0),
        }
    }
}

impl SegmenterConfig {
    /// Prosody applied to chunks of `kind`.
    pub fn prosody(&self, kind: ChunkKind) -> Prosody {
        match kind {
            ChunkKind::Heading1 => self.h1,
            ChunkKind::Heading2 => self.h2,
            ChunkKind::Heading3 => self.h3,
            ChunkKind::Paragraph => self.paragraph,
            ChunkKind::Bullet => self.bullet,
            ChunkKind::Code => self.code,
            ChunkKind::Blockquote => self.blockquote,
        }
    }

    /// Maximum `char_count` of a chunk of `kind`.
    pub fn max_chars(&self, kind: ChunkKind) -> usize {
        match kind {
            ChunkKind::Heading1 | ChunkKind::Heading2 | ChunkKind::Heading3 => {
                self.heading_max_chars.min(self.max_chunk_chars)
            }
            ChunkKind::Bullet => self.bullet_max_chars.min(self.max_chunk_chars),
            ChunkKind::Paragraph | ChunkKind::Code | ChunkKind::Blockquote => {
                self.max_chunk_chars
            }
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speaker: defaults::DEFAULT_SPEAKER.to_string(),
            target_language_code: defaults::DEFAULT_LANGUAGE_CODE.to_string(),
            pace: defaults::DEFAULT_PACE,
            sample_rate: defaults::SAMPLE_RATE,
            model: defaults::DEFAULT_MODEL.to_string(),
            temperature: defaults::DEFAULT_TEMPERATURE,
            enable_preprocessing: true,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT_CALLS,
            call_timeout_ms: defaults::CALL_TIMEOUT_MS,
            retry_max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            inter_call_delay_ms: defaults::INTER_CALL_DELAY_MS,
            provider_max_chars: defaults::PROVIDER_MAX_CHARS,
            failure_tolerance: 0,
            heading_pace_delta: defaults::HEADING_PACE_DELTA,
            heading_pace_floor: defaults::HEADING_PACE_FLOOR,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp3,
            mp3_bitrate_kbps: defaults::MP3_BITRATE_KBPS,
            output_dir: None,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> MdspeakError {
    MdspeakError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MdspeakError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MdspeakError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(MdspeakError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MDSPEAK_SPEAKER → voice.speaker
    /// - MDSPEAK_LANGUAGE → voice.target_language_code
    /// - MDSPEAK_MODEL → voice.model
    /// - MDSPEAK_MAX_CHUNK_CHARS → segmenter.max_chunk_chars
    /// - MDSPEAK_OUTPUT_DIR → export.output_dir
    /// - MDSPEAK_TTS_COMMAND → provider.command
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(speaker) = std::env::var("MDSPEAK_SPEAKER")
            && !speaker.is_empty()
        {
            self.voice.speaker = speaker;
        }

        if let Ok(language) = std::env::var("MDSPEAK_LANGUAGE")
            && !language.is_empty()
        {
            self.voice.target_language_code = language;
        }

        if let Ok(model) = std::env::var("MDSPEAK_MODEL")
            && !model.is_empty()
        {
            self.voice.model = model;
        }

        if let Ok(max) = std::env::var("MDSPEAK_MAX_CHUNK_CHARS")
            && !max.is_empty()
        {
            match max.parse::<usize>() {
                Ok(value) => self.segmenter.max_chunk_chars = value,
                Err(e) => tracing::warn!(value = %max, error = %e, "ignoring MDSPEAK_MAX_CHUNK_CHARS"),
            }
        }

        if let Ok(dir) = std::env::var("MDSPEAK_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.export.output_dir = Some(PathBuf::from(dir));
        }

        if let Ok(command) = std::env::var("MDSPEAK_TTS_COMMAND")
            && !command.is_empty()
        {
            self.provider.command = command;
        }

        self
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmenter;
        if seg.max_chunk_chars == 0 {
            return Err(invalid("segmenter.max_chunk_chars", "must be positive"));
        }
        if seg.heading_max_chars == 0 || seg.bullet_max_chars == 0 {
            return Err(invalid("segmenter", "chunk limits must be positive"));
        }
        if seg.max_chunk_chars > self.synthesis.provider_max_chars {
            return Err(invalid(
                "segmenter.max_chunk_chars",
                format!(
                    "{} exceeds provider maximum of {}",
                    seg.max_chunk_chars, self.synthesis.provider_max_chars
                ),
            ));
        }
        if seg.sentence_terminators.is_empty() {
            return Err(invalid(
                "segmenter.sentence_terminators",
                "at least one terminator is required",
            ));
        }
        for kind in ChunkKind::ALL {
            let boost = seg.prosody(kind).loudness_boost;
            if !(boost.is_finite() && boost > 0.0) {
                return Err(invalid(
                    &format!("segmenter.{}.loudness_boost", kind.as_str()),
                    format!("must be a positive number, got {boost}"),
                ));
            }
        }

        let voice = &self.voice;
        if !(0.5..=2.0).contains(&voice.pace) {
            return Err(invalid("voice.pace", "must be between 0.5 and 2.0"));
        }
        if !(0.0..=1.0).contains(&voice.temperature) {
            return Err(invalid("voice.temperature", "must be between 0.0 and 1.0"));
        }
        if voice.sample_rate == 0 {
            return Err(invalid("voice.sample_rate", "must be positive"));
        }

        let synth = &self.synthesis;
        if synth.max_concurrent == 0 {
            return Err(invalid("synthesis.max_concurrent", "must be at least 1"));
        }
        if synth.retry_max_attempts == 0 {
            return Err(invalid("synthesis.retry_max_attempts", "must be at least 1"));
        }
        if synth.call_timeout_ms == 0 {
            return Err(invalid("synthesis.call_timeout_ms", "must be positive"));
        }
        if self.provider.command.trim().is_empty() {
            return Err(invalid("provider.command", "must not be empty"));
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/mdspeak/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mdspeak").join("config.toml"))
    }

    /// Serialize to a TOML document.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MdspeakError::Other(e.to_string()))
    }
}
