use crate::audio::export::encode_wav;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a TTS provider for one request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Rate limited by provider (429)")]
    RateLimited,

    #[error("API error: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Text of {chars} characters exceeds provider limit of {max}")]
    InputTooLong { chars: usize, max: usize },

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("No audio in response")]
    EmptyAudio,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Whether the request may succeed if re-submitted after a delay.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
            || matches!(self, ProviderError::Http { status: 429, .. })
    }
}

/// One synthesis request: the chunk text plus voice parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub text: String,
    pub target_language_code: String,
    pub speaker: String,
    pub pace: f32,
    #[serde(rename = "speech_sample_rate")]
    pub sample_rate: u32,
    pub model: String,
    pub temperature: f32,
    pub enable_preprocessing: bool,
}

impl SpeechRequest {
    /// Size of the request as sent over the wire.
    pub fn payload_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(self.text.len())
    }
}

/// Audio returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub audio: Vec<u8>,
    /// Bytes received on the wire, which may differ from `audio.len()`
    /// when the provider wraps audio in an envelope (e.g. base64 JSON).
    pub bytes_received: usize,
}

impl SpeechAudio {
    pub fn new(audio: Vec<u8>) -> Self {
        let bytes_received = audio.len();
        Self {
            audio,
            bytes_received,
        }
    }
}

/// Trait for text-to-speech providers.
///
/// This trait allows swapping implementations (network client, local
/// command, mock).
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Turn text plus voice settings into encoded audio bytes.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, ProviderError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Encode mono 16-bit samples as an in-memory WAV file.
///
/// Returns an empty buffer if the samples cannot be encoded, which
/// downstream decoding reports as a failed chunk.
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    encode_wav(samples, sample_rate).unwrap_or_default()
}

/// Mock provider for testing.
///
/// Returns a short constant-amplitude WAV clip per request and can be
/// scripted to fail, rate-limit or stall for particular texts.
#[derive(Debug, Default)]
pub struct MockProvider {
    clip_ms: u32,
    amplitude: i16,
    fixed_audio: Option<Vec<u8>>,
    fail_texts: Vec<String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    rate_limited_calls: AtomicU32,
    unreachable: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock returning 100ms clips.
    pub fn new() -> Self {
        Self {
            clip_ms: 100,
            amplitude: 8000,
            ..Self::default()
        }
    }

    /// Length of the clip returned for every successful request.
    pub fn with_clip_ms(mut self, clip_ms: u32) -> Self {
        self.clip_ms = clip_ms;
        self
    }

    /// Sample value of the returned clip.
    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Return these exact bytes instead of a generated clip.
    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.fixed_audio = Some(audio);
        self
    }

    /// Fail every request whose text contains `needle`.
    pub fn fail_when_text_contains(mut self, needle: &str) -> Self {
        self.fail_texts.push(needle.to_string());
        self
    }

    /// Delay requests whose text contains `needle`.
    pub fn delay_when_text_contains(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.insert(needle.to_string(), delay);
        self
    }

    /// Delay every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Answer the next `count` requests with a rate-limit error.
    pub fn with_rate_limits(self, count: u32) -> Self {
        self.rate_limited_calls.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every request as if the provider could not be reached.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Number of requests received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn delay_for(&self, text: &str) -> Duration {
        self.delays
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map_or(self.default_delay, |(_, delay)| *delay)
    }

    fn respond(&self, request: &SpeechRequest) -> Result<SpeechAudio, ProviderError> {
        if self.unreachable {
            return Err(ProviderError::Unavailable {
                message: "connection refused".to_string(),
            });
        }

        let limited = self
            .rate_limited_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(ProviderError::RateLimited);
        }

        if self
            .fail_texts
            .iter()
            .any(|needle| request.text.contains(needle.as_str()))
        {
            return Err(ProviderError::Http {
                status: 500,
                body: "mock synthesis failure".to_string(),
            });
        }

        let audio = match &self.fixed_audio {
            Some(bytes) => bytes.clone(),
            None => {
                let len = (request.sample_rate as u64 * self.clip_ms as u64 / 1000) as usize;
                wav_bytes(&vec![self.amplitude; len], request.sample_rate)
            }
        };
        Ok(SpeechAudio::new(audio))
    }
}

/// Counts a request as in flight until dropped, so a call abandoned by
/// a timeout or an aborted task is released too.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    current: usize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TtsProvider for MockProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight::enter(&self.in_flight);
        self.max_in_flight.fetch_max(guard.current, Ordering::SeqCst);

        let delay = self.delay_for(&request.text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.respond(request)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
