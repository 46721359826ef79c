//! Synthesis of a single chunk: request building, timeout and retry.

use super::job::ChunkResult;
use super::stats::CallStat;
use crate::audio::segment::wav_duration_ms;
use crate::config::{SynthesisConfig, VoiceSettings};
use crate::segment::chunk::{Chunk, ChunkKind};
use crate::tts::provider::{ProviderError, SpeechRequest, TtsProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// When to re-submit a failed request.
///
/// Only rate-limit responses are retried, after a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        error.is_rate_limited() && attempt < self.max_attempts
    }
}

/// Outcome of one chunk with the provider calls it took.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub result: ChunkResult,
    pub calls: Vec<CallStat>,
}

impl Synthesis {
    /// A failure that never reached the provider.
    pub fn failed(chunk_id: u32, error: impl Into<String>) -> Self {
        Self {
            result: ChunkResult::failure(chunk_id, error),
            calls: Vec::new(),
        }
    }
}

/// Turns chunks into audio through a provider.
pub struct ChunkSynthesizer {
    provider: Arc<dyn TtsProvider>,
    voice: VoiceSettings,
    retry: RetryPolicy,
    call_timeout: Duration,
    provider_max_chars: usize,
    heading_pace_delta: f32,
    heading_pace_floor: f32,
}

impl ChunkSynthesizer {
    pub fn new(
        provider: Arc<dyn TtsProvider>,
        voice: VoiceSettings,
        config: &SynthesisConfig,
    ) -> Self {
        Self {
            provider,
            voice,
            retry: RetryPolicy::from_config(config),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            provider_max_chars: config.provider_max_chars,
            heading_pace_delta: config.heading_pace_delta,
            heading_pace_floor: config.heading_pace_floor,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn voice(&self) -> &VoiceSettings {
        &self.voice
    }

    /// Pace for chunks of `kind`.
    ///
    /// Headings are slowed by the configured delta but never below the
    /// floor, and never made faster than the base pace.
    pub fn pace_for(&self, kind: ChunkKind) -> f32 {
        let base = self.voice.pace;
        if !kind.is_heading() {
            return base;
        }
        (base - self.heading_pace_delta).max(self.heading_pace_floor.min(base))
    }

    pub fn request_for(&self, chunk: &Chunk) -> SpeechRequest {
        SpeechRequest {
            text: chunk.text.clone(),
            target_language_code: self.voice.target_language_code.clone(),
            speaker: self.voice.speaker.clone(),
            pace: self.pace_for(chunk.kind),
            sample_rate: self.voice.sample_rate,
            model: self.voice.model.clone(),
            temperature: self.voice.temperature,
            enable_preprocessing: self.voice.enable_preprocessing,
        }
    }

    /// Synthesize one chunk. Never fails: errors end up in the result.
    pub async fn synthesize(&self, chunk: &Chunk) -> Synthesis {
        if chunk.char_count > self.provider_max_chars {
            let error = ProviderError::InputTooLong {
                chars: chunk.char_count,
                max: self.provider_max_chars,
            };
            tracing::warn!(chunk_id = chunk.id, %error, "chunk not sent");
            return Synthesis::failed(chunk.id, error.to_string());
        }

        let request = self.request_for(chunk);
        let bytes_sent = request.payload_len();
        let mut calls = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                self.call_timeout,
                self.provider.synthesize(&request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout {
                    after_ms: self.call_timeout.as_millis() as u64,
                }),
            };
            let outcome = outcome.and_then(|speech| {
                if speech.audio.is_empty() {
                    Err(ProviderError::EmptyAudio)
                } else {
                    Ok(speech)
                }
            });
            let latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(speech) => {
                    calls.push(CallStat {
                        chunk_id: chunk.id,
                        attempt,
                        characters_sent: chunk.char_count,
                        bytes_sent,
                        bytes_received: speech.bytes_received,
                        latency_ms,
                        success: true,
                        error: None,
                    });
                    let duration_ms = self.duration_ms(&speech.audio);
                    tracing::debug!(
                        chunk_id = chunk.id,
                        attempt,
                        latency_ms,
                        bytes = speech.audio.len(),
                        "chunk synthesized"
                    );
                    return Synthesis {
                        result: ChunkResult::success(chunk.id, speech.audio, duration_ms),
                        calls,
                    };
                }
                Err(error) => {
                    calls.push(CallStat {
                        chunk_id: chunk.id,
                        attempt,
                        characters_sent: chunk.char_count,
                        bytes_sent,
                        bytes_received: 0,
                        latency_ms,
                        success: false,
                        error: Some(error.to_string()),
                    });

                    if self.retry.should_retry(&error, attempt) {
                        tracing::warn!(
                            chunk_id = chunk.id,
                            attempt,
                            delay_ms = self.retry.delay.as_millis() as u64,
                            "rate limited, retrying"
                        );
                        tokio::time::sleep(self.retry.delay).await;
                        continue;
                    }

                    tracing::warn!(chunk_id = chunk.id, attempt, %error, "chunk failed");
                    return Synthesis {
                        result: ChunkResult::failure(chunk.id, error.to_string()),
                        calls,
                    };
                }
            }
        }
    }

    /// Duration from the WAV header, else estimated from the byte count.
    fn duration_ms(&self, audio: &[u8]) -> u64 {
        wav_duration_ms(audio).unwrap_or_else(|| {
            let bytes_per_ms = (self.voice.sample_rate as u64 * 2 / 1000).max(1);
            audio.len() as u64 / bytes_per_ms
        })
    }
}
