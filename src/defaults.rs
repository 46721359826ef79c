//! Default configuration constants for mdspeak.
//!
//! Shared by the config layer, the segmenter and the synthesis runner so the
//! same numbers are used whether or not a config file is present.

/// Default upper bound for paragraph-type chunks, in characters.
pub const MAX_CHUNK_CHARS: usize = 2000;

/// Upper bound for heading chunks. Headings longer than this are truncated.
pub const HEADING_MAX_CHARS: usize = 500;

/// Upper bound for a single bullet chunk before it is split.
pub const BULLET_MAX_CHARS: usize = 1000;

/// Maximum input length accepted by the TTS provider, in characters.
///
/// Chunk limits must never exceed this; `Config::validate` enforces it.
pub const PROVIDER_MAX_CHARS: usize = 2500;

/// Spoken in place of a fenced code block.
pub const CODE_PLACEHOLDER: &str = "Code block skipped.";

/// Characters that end a sentence. `।` is the Devanagari full stop.
pub const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '।'];

/// Assumed speaking rate used for duration estimates.
///
/// Roughly 150 words per minute at 5 characters per word.
pub const CHARS_PER_SECOND: f64 = 12.5;

/// Default output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48000;

/// Default speaker id.
pub const DEFAULT_SPEAKER: &str = "shubh";

/// Default target language code.
pub const DEFAULT_LANGUAGE_CODE: &str = "hi-IN";

/// Default provider model id.
pub const DEFAULT_MODEL: &str = "bulbul:v3";

/// Default speaking pace (1.0 = provider default speed).
pub const DEFAULT_PACE: f32 = 1.1;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// How much slower headings are spoken than body text.
pub const HEADING_PACE_DELTA: f32 = 0.1;

/// Headings are never slowed below this pace.
pub const HEADING_PACE_FLOOR: f32 = 0.9;

/// Maximum synthesis calls in flight for one job.
pub const MAX_CONCURRENT_CALLS: usize = 3;

/// Per-call timeout for a single synthesis request, in milliseconds.
pub const CALL_TIMEOUT_MS: u64 = 60_000;

/// Total attempts for a rate-limited request (first try plus one retry).
pub const RETRY_MAX_ATTEMPTS: u32 = 2;

/// Fixed delay before retrying a rate-limited request, in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Delay between successive calls on the same worker slot, in milliseconds.
pub const INTER_CALL_DELAY_MS: u64 = 200;

/// MP3 export bitrate in kbps.
pub const MP3_BITRATE_KBPS: u32 = 192;

/// TTS command used by the CLI when no provider is configured.
pub const PROVIDER_COMMAND: &str = "espeak-ng";

/// Arguments for `PROVIDER_COMMAND`; placeholders are filled per request.
pub const PROVIDER_ARGS: &[&str] = &["--stdout", "-v", "{lang}", "-s", "{wpm}", "--stdin"];

/// Words per minute at pace 1.0, for commands that take a rate in wpm.
pub const BASE_WORDS_PER_MINUTE: f32 = 175.0;
