//! mdspeak - Narrate markdown documents
//!
//! Splits structured markdown into speakable chunks, synthesizes each one
//! through a text-to-speech provider and assembles a single audio file.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod narrator;
pub mod segment;
pub mod store;
pub mod synth;
pub mod tts;

// Composition root for the binary
#[cfg(feature = "cli")]
pub mod app;

// Core traits and services
pub use narrator::{Narrator, StartedJob};
pub use store::{JobEntry, JobStore};
pub use tts::provider::TtsProvider;

// Segmentation
pub use segment::Segmenter;
pub use segment::chunk::{Chunk, ChunkKind, ParsedDocument};

// Synthesis
pub use synth::{GenerationJob, GenerationSummary, JobSnapshot, JobStatus};

// Audio
pub use audio::{Assembly, ExportFormat, ExportedAudio};

// Error handling
pub use error::{MdspeakError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.0.1+abc1234"` when git hash is available, `"0.0.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
