//! Error types for mdspeak.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdspeakError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Document errors
    #[error("Markdown source not found at {path}")]
    SourceNotFound { path: String },

    // Job errors
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Job {job_id} is still processing")]
    JobNotFinished { job_id: String },

    #[error("Chunk {chunk_id} not found in document")]
    ChunkNotFound { chunk_id: u32 },

    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("No chunk produced audio ({failed} of {total} failed)")]
    NoAudio { failed: usize, total: usize },

    // Audio errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Audio export failed: {message}")]
    AudioExport { message: String },

    #[error("Unsupported export format: {format}")]
    ExportUnsupported { format: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MdspeakError>;
