//! Turning chunks into audio: per-chunk synthesis, job state and scheduling.

pub mod job;
pub mod runner;
pub mod stats;
pub mod synthesizer;

pub use job::{ChunkResult, GenerationJob, JobSnapshot, JobStatus};
pub use runner::JobRunner;
pub use stats::{CallStat, FailedChunk, GenerationSummary};
pub use synthesizer::{ChunkSynthesizer, RetryPolicy, Synthesis};
