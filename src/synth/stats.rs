//! Per-call accounting for synthesis jobs.

use serde::{Deserialize, Serialize};

/// One outbound provider request, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStat {
    pub chunk_id: u32,
    /// 1 for the first try, 2 for the first retry, ...
    pub attempt: u32,
    pub characters_sent: usize,
    pub bytes_sent: usize,
    pub bytes_received: usize,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A chunk that produced no audio and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedChunk {
    pub chunk_id: u32,
    pub error: String,
}

/// Aggregated statistics for a job, suitable for JSON reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub job_id: String,
    pub total_chunks: usize,
    pub total_api_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub total_characters_sent: usize,
    pub total_bytes_sent: usize,
    pub total_bytes_received: usize,
    pub total_latency_ms: u64,
    pub average_latency_ms: f64,
    pub failed_chunks: Vec<FailedChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_duration_seconds: Option<f64>,
    pub calls: Vec<CallStat>,
}

impl GenerationSummary {
    /// Summarize `calls`, sorted by chunk id and attempt.
    pub fn from_calls(
        job_id: impl Into<String>,
        total_chunks: usize,
        mut calls: Vec<CallStat>,
        failed_chunks: Vec<FailedChunk>,
    ) -> Self {
        calls.sort_by_key(|c| (c.chunk_id, c.attempt));

        let successful_calls = calls.iter().filter(|c| c.success).count();
        let total_latency_ms: u64 = calls.iter().map(|c| c.latency_ms).sum();
        let average_latency_ms = if calls.is_empty() {
            0.0
        } else {
            total_latency_ms as f64 / calls.len() as f64
        };

        Self {
            job_id: job_id.into(),
            total_chunks,
            total_api_calls: calls.len(),
            successful_calls,
            failed_calls: calls.len() - successful_calls,
            total_characters_sent: calls.iter().map(|c| c.characters_sent).sum(),
            total_bytes_sent: calls.iter().map(|c| c.bytes_sent).sum(),
            total_bytes_received: calls.iter().map(|c| c.bytes_received).sum(),
            total_latency_ms,
            average_latency_ms,
            failed_chunks,
            output_file_size_bytes: None,
            output_duration_seconds: None,
            calls,
        }
    }

    /// Attach size and duration of an exported file.
    pub fn with_output(mut self, size_bytes: u64, duration_seconds: f64) -> Self {
        self.output_file_size_bytes = Some(size_bytes);
        self.output_duration_seconds = Some(duration_seconds);
        self
    }
}
