//! Generation job state shared between the runner and status readers.

use super::stats::{CallStat, FailedChunk, GenerationSummary};
use crate::error::{MdspeakError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

/// Outcome of synthesizing one chunk.
///
/// `success` is true exactly when `audio` is present and `error` is not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkResult {
    pub chunk_id: u32,
    pub success: bool,
    #[serde(skip)]
    pub audio: Option<Arc<[u8]>>,
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChunkResult {
    pub fn success(chunk_id: u32, audio: Vec<u8>, duration_ms: u64) -> Self {
        Self {
            chunk_id,
            success: true,
            audio: Some(audio.into()),
            duration_ms: Some(duration_ms),
            error: None,
        }
    }

    pub fn failure(chunk_id: u32, error: impl Into<String>) -> Self {
        Self {
            chunk_id,
            success: false,
            audio: None,
            duration_ms: None,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time view of a job for status polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    pub results: Vec<ChunkResult>,
}

impl JobSnapshot {
    /// Fraction of chunks resolved, in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        if self.total_chunks == 0 {
            return 1.0;
        }
        self.completed_chunks as f64 / self.total_chunks as f64
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    assembling: bool,
}

/// Synthesis of one document (or a subset of its chunks).
///
/// Workers record results concurrently; readers may snapshot at any time.
/// `completed_chunks` is bumped only after a result is stored, so a reader
/// that sees `completed == total` also sees every result.
#[derive(Debug)]
pub struct GenerationJob {
    id: Uuid,
    chunk_ids: Vec<u32>,
    failure_tolerance: usize,
    completed: AtomicUsize,
    state: Mutex<JobState>,
    results: Mutex<BTreeMap<u32, ChunkResult>>,
    calls: Mutex<Vec<CallStat>>,
    cancel_tx: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl GenerationJob {
    /// Create a job for `chunk_ids` that tolerates `failure_tolerance` failed chunks.
    pub fn new(chunk_ids: Vec<u32>, failure_tolerance: usize) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            chunk_ids,
            failure_tolerance,
            completed: AtomicUsize::new(0),
            state: Mutex::new(JobState {
                status: JobStatus::Processing,
                assembling: false,
            }),
            results: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            cancel_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chunk_ids(&self) -> &[u32] {
        &self.chunk_ids
    }

    pub fn total_chunks(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn completed_chunks(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).status
    }

    /// Store the outcome of one chunk.
    ///
    /// Returns false if the job was cancelled or the chunk already has a
    /// result; the outcome is discarded in that case.
    pub fn record(&self, result: ChunkResult, calls: Vec<CallStat>) -> bool {
        {
            let mut results = lock(&self.results);
            if self.is_cancelled() || results.contains_key(&result.chunk_id) {
                return false;
            }
            results.insert(result.chunk_id, result);
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        lock(&self.calls).extend(calls);
        true
    }

    /// Resolve the final status once every worker has returned.
    ///
    /// Chunks without a result count as failed.
    pub fn finish(&self) -> JobStatus {
        let failures = self.failed_chunks().len();
        let mut state = lock(&self.state);
        if state.status == JobStatus::Processing {
            state.status = if failures > self.failure_tolerance {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
        }
        state.status
    }

    /// Cancel the job and discard its partial results. The completed count
    /// drops back to zero with them.
    ///
    /// Returns false if assembly has already started.
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.state);
        if state.assembling {
            return false;
        }
        state.status = JobStatus::Cancelled;
        self.cancel_tx.send_replace(true);
        drop(state);

        let mut results = lock(&self.results);
        results.clear();
        self.completed.store(0, Ordering::SeqCst);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Resolves once the job is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender lives as long as the job, so this never resolves.
            std::future::pending::<()>().await;
        }
    }

    /// Mark the job as being assembled, after which it can no longer be cancelled.
    pub fn begin_assembly(&self) -> Result<()> {
        let mut state = lock(&self.state);
        match state.status {
            JobStatus::Cancelled => Err(MdspeakError::Cancelled {
                job_id: self.id.to_string(),
            }),
            JobStatus::Processing => Err(MdspeakError::JobNotFinished {
                job_id: self.id.to_string(),
            }),
            JobStatus::Completed | JobStatus::Failed => {
                state.assembling = true;
                Ok(())
            }
        }
    }

    /// All results recorded so far, ordered by chunk id.
    pub fn results(&self) -> BTreeMap<u32, ChunkResult> {
        lock(&self.results).clone()
    }

    pub fn result(&self, chunk_id: u32) -> Option<ChunkResult> {
        lock(&self.results).get(&chunk_id).cloned()
    }

    /// Chunks of this job that failed or have no result yet.
    pub fn failed_chunks(&self) -> Vec<FailedChunk> {
        let results = lock(&self.results);
        self.chunk_ids
            .iter()
            .filter_map(|&chunk_id| match results.get(&chunk_id) {
                Some(result) if result.success => None,
                Some(result) => Some(FailedChunk {
                    chunk_id,
                    error: result.error.clone().unwrap_or_default(),
                }),
                None => Some(FailedChunk {
                    chunk_id,
                    error: "no result".to_string(),
                }),
            })
            .collect()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.status();
        let completed_chunks = self.completed_chunks();
        let results: Vec<ChunkResult> = lock(&self.results).values().cloned().collect();
        let failed_chunks = results.iter().filter(|r| !r.success).count();
        JobSnapshot {
            job_id: self.id.to_string(),
            status,
            total_chunks: self.total_chunks(),
            completed_chunks,
            failed_chunks,
            results,
        }
    }

    pub fn summary(&self) -> GenerationSummary {
        let failed = if self.status().is_terminal() {
            self.failed_chunks()
        } else {
            Vec::new()
        };
        GenerationSummary::from_calls(
            self.id.to_string(),
            self.total_chunks(),
            lock(&self.calls).clone(),
            failed,
        )
    }
}
