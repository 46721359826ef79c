//! In-memory registry of generation jobs and their exports.

use crate::audio::assembler::{Assembly, assemble};
use crate::audio::export::{ExportFormat, ExportedAudio};
use crate::error::{MdspeakError, Result};
use crate::segment::chunk::{Chunk, ParsedDocument};
use crate::synth::job::{GenerationJob, JobSnapshot};
use crate::synth::stats::GenerationSummary;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A job together with the document it was generated from.
#[derive(Debug)]
pub struct JobEntry {
    document: Arc<ParsedDocument>,
    chunks: Vec<Chunk>,
    job: Arc<GenerationJob>,
    assembly: Mutex<Option<Arc<Assembly>>>,
    exports: Mutex<HashMap<ExportFormat, Arc<ExportedAudio>>>,
}

impl JobEntry {
    pub fn document(&self) -> &ParsedDocument {
        &self.document
    }

    /// Chunks covered by the job, in id order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn job(&self) -> &Arc<GenerationJob> {
        &self.job
    }

    /// Assemble the job's audio, once.
    pub fn assemble(&self, sample_rate: u32) -> Result<Arc<Assembly>> {
        let mut cached = lock(&self.assembly);
        if let Some(assembly) = cached.as_ref() {
            return Ok(assembly.clone());
        }

        self.job.begin_assembly()?;
        let assembly = Arc::new(assemble(&self.chunks, &self.job.results(), sample_rate)?);
        tracing::info!(
            job_id = %self.job.id(),
            included = assembly.included.len(),
            skipped = assembly.skipped.len(),
            duration_ms = assembly.duration_ms(),
            "audio assembled"
        );
        *cached = Some(assembly.clone());
        Ok(assembly)
    }

    /// Encode the assembled audio as `format`, reusing an earlier export.
    pub fn export(
        &self,
        format: ExportFormat,
        sample_rate: u32,
        mp3_bitrate_kbps: u32,
    ) -> Result<Arc<ExportedAudio>> {
        if let Some(exported) = lock(&self.exports).get(&format) {
            return Ok(exported.clone());
        }

        let assembly = self.assemble(sample_rate)?;
        let exported = Arc::new(assembly.export(format, mp3_bitrate_kbps)?);
        lock(&self.exports)
            .entry(format)
            .or_insert_with(|| exported.clone());
        Ok(exported)
    }

    /// Job statistics, with output size and duration once exported.
    pub fn summary(&self) -> GenerationSummary {
        let summary = self.job.summary();
        let exports = lock(&self.exports);
        let output = exports
            .get(&ExportFormat::Mp3)
            .or_else(|| exports.get(&ExportFormat::Wav));
        match output {
            Some(exported) => summary.with_output(exported.size_bytes(), exported.duration_seconds()),
            None => summary,
        }
    }
}

/// Jobs by id.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, Arc<JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job`, generated from `chunks` of `document`.
    pub fn insert(
        &self,
        document: Arc<ParsedDocument>,
        chunks: Vec<Chunk>,
        job: Arc<GenerationJob>,
    ) -> Arc<JobEntry> {
        let entry = Arc::new(JobEntry {
            document,
            chunks,
            job,
            assembly: Mutex::new(None),
            exports: Mutex::new(HashMap::new()),
        });
        lock(&self.jobs).insert(entry.job.id(), entry.clone());
        entry
    }

    pub fn get(&self, job_id: &str) -> Result<Arc<JobEntry>> {
        let not_found = || MdspeakError::JobNotFound {
            job_id: job_id.to_string(),
        };
        let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;
        lock(&self.jobs).get(&id).cloned().ok_or_else(not_found)
    }

    pub fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.get(job_id)?.job.snapshot())
    }

    pub fn summary(&self, job_id: &str) -> Result<GenerationSummary> {
        Ok(self.get(job_id)?.summary())
    }

    /// Raw provider audio for one chunk, if it was synthesized.
    pub fn preview(&self, job_id: &str, chunk_id: u32) -> Result<Option<Arc<[u8]>>> {
        let entry = self.get(job_id)?;
        if !entry.job.chunk_ids().contains(&chunk_id) {
            return Err(MdspeakError::ChunkNotFound { chunk_id });
        }
        Ok(entry.job.result(chunk_id).and_then(|r| r.audio))
    }

    /// Cancel a job. Returns false if its audio is already being assembled.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        let entry = self.get(job_id)?;
        let cancelled = entry.job.cancel();
        if cancelled {
            tracing::info!(job_id, "job cancelled");
        }
        Ok(cancelled)
    }

    /// Drop a job and everything cached for it.
    pub fn cleanup(&self, job_id: &str) -> bool {
        let Ok(id) = Uuid::parse_str(job_id) else {
            return false;
        };
        lock(&self.jobs).remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }
}
