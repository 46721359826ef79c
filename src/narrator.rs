//! Markdown-to-audio service: parse, generate, export.
//!
//! Ties the segmenter, the job runner and the job store together behind
//! one handle that can be shared across tasks.

use crate::audio::export::{ExportFormat, ExportedAudio};
use crate::config::Config;
use crate::error::{MdspeakError, Result};
use crate::segment::Segmenter;
use crate::segment::chunk::{Chunk, ParsedDocument};
use crate::store::JobStore;
use crate::synth::job::{GenerationJob, JobSnapshot, JobStatus};
use crate::synth::runner::JobRunner;
use crate::synth::synthesizer::ChunkSynthesizer;
use crate::tts::provider::TtsProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;

/// A job that has been registered and is running in the background.
#[derive(Debug)]
pub struct StartedJob {
    pub job_id: String,
    pub handle: JoinHandle<JobStatus>,
}

pub struct Narrator {
    config: Config,
    segmenter: Segmenter,
    runner: Arc<JobRunner>,
    store: Arc<JobStore>,
}

impl Narrator {
    /// Build a narrator speaking through `provider`.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: Config, provider: Arc<dyn TtsProvider>) -> Result<Self> {
        config.validate()?;
        let synthesizer = ChunkSynthesizer::new(provider, config.voice.clone(), &config.synthesis);
        let runner = JobRunner::new(synthesizer, &config.synthesis);
        Ok(Self {
            segmenter: Segmenter::new(config.segmenter.clone()),
            runner: Arc::new(runner),
            store: Arc::new(JobStore::new()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Segment markdown text.
    pub fn parse(&self, markdown: &str) -> ParsedDocument {
        self.segmenter.segment(markdown)
    }

    /// Segment markdown text with a one-off chunk limit.
    pub fn parse_with_limit(&self, markdown: &str, max_chunk_chars: usize) -> ParsedDocument {
        self.segmenter
            .clone()
            .with_max_chunk_chars(max_chunk_chars)
            .segment(markdown)
    }

    /// Read and segment a markdown file.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedDocument> {
        let markdown = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MdspeakError::SourceNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MdspeakError::Io(e)
            }
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.md".to_string());
        Ok(self
            .parse(&markdown)
            .with_source(filename, self.config.voice.target_language_code.clone()))
    }

    /// Register a job for `document` and start it in the background.
    ///
    /// `only` restricts the job to the given chunk ids, e.g. to retry the
    /// chunks that failed in an earlier job.
    pub fn start(&self, document: ParsedDocument, only: Option<&[u32]>) -> Result<StartedJob> {
        let chunks = select_chunks(&document, only)?;
        let job = Arc::new(GenerationJob::new(
            chunks.iter().map(|c| c.id).collect(),
            self.config.synthesis.failure_tolerance,
        ));
        let job_id = job.id().to_string();
        self.store
            .insert(Arc::new(document), chunks.clone(), job.clone());

        let runner = self.runner.clone();
        let handle = tokio::spawn(async move { runner.run(job, chunks).await });
        Ok(StartedJob { job_id, handle })
    }

    /// Run a job to completion and return its final snapshot.
    pub async fn generate(
        &self,
        document: ParsedDocument,
        only: Option<&[u32]>,
    ) -> Result<JobSnapshot> {
        let started = self.start(document, only)?;
        started
            .handle
            .await
            .map_err(|e| MdspeakError::Other(format!("Generation task failed: {}", e)))?;
        self.store.status(&started.job_id)
    }

    /// Start a new job for the chunks that failed in `job_id`.
    pub fn retry_failed(&self, job_id: &str) -> Result<StartedJob> {
        let entry = self.store.get(job_id)?;
        if !entry.job().status().is_terminal() {
            return Err(MdspeakError::JobNotFinished {
                job_id: job_id.to_string(),
            });
        }
        let failed: Vec<u32> = entry
            .job()
            .failed_chunks()
            .into_iter()
            .map(|f| f.chunk_id)
            .collect();
        self.start(entry.document().clone(), Some(&failed))
    }

    /// Assemble and encode a finished job.
    pub fn export(&self, job_id: &str, format: ExportFormat) -> Result<Arc<ExportedAudio>> {
        self.store.get(job_id)?.export(
            format,
            self.config.voice.sample_rate,
            self.config.export.mp3_bitrate_kbps,
        )
    }

    /// Export a finished job and write it to `path`, or to a timestamped
    /// file in the configured output directory.
    pub fn write_export(
        &self,
        job_id: &str,
        format: ExportFormat,
        path: Option<&Path>,
    ) -> Result<PathBuf> {
        let exported = self.export(job_id, format)?;
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let entry = self.store.get(job_id)?;
                let dir = self
                    .config
                    .export
                    .output_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("."));
                dir.join(output_file_name(entry.document().stem(), format, SystemTime::now()))
            }
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &exported.bytes)?;
        tracing::info!(path = %path.display(), size_bytes = exported.size_bytes(), "audio written");
        Ok(path)
    }
}

/// Chunks of `document` selected by `only`, in id order.
fn select_chunks(document: &ParsedDocument, only: Option<&[u32]>) -> Result<Vec<Chunk>> {
    let Some(ids) = only else {
        return Ok(document.chunks.clone());
    };
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .map(|id| {
            document
                .chunk(id)
                .cloned()
                .ok_or(MdspeakError::ChunkNotFound { chunk_id: id })
        })
        .collect()
}

/// `<stem>_<YYYYmmdd_HHMMSS>.<ext>`, in UTC.
pub fn output_file_name(stem: &str, format: ExportFormat, now: SystemTime) -> String {
    let stamp = humantime::format_rfc3339_seconds(now).to_string();
    let digits: String = stamp.chars().filter(char::is_ascii_digit).collect();
    let date = digits.get(..8).unwrap_or("00000000");
    let time = digits.get(8..14).unwrap_or("000000");
    format!("{}_{}_{}.{}", stem, date, time, format.extension())
}
