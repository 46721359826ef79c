//! Bounded-concurrency execution of a generation job.

use super::job::{GenerationJob, JobStatus};
use super::synthesizer::{ChunkSynthesizer, Synthesis};
use crate::config::SynthesisConfig;
use crate::segment::chunk::Chunk;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};

/// Aborts the wrapped task when dropped, so cancelling a worker also
/// abandons its in-flight provider call.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs every chunk of a job through the synthesizer, at most
/// `max_concurrent` at a time.
pub struct JobRunner {
    synthesizer: Arc<ChunkSynthesizer>,
    max_concurrent: usize,
    inter_call_delay: Duration,
}

impl JobRunner {
    pub fn new(synthesizer: ChunkSynthesizer, config: &SynthesisConfig) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            max_concurrent: config.max_concurrent.max(1),
            inter_call_delay: Duration::from_millis(config.inter_call_delay_ms),
        }
    }

    pub fn synthesizer(&self) -> &ChunkSynthesizer {
        &self.synthesizer
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Synthesize `chunks` into `job` and return its final status.
    ///
    /// Every chunk gets a result unless the job is cancelled, in which case
    /// pending work is abandoned and the status is `Cancelled`.
    pub async fn run(&self, job: Arc<GenerationJob>, chunks: Vec<Chunk>) -> JobStatus {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers = JoinSet::new();

        tracing::info!(
            job_id = %job.id(),
            chunks = chunks.len(),
            max_concurrent = self.max_concurrent,
            provider = self.synthesizer.provider_name(),
            "generation started"
        );

        for chunk in chunks {
            let permit = tokio::select! {
                biased;
                _ = job.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                break;
            };

            let synthesizer = self.synthesizer.clone();
            let job = job.clone();
            let delay = self.inter_call_delay;

            workers.spawn(async move {
                let _permit = permit; // Hold permit until done

                let chunk_id = chunk.id;
                let call = tokio::spawn(async move { synthesizer.synthesize(&chunk).await });
                let _abort = AbortOnDrop(call.abort_handle());
                let synthesis = match call.await {
                    Ok(synthesis) => synthesis,
                    Err(e) => {
                        tracing::error!(chunk_id, error = %e, "synthesis task panicked");
                        Synthesis::failed(chunk_id, format!("Synthesis task panicked: {}", e))
                    }
                };
                job.record(synthesis.result, synthesis.calls);

                // Spacing between calls on the same slot
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = job.cancelled() => {
                    workers.abort_all();
                    break;
                }
                joined = workers.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
            }
        }

        let status = job.finish();
        let snapshot = job.snapshot();
        tracing::info!(
            job_id = %job.id(),
            status = status.as_str(),
            completed = snapshot.completed_chunks,
            failed = snapshot.failed_chunks,
            "generation finished"
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Prosody, VoiceSettings};
    use crate::segment::chunk::ChunkKind;
    use crate::tts::provider::{MockProvider, TtsProvider};

    fn chunks(n: u32) -> Vec<Chunk> {
        (0..n)
            .map(|id| {
                let text = format!("Chunk number {id}.");
                Chunk::new(id, ChunkKind::Paragraph, text.clone(), text, Prosody::new(300, 1.0))
            })
            .collect()
    }

    fn runner(provider: Arc<MockProvider>, max_concurrent: usize) -> JobRunner {
        let config = SynthesisConfig {
            max_concurrent,
            inter_call_delay_ms: 0,
            retry_delay_ms: 5,
            ..SynthesisConfig::default()
        };
        let voice = VoiceSettings {
            sample_rate: 8000,
            ..VoiceSettings::default()
        };
        let provider: Arc<dyn TtsProvider> = provider;
        JobRunner::new(ChunkSynthesizer::new(provider, voice, &config), &config)
    }

    fn job_for(chunks: &[Chunk], tolerance: usize) -> Arc<GenerationJob> {
        Arc::new(GenerationJob::new(
            chunks.iter().map(|c| c.id).collect(),
            tolerance,
        ))
    }

    #[tokio::test]
    async fn test_all_chunks_complete() {
        let provider = Arc::new(MockProvider::new());
        let chunks = chunks(5);
        let job = job_for(&chunks, 0);

        let status = runner(provider.clone(), 3).run(job.clone(), chunks).await;

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(job.completed_chunks(), 5);
        assert!(job.results().values().all(|r| r.success));
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(20)));
        let chunks = chunks(10);
        let job = job_for(&chunks, 0);

        runner(provider.clone(), 3).run(job, chunks).await;

        let peak = provider.max_in_flight();
        assert!(peak <= 3, "peak in-flight calls {peak} exceeded limit");
        assert!(peak >= 2, "expected calls to overlap, peak was {peak}");
    }

    #[tokio::test]
    async fn test_sequential_when_limit_is_one() {
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(5)));
        let chunks = chunks(4);
        let job = job_for(&chunks, 0);

        runner(provider.clone(), 1).run(job, chunks).await;
        assert_eq!(provider.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_results_ordered_despite_completion_order() {
        // Chunk 0 finishes last.
        let provider = Arc::new(
            MockProvider::new()
                .delay_when_text_contains("number 0.", Duration::from_millis(60))
                .delay_when_text_contains("number 1.", Duration::from_millis(30)),
        );
        let chunks = chunks(3);
        let job = job_for(&chunks, 0);

        runner(provider, 3).run(job.clone(), chunks).await;

        let ids: Vec<u32> = job.results().keys().copied().collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_one_failure_fails_job_with_zero_tolerance() {
        let provider = Arc::new(MockProvider::new().fail_when_text_contains("number 1."));
        let chunks = chunks(3);
        let job = job_for(&chunks, 0);

        let status = runner(provider, 2).run(job.clone(), chunks).await;

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(job.completed_chunks(), 3);
        assert_eq!(job.failed_chunks().len(), 1);
        assert_eq!(job.failed_chunks()[0].chunk_id, 1);
    }

    #[tokio::test]
    async fn test_failure_within_tolerance_completes() {
        let provider = Arc::new(MockProvider::new().fail_when_text_contains("number 1."));
        let chunks = chunks(3);
        let job = job_for(&chunks, 1);

        let status = runner(provider, 2).run(job, chunks).await;
        assert_eq!(status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_rate_limited_chunk_recovers_in_job() {
        let provider = Arc::new(MockProvider::new().with_rate_limits(1));
        let chunks = chunks(2);
        let job = job_for(&chunks, 0);

        let status = runner(provider.clone(), 1).run(job.clone(), chunks).await;

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(provider.calls(), 3);
        assert_eq!(job.summary().total_api_calls, 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_work() {
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(200)));
        let chunks = chunks(6);
        let job = job_for(&chunks, 0);

        let handle = {
            let runner = runner(provider.clone(), 2);
            let job = job.clone();
            tokio::spawn(async move { runner.run(job, chunks).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(job.cancel());

        let status = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, JobStatus::Cancelled);
        assert!(job.results().is_empty());
        assert!(provider.calls() <= 2, "pending chunks should not be sent");
    }

    #[tokio::test]
    async fn test_empty_job_completes() {
        let provider = Arc::new(MockProvider::new());
        let job = job_for(&[], 0);
        let status = runner(provider, 3).run(job.clone(), Vec::new()).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(job.snapshot().progress(), 1.0);
    }
}
