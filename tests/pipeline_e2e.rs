//! End-to-end narration: segment → synthesize → assemble → export, against
//! the in-process mock provider.

use mdspeak::audio::export::ExportFormat;
use mdspeak::config::Config;
use mdspeak::defaults::CODE_PLACEHOLDER;
use mdspeak::error::MdspeakError;
use mdspeak::narrator::Narrator;
use mdspeak::segment::chunk::ChunkKind;
use mdspeak::synth::job::JobStatus;
use mdspeak::tts::provider::{MockProvider, TtsProvider};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

const RATE: u32 = 8000;

fn test_config() -> Config {
    let mut config = Config::default();
    config.voice.sample_rate = RATE;
    config.synthesis.inter_call_delay_ms = 0;
    config.synthesis.retry_delay_ms = 10;
    config
}

fn narrator_with(config: Config, provider: MockProvider) -> (Narrator, Arc<MockProvider>) {
    let provider = Arc::new(provider);
    let shared: Arc<dyn TtsProvider> = provider.clone();
    let narrator = Narrator::new(config, shared).unwrap();
    (narrator, provider)
}

fn wav_duration_ms(bytes: &[u8]) -> u64 {
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    reader.duration() as u64 * 1000 / spec.sample_rate as u64
}

#[tokio::test]
async fn narrates_document_to_wav() {
    let (narrator, provider) = narrator_with(test_config(), MockProvider::new());
    let document = narrator.parse(
        "# Title\n\nA paragraph with **bold** text.\n\n```\nlet skipped = true;\n```\n\n- bullet one\n- bullet two",
    );
    let total = document.total_chunks;
    assert!(
        document
            .chunks
            .iter()
            .all(|c| !c.text.contains("let") && !c.text.contains("true"))
    );
    let code = document
        .chunks
        .iter()
        .find(|c| c.kind == ChunkKind::Code)
        .unwrap();
    assert_eq!(code.text, CODE_PLACEHOLDER);

    let snapshot = narrator.generate(document, None).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.completed_chunks, total);
    assert_eq!(snapshot.failed_chunks, 0);
    assert_eq!(provider.calls(), total);

    let exported = narrator.export(&snapshot.job_id, ExportFormat::Wav).unwrap();
    assert_eq!(exported.format, ExportFormat::Wav);
    assert_eq!(exported.sample_rate, RATE);
    assert_eq!(wav_duration_ms(&exported.bytes), exported.duration_ms);

    let summary = narrator.store().summary(&snapshot.job_id).unwrap();
    assert_eq!(summary.total_chunks, total);
    assert_eq!(summary.total_api_calls, total);
    assert_eq!(summary.successful_calls, total);
    assert_eq!(summary.output_file_size_bytes, Some(exported.size_bytes()));
}

#[tokio::test]
async fn failed_chunk_is_left_out_but_keeps_its_pause() {
    let (narrator, _) = narrator_with(
        test_config(),
        MockProvider::new().fail_when_text_contains("Second"),
    );
    let document = narrator.parse("First.\n\nSecond.\n\nThird.");
    assert_eq!(document.total_chunks, 3);

    let snapshot = narrator.generate(document, None).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.completed_chunks, 3);
    assert_eq!(snapshot.failed_chunks, 1);

    let entry = narrator.store().get(&snapshot.job_id).unwrap();
    let assembly = entry.assemble(RATE).unwrap();
    assert_eq!(assembly.included, vec![0, 2]);
    assert_eq!(assembly.skipped.len(), 1);
    assert_eq!(assembly.skipped[0].chunk_id, 1);

    // two 100ms clips and two 300ms paragraph pauses
    let exported = narrator.export(&snapshot.job_id, ExportFormat::Wav).unwrap();
    assert_eq!(exported.duration_ms, 800);

    let summary = narrator.store().summary(&snapshot.job_id).unwrap();
    assert_eq!(summary.failed_calls, 1);
    assert_eq!(summary.failed_chunks.len(), 1);
    assert_eq!(summary.failed_chunks[0].chunk_id, 1);
}

#[tokio::test]
async fn failure_within_tolerance_completes() {
    let mut config = test_config();
    config.synthesis.failure_tolerance = 1;
    let (narrator, _) = narrator_with(config, MockProvider::new().fail_when_text_contains("Second"));

    let snapshot = narrator
        .generate(narrator.parse("First.\n\nSecond.\n\nThird."), None)
        .await
        .unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.failed_chunks, 1);
}

#[tokio::test]
async fn every_chunk_failing_yields_no_audio() {
    let (narrator, _) = narrator_with(test_config(), MockProvider::new().unreachable());

    let snapshot = narrator
        .generate(narrator.parse("One.\n\nTwo."), None)
        .await
        .unwrap();
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(matches!(
        narrator.export(&snapshot.job_id, ExportFormat::Wav),
        Err(MdspeakError::NoAudio {
            failed: 2,
            total: 2
        })
    ));
}

#[tokio::test]
async fn rate_limited_call_is_retried() {
    let (narrator, provider) = narrator_with(test_config(), MockProvider::new().with_rate_limits(1));

    let snapshot = narrator
        .generate(narrator.parse("Only paragraph."), None)
        .await
        .unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(provider.calls(), 2);

    let summary = narrator.store().summary(&snapshot.job_id).unwrap();
    assert_eq!(summary.total_api_calls, 2);
    assert_eq!(summary.successful_calls, 1);
    assert_eq!(summary.failed_calls, 1);
}

#[tokio::test]
async fn concurrency_stays_within_limit() {
    let mut config = test_config();
    config.synthesis.max_concurrent = 2;
    let (narrator, provider) = narrator_with(
        config,
        MockProvider::new().with_delay(Duration::from_millis(30)),
    );

    let markdown = (0..8)
        .map(|i| format!("Paragraph number {i}."))
        .collect::<Vec<_>>()
        .join("\n\n");
    let snapshot = narrator
        .generate(narrator.parse(&markdown), None)
        .await
        .unwrap();
    assert_eq!(snapshot.completed_chunks, 8);
    assert!(provider.max_in_flight() <= 2);
    assert!(provider.max_in_flight() >= 1);

    let ids: Vec<u32> = snapshot.results.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn cancelled_job_cannot_be_exported() {
    let mut config = test_config();
    config.synthesis.max_concurrent = 1;
    let (narrator, _) = narrator_with(
        config,
        MockProvider::new().with_delay(Duration::from_millis(200)),
    );

    let started = narrator
        .start(narrator.parse("One.\n\nTwo.\n\nThree."), None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(narrator.store().cancel(&started.job_id).unwrap());

    let status = started.handle.await.unwrap();
    assert_eq!(status, JobStatus::Cancelled);
    assert!(matches!(
        narrator.export(&started.job_id, ExportFormat::Wav),
        Err(MdspeakError::Cancelled { .. })
    ));
}

#[tokio::test]
async fn subset_job_synthesizes_only_requested_chunks() {
    let (narrator, provider) = narrator_with(test_config(), MockProvider::new());
    let document = narrator.parse("One.\n\nTwo.\n\nThree.");

    let snapshot = narrator.generate(document.clone(), Some(&[2, 0])).await.unwrap();
    assert_eq!(snapshot.total_chunks, 2);
    assert_eq!(provider.calls(), 2);
    let ids: Vec<u32> = snapshot.results.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![0, 2]);

    assert!(matches!(
        narrator.start(document, Some(&[7])),
        Err(MdspeakError::ChunkNotFound { chunk_id: 7 })
    ));
}

#[cfg(feature = "mp3")]
#[tokio::test]
async fn exports_mp3() {
    let (narrator, _) = narrator_with(test_config(), MockProvider::new().with_clip_ms(500));
    let snapshot = narrator
        .generate(narrator.parse("# Heading\n\nBody text."), None)
        .await
        .unwrap();

    let exported = narrator.export(&snapshot.job_id, ExportFormat::Mp3).unwrap();
    assert_eq!(exported.format, ExportFormat::Mp3);
    assert!(!exported.bytes.is_empty());
    assert!(exported.duration_ms > 1000);
}
