//! Command implementations for the mdspeak binary.
//!
//! Orchestrates the complete narration flow:
//! read markdown → segment → synthesize → assemble → export

use crate::cli::SpeakArgs;
use crate::config::Config;
use crate::error::{MdspeakError, Result};
use crate::narrator::Narrator;
use crate::synth::job::{JobSnapshot, JobStatus};
use crate::tts::command::CommandProvider;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

fn narrator_for(config: Config) -> Result<Narrator> {
    let provider = Arc::new(CommandProvider::from_config(&config.provider));
    Narrator::new(config, provider)
}

/// Run the parse command: segment a markdown file and print the document
/// as JSON on stdout.
pub fn run_parse_command(
    mut config: Config,
    file: &Path,
    max_chunk_chars: Option<usize>,
) -> Result<()> {
    if let Some(max) = max_chunk_chars {
        config.segmenter.max_chunk_chars = max;
    }
    let narrator = narrator_for(config)?;
    let document = narrator.parse_file(file)?;
    let json = serde_json::to_string_pretty(&document)
        .map_err(|e| MdspeakError::Other(format!("Failed to serialize document: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Copy command-line overrides into the configuration.
fn apply_overrides(config: &mut Config, args: &SpeakArgs) {
    if let Some(max) = args.max_chunk_chars {
        config.segmenter.max_chunk_chars = max;
    }
    if let Some(speaker) = &args.speaker {
        config.voice.speaker = speaker.clone();
    }
    if let Some(language) = &args.language {
        config.voice.target_language_code = language.clone();
    }
    if let Some(pace) = args.pace {
        config.voice.pace = pace;
    }
    if let Some(concurrency) = args.concurrency {
        config.synthesis.max_concurrent = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.synthesis.call_timeout_ms = timeout;
    }
    if let Some(format) = args.format {
        config.export.format = format;
    }
}

/// Run the speak command: narrate a markdown file into one audio file.
///
/// Ctrl+C cancels the job. Chunks that fail are skipped in the output and
/// reported on stderr; the output path is printed on stdout.
pub async fn run_speak_command(
    mut config: Config,
    args: SpeakArgs,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    apply_overrides(&mut config, &args);
    let format = config.export.format;
    let narrator = narrator_for(config)?;

    let document = narrator.parse_file(&args.file)?;
    if document.total_chunks == 0 {
        return Err(MdspeakError::Other(format!(
            "No speakable content in {}",
            args.file.display()
        )));
    }

    if !quiet {
        eprintln!(
            "Narrating {} ({} chunks, {} characters) with '{}'...",
            args.file.display(),
            document.total_chunks,
            document.total_characters,
            narrator.config().provider.command
        );
    }

    let started = narrator.start(document, args.only.as_deref())?;
    let job_id = started.job_id;
    let mut handle = started.handle;
    let show_progress = !quiet && std::io::stderr().is_terminal();
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);

    let status = loop {
        tokio::select! {
            joined = &mut handle => {
                break joined
                    .map_err(|e| MdspeakError::Other(format!("Generation task failed: {}", e)))?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| MdspeakError::Other(format!("Failed to wait for Ctrl+C: {}", e)))?;
                if !quiet {
                    eprintln!("\nCancelling...");
                }
                narrator.store().cancel(&job_id)?;
            }
            _ = ticker.tick(), if show_progress => {
                let snapshot = narrator.store().status(&job_id)?;
                eprint!("\r{}", progress_line(&snapshot));
            }
        }
    };
    if show_progress {
        eprintln!();
    }

    let snapshot = narrator.store().status(&job_id)?;
    match status {
        JobStatus::Cancelled => return Err(MdspeakError::Cancelled { job_id }),
        JobStatus::Failed if !quiet => {
            eprintln!(
                "{}",
                format!(
                    "{} of {} chunks failed; they are left out of the audio.",
                    snapshot.failed_chunks, snapshot.total_chunks
                )
                .yellow()
            );
        }
        _ => {}
    }
    if !quiet {
        for result in snapshot.results.iter().filter(|r| !r.success) {
            eprintln!(
                "  {} chunk {}: {}",
                "✗".red(),
                result.chunk_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let path = narrator.write_export(&job_id, format, args.output.as_deref())?;
    let summary = narrator.store().summary(&job_id)?;

    if let Some(summary_path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| MdspeakError::Other(format!("Failed to serialize summary: {}", e)))?;
        std::fs::write(summary_path, json)?;
    }

    if !quiet {
        let message = format!(
            "Wrote {} ({:.1}s, {} bytes, {} calls)",
            path.display(),
            summary.output_duration_seconds.unwrap_or_default(),
            summary.output_file_size_bytes.unwrap_or_default(),
            summary.total_api_calls
        );
        eprintln!("{}", message.green());
        if verbosity >= 1 {
            eprintln!(
                "  sent {} chars / {} bytes, received {} bytes, avg latency {:.0}ms",
                summary.total_characters_sent,
                summary.total_bytes_sent,
                summary.total_bytes_received,
                summary.average_latency_ms
            );
        }
    }
    println!("{}", path.display());
    Ok(())
}

fn progress_line(snapshot: &JobSnapshot) -> String {
    let mut line = format!(
        "  {}/{} chunks ({:.0}%)",
        snapshot.completed_chunks,
        snapshot.total_chunks,
        snapshot.progress() * 100.0
    );
    if snapshot.failed_chunks > 0 {
        line.push_str(&format!(", {} failed", snapshot.failed_chunks));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::export::ExportFormat;
    use std::path::PathBuf;

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = SpeakArgs {
            file: PathBuf::from("doc.md"),
            format: Some(ExportFormat::Wav),
            speaker: Some("arvind".to_string()),
            pace: Some(1.3),
            concurrency: Some(5),
            timeout: Some(10_000),
            max_chunk_chars: Some(300),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.export.format, ExportFormat::Wav);
        assert_eq!(config.voice.speaker, "arvind");
        assert_eq!(config.voice.pace, 1.3);
        assert_eq!(config.synthesis.max_concurrent, 5);
        assert_eq!(config.synthesis.call_timeout_ms, 10_000);
        assert_eq!(config.segmenter.max_chunk_chars, 300);
    }

    #[test]
    fn test_apply_overrides_keeps_config_when_unset() {
        let mut config = Config::default();
        let before = config.clone();
        apply_overrides(&mut config, &SpeakArgs::default());
        assert_eq!(config, before);
    }

    #[test]
    fn test_progress_line() {
        let snapshot = JobSnapshot {
            job_id: "x".to_string(),
            status: JobStatus::Processing,
            total_chunks: 4,
            completed_chunks: 2,
            failed_chunks: 1,
            results: Vec::new(),
        };
        assert_eq!(progress_line(&snapshot), "  2/4 chunks (50%), 1 failed");
    }

    #[test]
    fn test_parse_command_missing_file() {
        let result = run_parse_command(Config::default(), Path::new("/nonexistent/doc.md"), None);
        assert!(matches!(result, Err(MdspeakError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_speak_command_rejects_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.md");
        std::fs::write(&file, "\n\n").unwrap();
        let args = SpeakArgs {
            file,
            ..Default::default()
        };
        let result = run_speak_command(Config::default(), args, true, 0).await;
        assert!(matches!(result, Err(MdspeakError::Other(_))));
    }
}
