//! Local TTS through an external command.
//!
//! The chunk text is written to the command's stdin and the command must
//! print a WAV file on stdout (`espeak-ng --stdout --stdin`, `piper
//! --output_file -`, ...).

use super::provider::{ProviderError, SpeechAudio, SpeechRequest, TtsProvider};
use crate::config::ProviderConfig;
use crate::defaults::BASE_WORDS_PER_MINUTE;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Provider that shells out to a local TTS program.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    command: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Arguments with request placeholders filled in.
    pub fn render_args(&self, request: &SpeechRequest) -> Vec<String> {
        let lang = request
            .target_language_code
            .split(['-', '_'])
            .next()
            .unwrap_or_default();
        let wpm = (BASE_WORDS_PER_MINUTE * request.pace).round() as u32;

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{speaker}", &request.speaker)
                    .replace("{language}", &request.target_language_code)
                    .replace("{lang}", lang)
                    .replace("{pace}", &format!("{:.2}", request.pace))
                    .replace("{wpm}", &wpm.to_string())
                    .replace("{sample_rate}", &request.sample_rate.to_string())
                    .replace("{model}", &request.model)
            })
            .collect()
    }
}

#[async_trait]
impl TtsProvider for CommandProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, ProviderError> {
        let args = self.render_args(request);
        tracing::trace!(command = %self.command, ?args, "spawning tts command");

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProviderError::Unavailable {
                        message: format!("{} not found", self.command),
                    }
                } else {
                    ProviderError::Unavailable {
                        message: format!("Failed to execute {}: {}", self.command, e),
                    }
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits early closes the pipe; its exit status is reported below.
            if let Err(e) = stdin.write_all(request.text.as_bytes()).await {
                tracing::debug!(command = %self.command, error = %e, "tts command closed stdin");
            }
            // Dropping stdin closes the pipe so the command sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::Other(format!("{} did not finish: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Other(format!(
                "{} failed with status {:?}: {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(ProviderError::EmptyAudio);
        }

        Ok(SpeechAudio::new(output.stdout))
    }

    fn name(&self) -> &str {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SpeechRequest {
        SpeechRequest {
            text: "नमस्ते".to_string(),
            target_language_code: "hi-IN".to_string(),
            speaker: "shubh".to_string(),
            pace: 1.2,
            sample_rate: 22050,
            model: "bulbul:v3".to_string(),
            temperature: 0.6,
            enable_preprocessing: true,
        }
    }

    #[test]
    fn test_render_args_fills_placeholders() {
        let provider = CommandProvider::new(
            "tts",
            vec![
                "-v".to_string(),
                "{lang}".to_string(),
                "--speaker={speaker}".to_string(),
                "{language}".to_string(),
                "{wpm}".to_string(),
                "{pace}".to_string(),
                "{sample_rate}".to_string(),
                "{model}".to_string(),
            ],
        );
        assert_eq!(
            provider.render_args(&request()),
            vec![
                "-v",
                "hi",
                "--speaker=shubh",
                "hi-IN",
                "210",
                "1.20",
                "22050",
                "bulbul:v3"
            ]
        );
    }

    #[test]
    fn test_from_default_config() {
        let provider = CommandProvider::from_config(&ProviderConfig::default());
        assert_eq!(provider.name(), "espeak-ng");
        assert!(provider.render_args(&request()).contains(&"hi".to_string()));
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let provider = CommandProvider::new("/nonexistent/mdspeak-tts-12345", vec![]);
        let err = provider.synthesize(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_returned_as_audio() {
        // `cat` echoes stdin, standing in for a command that prints audio.
        let provider = CommandProvider::new("cat", vec![]);
        let audio = provider.synthesize(&request()).await.unwrap();
        assert_eq!(audio.audio, "नमस्ते".as_bytes());
        assert_eq!(audio.bytes_received, audio.audio.len());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let provider = CommandProvider::new("false", vec![]);
        let err = provider.synthesize(&request()).await.unwrap_err();
        assert!(err.to_string().contains("false failed"));
    }
}
