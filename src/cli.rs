//! Command-line interface for mdspeak
//!
//! Provides argument parsing using clap derive macros.

use crate::audio::export::ExportFormat;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Read markdown documents aloud
#[derive(Parser, Debug)]
#[command(name = "mdspeak", version, about = "Turn markdown documents into narrated audio")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors and the result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-chunk progress, -vv: provider calls)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout string into milliseconds.
///
/// Bare numbers are seconds; anything else goes through `humantime`
/// (`500ms`, `30s`, `1m30s`).
fn parse_timeout_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs * 1000);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    s.parse().map_err(|e: crate::error::MdspeakError| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment a markdown file and print the chunks as JSON
    Parse {
        /// Markdown file to segment
        file: PathBuf,

        /// Maximum characters per paragraph chunk
        #[arg(long, value_name = "CHARS")]
        max_chunk_chars: Option<usize>,
    },

    /// Synthesize a markdown file into a single audio file
    Speak(SpeakArgs),

    /// View and create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Options for `mdspeak speak`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SpeakArgs {
    /// Markdown file to read aloud
    pub file: PathBuf,

    /// Output format: mp3 or wav (default: from config)
    #[arg(long, short = 'f', value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<ExportFormat>,

    /// Output file (default: <name>_<timestamp>.<ext> in the output directory)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Maximum characters per paragraph chunk
    #[arg(long, value_name = "CHARS")]
    pub max_chunk_chars: Option<usize>,

    /// Speaker voice id
    #[arg(long, value_name = "NAME")]
    pub speaker: Option<String>,

    /// Target language code (e.g., hi-IN, en-IN)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Speaking pace (0.5 - 2.0)
    #[arg(long, value_name = "PACE")]
    pub pace: Option<f32>,

    /// Maximum concurrent synthesis calls
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-call timeout. Examples: 30, 45s, 2m
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout_ms)]
    pub timeout: Option<u64>,

    /// Only synthesize these chunk ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub only: Option<Vec<u32>>,

    /// Write the generation summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
