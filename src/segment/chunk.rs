//! Chunk and document types produced by the segmenter.

use crate::config::Prosody;
use crate::defaults::CHARS_PER_SECOND;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content a chunk was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkKind {
    #[serde(rename = "h1")]
    Heading1,
    #[serde(rename = "h2")]
    Heading2,
    #[serde(rename = "h3")]
    Heading3,
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "bullet")]
    Bullet,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "blockquote")]
    Blockquote,
}

impl ChunkKind {
    pub const ALL: [ChunkKind; 7] = [
        ChunkKind::Heading1,
        ChunkKind::Heading2,
        ChunkKind::Heading3,
        ChunkKind::Paragraph,
        ChunkKind::Bullet,
        ChunkKind::Code,
        ChunkKind::Blockquote,
    ];

    /// Heading kind for a markdown level. Levels deeper than 3 map to `Heading3`.
    pub fn heading(level: u8) -> Self {
        match level {
            0 | 1 => ChunkKind::Heading1,
            2 => ChunkKind::Heading2,
            _ => ChunkKind::Heading3,
        }
    }

    pub fn is_heading(self) -> bool {
        matches!(
            self,
            ChunkKind::Heading1 | ChunkKind::Heading2 | ChunkKind::Heading3
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Heading1 => "h1",
            ChunkKind::Heading2 => "h2",
            ChunkKind::Heading3 => "h3",
            ChunkKind::Paragraph => "paragraph",
            ChunkKind::Bullet => "bullet",
            ChunkKind::Code => "code",
            ChunkKind::Blockquote => "blockquote",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single speakable unit with its prosody hints.
///
/// Chunks are immutable once the segmenter has produced them; ids are
/// contiguous and follow document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Markdown-free text sent to the provider.
    pub text: String,
    /// Source slice the text was derived from.
    pub raw_text: String,
    /// Length of `text` in characters (not bytes).
    pub char_count: usize,
    pub pause_after_ms: u32,
    pub loudness_boost: f32,
}

impl Chunk {
    pub fn new(id: u32, kind: ChunkKind, text: String, raw_text: String, prosody: Prosody) -> Self {
        let char_count = text.chars().count();
        Self {
            id,
            kind,
            text,
            raw_text,
            char_count,
            pause_after_ms: prosody.pause_after_ms,
            loudness_boost: prosody.loudness_boost,
        }
    }
}

/// Result of segmenting one markdown document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub title: Option<String>,
    pub chunks: Vec<Chunk>,
    pub total_chunks: usize,
    pub total_characters: usize,
    pub estimated_duration_seconds: f64,
}

impl ParsedDocument {
    /// Build a document and its derived totals from an ordered chunk list.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let title = chunks
            .iter()
            .find(|c| c.kind == ChunkKind::Heading1)
            .map(|c| c.text.clone());
        let total_characters = chunks.iter().map(|c| c.char_count).sum();

        Self {
            filename: None,
            language: None,
            title,
            total_chunks: chunks.len(),
            total_characters,
            estimated_duration_seconds: total_characters as f64 / CHARS_PER_SECOND,
            chunks,
        }
    }

    /// Attach the source file name and language folder.
    pub fn with_source(mut self, filename: impl Into<String>, language: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self.language = Some(language.into());
        self
    }

    pub fn chunk(&self, id: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// File stem used when naming exported audio.
    pub fn stem(&self) -> &str {
        self.filename
            .as_deref()
            .and_then(|name| std::path::Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or("document")
    }
}
