//! Markdown segmentation into TTS-ready chunks.
//!
//! `Segmenter::segment` scans the document into blocks, strips inline
//! markdown, applies per-kind length limits and attaches pause/loudness
//! hints. The output depends only on the input text and the config, so
//! re-segmenting the same text always yields the same chunk list.

pub mod blocks;
pub mod chunk;
pub mod inline;
pub mod sentence;

use crate::config::SegmenterConfig;
use blocks::Block;
use chunk::{Chunk, ChunkKind, ParsedDocument};

/// Splits markdown documents into chunks.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Override the paragraph limit, keeping every other setting.
    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.config.max_chunk_chars = max_chunk_chars;
        self
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment `markdown` into an ordered, id-stamped chunk list.
    pub fn segment(&self, markdown: &str) -> ParsedDocument {
        let mut emitter = Emitter {
            config: &self.config,
            chunks: Vec::new(),
        };

        for block in blocks::scan(markdown) {
            match block {
                Block::Heading { level, text, raw } => {
                    emitter.heading(ChunkKind::heading(level), &text, raw)
                }
                Block::Paragraph { text, raw } => emitter.split(ChunkKind::Paragraph, &text, raw),
                Block::ListItem { text, raw } => emitter.split(ChunkKind::Bullet, &text, raw),
                Block::Quote { text, raw } => emitter.split(ChunkKind::Blockquote, &text, raw),
                Block::Code { raw } => emitter.code(raw),
            }
        }

        let document = ParsedDocument::from_chunks(emitter.chunks);
        tracing::debug!(
            chunks = document.total_chunks,
            characters = document.total_characters,
            "segmented document"
        );
        document
    }
}

/// Segment with default settings and the given paragraph limit.
pub fn segment(markdown: &str, max_chunk_chars: usize) -> ParsedDocument {
    Segmenter::default()
        .with_max_chunk_chars(max_chunk_chars)
        .segment(markdown)
}

struct Emitter<'a> {
    config: &'a SegmenterConfig,
    chunks: Vec<Chunk>,
}

impl Emitter<'_> {
    fn push(&mut self, kind: ChunkKind, text: String, raw: String) {
        let id = self.chunks.len() as u32;
        self.chunks
            .push(Chunk::new(id, kind, text, raw, self.config.prosody(kind)));
    }

    fn heading(&mut self, kind: ChunkKind, source: &str, raw: String) {
        let text = inline::speakable(source);
        if text.is_empty() {
            return;
        }
        let text = truncate(&text, self.config.max_chars(kind));
        self.push(kind, text, raw);
    }

    fn split(&mut self, kind: ChunkKind, source: &str, raw: String) {
        let text = inline::speakable(source);
        if text.is_empty() {
            return;
        }
        let mut pieces = sentence::pack(
            &text,
            self.config.max_chars(kind),
            &self.config.sentence_terminators,
        );
        if pieces.len() == 1 {
            let piece = pieces.remove(0);
            self.push(kind, piece, raw);
        } else {
            for piece in pieces {
                let piece_raw = piece.clone();
                self.push(kind, piece, piece_raw);
            }
        }
    }

    fn code(&mut self, raw: String) {
        let text = truncate(
            &self.config.code_placeholder,
            self.config.max_chars(ChunkKind::Code),
        );
        if text.is_empty() {
            return;
        }
        self.push(ChunkKind::Code, text, raw);
    }
}

/// Keep at most `max_chars` characters, dropping trailing whitespace.
fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].trim_end().to_string(),
        None => text.to_string(),
    }
}
