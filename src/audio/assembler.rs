//! Concatenating per-chunk audio into one timeline.
//!
//! Chunks are laid out strictly by id. Each successful chunk is decoded,
//! resampled to the output rate and gain-adjusted by its loudness boost;
//! every chunk except the last is followed by its pause. A chunk without
//! usable audio contributes only its pause.

use super::export::{self, ExportFormat, ExportedAudio};
use super::segment::{AudioSegment, gain_db};
use crate::error::{MdspeakError, Result};
use crate::segment::chunk::Chunk;
use crate::synth::job::ChunkResult;
use crate::synth::stats::FailedChunk;
use std::collections::BTreeMap;

/// The assembled timeline plus a record of what was left out.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub audio: AudioSegment,
    /// Chunks whose audio made it into the timeline, in order.
    pub included: Vec<u32>,
    /// Chunks that contributed only a pause.
    pub skipped: Vec<FailedChunk>,
}

impl Assembly {
    pub fn duration_ms(&self) -> u64 {
        self.audio.duration_ms()
    }

    /// Encode the timeline as `format`.
    pub fn export(&self, format: ExportFormat, mp3_bitrate_kbps: u32) -> Result<ExportedAudio> {
        let pcm = self.audio.to_i16();
        let bytes = export::encode(format, &pcm, self.audio.sample_rate(), mp3_bitrate_kbps)?;
        tracing::debug!(
            format = %format,
            size_bytes = bytes.len(),
            duration_ms = self.duration_ms(),
            "audio exported"
        );
        Ok(ExportedAudio {
            format,
            bytes,
            sample_rate: self.audio.sample_rate(),
            duration_ms: self.duration_ms(),
        })
    }
}

/// Build the timeline for `chunks` from their synthesis `results`.
///
/// Fails with `NoAudio` when not a single chunk has usable audio.
pub fn assemble(
    chunks: &[Chunk],
    results: &BTreeMap<u32, ChunkResult>,
    sample_rate: u32,
) -> Result<Assembly> {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.id);

    let mut timeline = AudioSegment::new(Vec::new(), sample_rate);
    let mut included = Vec::new();
    let mut skipped = Vec::new();

    for (index, chunk) in ordered.iter().enumerate() {
        match decode(chunk, results.get(&chunk.id)) {
            Ok(mut segment) => {
                segment.apply_gain_db(gain_db(chunk.loudness_boost));
                timeline.append(segment);
                included.push(chunk.id);
            }
            Err(reason) => {
                tracing::debug!(chunk_id = chunk.id, %reason, "chunk left out of assembly");
                skipped.push(FailedChunk {
                    chunk_id: chunk.id,
                    error: reason,
                });
            }
        }

        if index + 1 < ordered.len() {
            timeline.append_silence(chunk.pause_after_ms);
        }
    }

    if included.is_empty() {
        return Err(MdspeakError::NoAudio {
            failed: skipped.len(),
            total: ordered.len(),
        });
    }

    Ok(Assembly {
        audio: timeline,
        included,
        skipped,
    })
}

fn decode(chunk: &Chunk, result: Option<&ChunkResult>) -> std::result::Result<AudioSegment, String> {
    let result = result.ok_or_else(|| "no result".to_string())?;
    match (&result.audio, result.success) {
        (Some(audio), true) => AudioSegment::decode_wav(audio).map_err(|e| e.to_string()),
        _ => Err(result
            .error
            .clone()
            .unwrap_or_else(|| format!("chunk {} has no audio", chunk.id))),
    }
}
