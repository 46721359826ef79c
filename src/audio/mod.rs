//! Audio decoding, assembly and export.

pub mod assembler;
pub mod export;
pub mod segment;

pub use assembler::{Assembly, assemble};
pub use export::{ExportFormat, ExportedAudio};
pub use segment::AudioSegment;
