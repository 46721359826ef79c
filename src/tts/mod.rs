//! Text-to-speech provider abstraction.

pub mod command;
pub mod provider;

pub use command::CommandProvider;
pub use provider::{MockProvider, ProviderError, SpeechAudio, SpeechRequest, TtsProvider};
