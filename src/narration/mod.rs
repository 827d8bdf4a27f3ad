// Gateway module for narration
// All external access goes through these re-exports

mod elevenlabs;
mod narrator;
mod producers;

pub use elevenlabs::ElevenLabsClient;
pub use narrator::{NarrationService, NarrationSettings};
pub use producers::{SpeechSynthesizer, VoiceCloner};
