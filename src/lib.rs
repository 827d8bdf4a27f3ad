pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod narration;
pub mod utils;

pub use app::{load_config, Config};
pub use cache::{CacheEntry, CacheKind, GenerationCache};
pub use narration::{NarrationService, SpeechSynthesizer, VoiceCloner};
pub use utils::CacheError;
