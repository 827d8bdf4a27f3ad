// Gateway module for the generation cache
// All external access goes through these re-exports

mod file_store;
mod generation_cache;
mod keys;
mod types;

pub use file_store::FileStore;
pub use generation_cache::GenerationCache;
pub use keys::{content_hash, narration_key, voice_key, voice_key_for_file};
pub use types::{CacheEntry, CacheKind, CacheStats, CorruptPolicy, EvictionPolicy};
