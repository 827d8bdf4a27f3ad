/// Constants module to avoid magic values in the codebase

// Application identity
pub const APP_NAME: &str = "storycache";
pub const ENV_PREFIX: &str = "STORYCACHE_";
pub const LOCAL_CONFIG_PATH: &str = ".storycache/config.toml";

// Cache files
pub const DEFAULT_VOICE_CACHE_FILE: &str = "voice-cache.json";
pub const DEFAULT_NARRATION_CACHE_FILE: &str = "narration-cache.json";

// Narration output
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
pub const DEFAULT_PUBLIC_PREFIX: &str = "/uploads";
pub const NARRATION_FILE_PREFIX: &str = "narration";
pub const NARRATION_FILE_EXTENSION: &str = "mp3";

// ElevenLabs defaults
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM"; // stock "Rachel" voice
pub const DEFAULT_TTS_MODEL_ID: &str = "eleven_multilingual_v2";
pub const DEFAULT_TTS_OUTPUT_FORMAT: &str = "mp3_44100_128";
pub const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 120;

// Eviction
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
