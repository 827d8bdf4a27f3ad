use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::{CorruptPolicy, EvictionPolicy};
use crate::constants::{
    APP_NAME, DEFAULT_ELEVENLABS_KEY_ENV, DEFAULT_ELEVENLABS_URL, DEFAULT_NARRATION_CACHE_FILE,
    DEFAULT_PUBLIC_PREFIX, DEFAULT_TTS_MODEL_ID, DEFAULT_TTS_OUTPUT_FORMAT, DEFAULT_UPLOADS_DIR,
    DEFAULT_VOICE_CACHE_FILE, DEFAULT_VOICE_ID, ENV_PREFIX, LOCAL_CONFIG_PATH, MILLIS_PER_DAY,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cache storage configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Narration output configuration
    #[serde(default)]
    pub narration: NarrationConfig,

    /// ElevenLabs configuration
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
}

/// Cache storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding both cache files
    pub data_dir: PathBuf,
    /// File name of the voice clone cache
    pub voice_cache_file: String,
    /// File name of the narration audio cache
    pub narration_cache_file: String,
    /// What to do with a cache file that cannot be parsed
    pub on_corrupt: CorruptPolicy,
    /// Entries older than this are dropped by `prune`
    pub max_age_days: Option<u64>,
    /// Upper bound on entries per cache
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            voice_cache_file: DEFAULT_VOICE_CACHE_FILE.to_string(),
            narration_cache_file: DEFAULT_NARRATION_CACHE_FILE.to_string(),
            on_corrupt: CorruptPolicy::Discard,
            max_age_days: None,
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn voice_cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.voice_cache_file)
    }

    pub fn narration_cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.narration_cache_file)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_age_ms: self
                .max_age_days
                .map(|days| i64::try_from(days).unwrap_or(i64::MAX).saturating_mul(MILLIS_PER_DAY)),
            max_entries: self.max_entries,
        }
    }
}

/// Narration output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Where synthesized audio files are written (defaults to `<data_dir>/uploads`)
    pub uploads_dir: Option<PathBuf>,
    /// URL prefix under which `uploads_dir` is served
    pub public_prefix: String,
    /// Voice used when no sample is given or cloning fails
    pub default_voice_id: String,
    /// Text-to-speech model
    pub model_id: String,
    /// Audio encoding requested from the synthesizer
    pub output_format: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            uploads_dir: None,
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
            default_voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_TTS_MODEL_ID.to_string(),
            output_format: DEFAULT_TTS_OUTPUT_FORMAT.to_string(),
        }
    }
}

/// ElevenLabs configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    /// Environment variable containing API key
    pub api_key_env: String,
    /// API base URL
    pub base_url: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_ELEVENLABS_KEY_ENV.to_string(),
            base_url: DEFAULT_ELEVENLABS_URL.to_string(),
        }
    }
}

impl Config {
    /// Resolved directory for synthesized audio
    pub fn uploads_dir(&self) -> PathBuf {
        self.narration
            .uploads_dir
            .clone()
            .unwrap_or_else(|| self.cache.data_dir.join(DEFAULT_UPLOADS_DIR))
    }
}

/// Load configuration from multiple sources.
///
/// An explicit file replaces the global and project-local files; environment
/// variables (`STORYCACHE_CACHE__MAX_ENTRIES=500`) always apply last.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        figment = figment.merge(Toml::file(path));
    } else {
        let global_config = get_config_dir()?.join("config.toml");
        let local_config = PathBuf::from(LOCAL_CONFIG_PATH);

        if global_config.exists() {
            figment = figment.merge(Toml::file(&global_config));
        }
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{}", APP_NAME)))
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist.
/// Returns the path and whether a new file was written.
pub fn init_config(path: Option<&Path>) -> Result<(PathBuf, bool)> {
    let config_file = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_dir()?.join("config.toml"),
    };

    if config_file.exists() {
        return Ok((config_file, false));
    }

    save_config(&Config::default(), &config_file)?;
    Ok((config_file, true))
}
