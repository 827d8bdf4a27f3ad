use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two generation caches a store backs.
///
/// Both caches share one contract; they differ in how keys are built and in
/// the field names used for each entry on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Voice sample content hash -> cloned voice id
    Voice,
    /// (story, narrator, page) -> narration audio path
    Narration,
}

impl CacheKind {
    /// Field holding the key inside a stored entry
    pub fn key_field(self) -> &'static str {
        match self {
            CacheKind::Voice => "fileHash",
            CacheKind::Narration => "narrationKey",
        }
    }

    /// Field holding the artifact reference inside a stored entry
    pub fn value_field(self) -> &'static str {
        match self {
            CacheKind::Voice => "voiceId",
            CacheKind::Narration => "narrationUrl",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Voice => write!(f, "voice"),
            CacheKind::Narration => write!(f, "narration"),
        }
    }
}

/// A produced artifact and the key it was produced for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Bounds applied by `GenerationCache::evict`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Drop entries created more than this many milliseconds ago
    pub max_age_ms: Option<i64>,
    /// Keep at most this many entries, dropping the oldest first
    pub max_entries: Option<usize>,
}

impl EvictionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_age_ms.is_none() && self.max_entries.is_none()
    }
}

/// What to do when the backing file exists but cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// Log the problem and start with an empty store
    #[default]
    Discard,
    /// Refuse to open the store
    Fail,
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub kind: Option<CacheKind>,
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub producer_failures: usize,
    pub persist_failures: usize,
    pub oldest_created_at: Option<i64>,
    pub newest_created_at: Option<i64>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f32 / total as f32) * 100.0
        } else {
            0.0
        }
    }

    /// Format cache stats for display
    pub fn format(&self) -> String {
        let when = |ts: Option<i64>| {
            ts.and_then(chrono::DateTime::from_timestamp_millis)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        format!(
            "{} cache: {} entries\n\
            Oldest: {}\n\
            Newest: {}\n\
            Hit rate: {:.1}% ({} hits, {} misses)\n\
            Failures: {} producer, {} persist",
            self.kind.map(|k| k.to_string()).unwrap_or_default(),
            self.entries,
            when(self.oldest_created_at),
            when(self.newest_created_at),
            self.hit_rate(),
            self.hits,
            self.misses,
            self.producer_failures,
            self.persist_failures,
        )
    }
}
