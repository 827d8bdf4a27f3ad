use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::{CacheEntry, CacheKind};
use crate::utils::CacheError;

const CREATED_AT_FIELD: &str = "createdAt";

/// The single JSON document backing one generation cache
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    kind: CacheKind,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, kind: CacheKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Read every entry from disk.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// well-formed entries is `CorruptStore`.
    pub fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError> {
        // Non-UTF-8 content is corrupt, not an I/O failure
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(CacheError::Persistence {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let document: Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|source| self.corrupt(source))?;

        let mut entries = HashMap::with_capacity(document.len());
        for (key, raw) in document {
            let entry = self.decode_entry(&key, &raw)?;
            entries.insert(key, entry);
        }

        Ok(entries)
    }

    /// Rewrite the whole document with `entries`.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// previous one, so readers never observe a half-written file.
    pub fn persist<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a CacheEntry>,
    ) -> Result<(), CacheError> {
        // BTreeMap keeps the output stable between writes
        let document: BTreeMap<&str, Value> = entries
            .into_iter()
            .map(|entry| (entry.key.as_str(), self.encode_entry(entry)))
            .collect();

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| self.persistence(io::Error::other(e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.persistence(e))?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| self.persistence(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            self.persistence(e)
        })?;

        Ok(())
    }

    /// Delete the backing file if present
    pub fn remove(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persistence(e)),
        }
    }

    fn encode_entry(&self, entry: &CacheEntry) -> Value {
        let mut object = Map::new();
        object.insert(self.kind.key_field().to_string(), Value::from(entry.key.clone()));
        object.insert(self.kind.value_field().to_string(), Value::from(entry.value.clone()));
        object.insert(CREATED_AT_FIELD.to_string(), Value::from(entry.created_at));
        Value::Object(object)
    }

    fn decode_entry(&self, key: &str, raw: &Value) -> Result<CacheEntry, CacheError> {
        let object = raw
            .as_object()
            .ok_or_else(|| self.malformed(key, "entry is not an object"))?;

        let value = object
            .get(self.kind.value_field())
            .and_then(Value::as_str)
            .ok_or_else(|| {
                self.malformed(key, &format!("missing string field `{}`", self.kind.value_field()))
            })?;

        let created_at = object
            .get(CREATED_AT_FIELD)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                self.malformed(key, &format!("missing integer field `{}`", CREATED_AT_FIELD))
            })?;

        // The map key is authoritative; older voice caches never wrote `fileHash`
        Ok(CacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            created_at,
        })
    }

    fn malformed(&self, key: &str, reason: &str) -> CacheError {
        self.corrupt(<serde_json::Error as serde::de::Error>::custom(format!(
            "entry `{}`: {}",
            key, reason
        )))
    }

    fn corrupt(&self, source: serde_json::Error) -> CacheError {
        CacheError::CorruptStore {
            path: self.path.clone(),
            source,
        }
    }

    fn persistence(&self, source: io::Error) -> CacheError {
        CacheError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(key: &str, value: &str, created_at: i64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            created_at,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("voice-cache.json"), CacheKind::Voice);

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_persist_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(
            temp_dir.path().join("nested/narration-cache.json"),
            CacheKind::Narration,
        );
        let written = vec![
            entry("s:n:0", "/uploads/narration-1-0.mp3", 10),
            entry("s:n:1", "/uploads/narration-2-1.mp3", 20),
        ];

        store.persist(&written).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["s:n:0"], written[0]);
        assert_eq!(loaded["s:n:1"], written[1]);
        assert!(!temp_dir.path().join("nested/narration-cache.json.tmp").exists());
    }

    #[test]
    fn test_on_disk_field_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice-cache.json");
        let store = FileStore::new(&path, CacheKind::Voice);

        store.persist(&[entry("abc123", "voice-1", 42)]).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "abc123": { "fileHash": "abc123", "voiceId": "voice-1", "createdAt": 42 }
            })
        );
    }

    #[test]
    fn test_loads_entries_without_key_field() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice-cache.json");
        fs::write(&path, r#"{ "deadbeef": { "voiceId": "v-9", "createdAt": 1700000000000 } }"#)
            .unwrap();

        let loaded = FileStore::new(&path, CacheKind::Voice).load().unwrap();
        assert_eq!(loaded["deadbeef"], entry("deadbeef", "v-9", 1_700_000_000_000));
    }

    #[test]
    fn test_invalid_json_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice-cache.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileStore::new(&path, CacheKind::Voice).load();
        assert!(matches!(result, Err(CacheError::CorruptStore { .. })));
    }

    #[test]
    fn test_non_utf8_bytes_are_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice-cache.json");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x7b]).unwrap();

        let result = FileStore::new(&path, CacheKind::Voice).load();
        assert!(matches!(result, Err(CacheError::CorruptStore { .. })));
    }

    #[test]
    fn test_wrong_value_field_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("narration-cache.json");
        fs::write(&path, r#"{ "k": { "voiceId": "v", "createdAt": 1 } }"#).unwrap();

        let result = FileStore::new(&path, CacheKind::Narration).load();
        assert!(matches!(result, Err(CacheError::CorruptStore { .. })));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice-cache.json");
        let store = FileStore::new(&path, CacheKind::Voice);

        store.persist(&[entry("k", "v", 1)]).unwrap();
        store.remove().unwrap();
        store.remove().unwrap();
        assert!(!path.exists());
    }
}
