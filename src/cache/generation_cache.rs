use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::file_store::FileStore;
use super::types::{CacheEntry, CacheKind, CacheStats, CorruptPolicy, EvictionPolicy};
use crate::utils::{short_key, CacheError};

/// Per-key gate used to collapse concurrent misses into one producer call
type KeyGate = Arc<tokio::sync::Mutex<()>>;

/// Maps a content-derived key to an artifact that was expensive to produce.
///
/// The whole store lives in memory and is flushed to its backing JSON file
/// after every mutation. A key present in the store means its artifact was
/// produced successfully.
#[derive(Debug)]
pub struct GenerationCache {
    store: FileStore,
    entries: RwLock<HashMap<String, CacheEntry>>,
    gates: Mutex<HashMap<String, KeyGate>>,
    /// Held across snapshot + write so an older snapshot never lands last
    write_lock: Mutex<()>,
    counters: Mutex<Counters>,
    eviction: EvictionPolicy,
    load_error: Option<CacheError>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: usize,
    misses: usize,
    producer_failures: usize,
    persist_failures: usize,
}

impl GenerationCache {
    /// Load a cache from its backing file.
    ///
    /// A missing file yields an empty cache. A corrupt file either fails the
    /// load or is discarded, depending on `on_corrupt`; a discarded error stays
    /// available through [`GenerationCache::load_error`].
    pub fn load(store: FileStore, on_corrupt: CorruptPolicy) -> Result<Self, CacheError> {
        let (entries, load_error) = match store.load() {
            Ok(entries) => {
                debug!(
                    "Loaded {} {} cache entries from {}",
                    entries.len(),
                    store.kind(),
                    store.path().display()
                );
                (entries, None)
            }
            Err(e @ CacheError::CorruptStore { .. }) if on_corrupt == CorruptPolicy::Discard => {
                warn!("Discarding corrupt {} cache: {}", store.kind(), e);
                (HashMap::new(), Some(e))
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            entries: RwLock::new(entries),
            gates: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            counters: Mutex::new(Counters::default()),
            eviction: EvictionPolicy::default(),
            load_error,
        })
    }

    /// Bound the cache; `max_entries` is enforced on every insert
    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn kind(&self) -> CacheKind {
        self.store.kind()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The corrupt-store error discarded at load time, if any
    pub fn load_error(&self) -> Option<&CacheError> {
        self.load_error.as_ref()
    }

    /// Look up a key without side effects
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Return the cached artifact for `key`, or run `producer` and cache its result.
    ///
    /// Concurrent callers for the same key wait on a shared gate, so the
    /// producer runs at most once per miss. A failed producer leaves the store
    /// untouched and the next caller retries. A failed persist is logged and
    /// counted; the freshly produced value is still returned.
    pub async fn get_or_create<F, Fut>(&self, key: &str, producer: F) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        if key.is_empty() {
            return Err(CacheError::missing("cache key"));
        }

        if let Some(value) = self.hit(key) {
            return Ok(value);
        }

        // Declared before the guard so the lock is released first; the lease
        // also runs when this future is dropped mid-wait
        let lease = self.acquire_gate(key);
        let _guard = lease.gate.lock().await;

        // Another caller may have filled the key while we waited
        if let Some(value) = self.hit(key) {
            return Ok(value);
        }
        self.produce(key, producer).await
    }

    /// Flush the whole in-memory store to disk
    pub fn persist(&self) -> Result<(), CacheError> {
        let _write = self.write_lock.lock();
        let snapshot: Vec<CacheEntry> = self.entries.read().values().cloned().collect();
        self.store.persist(&snapshot)
    }

    /// Drop entries outside `policy`, persisting if anything was removed.
    /// Returns the number of entries dropped.
    pub fn evict(&self, policy: &EvictionPolicy) -> Result<usize, CacheError> {
        self.evict_at(policy, chrono::Utc::now().timestamp_millis())
    }

    fn evict_at(&self, policy: &EvictionPolicy, now_ms: i64) -> Result<usize, CacheError> {
        if policy.is_unbounded() {
            return Ok(0);
        }

        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();

            if let Some(max_age) = policy.max_age_ms {
                let cutoff = now_ms.saturating_sub(max_age);
                entries.retain(|_, entry| entry.created_at >= cutoff);
            }

            if let Some(max_entries) = policy.max_entries {
                if entries.len() > max_entries {
                    let mut by_age: Vec<(i64, String)> = entries
                        .values()
                        .map(|entry| (entry.created_at, entry.key.clone()))
                        .collect();
                    by_age.sort();
                    let excess = by_age.len() - max_entries;
                    for (_, key) in by_age.into_iter().take(excess) {
                        entries.remove(&key);
                    }
                }
            }

            before - entries.len()
        };

        if removed > 0 {
            info!("Evicted {} {} cache entries", removed, self.kind());
            self.persist()?;
        }

        Ok(removed)
    }

    /// Remove every entry and the backing file
    pub fn clear(&self) -> Result<(), CacheError> {
        let _write = self.write_lock.lock();
        self.entries.write().clear();
        self.store.remove()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (entries, oldest, newest) = {
            let entries = self.entries.read();
            let oldest = entries.values().map(|e| e.created_at).min();
            let newest = entries.values().map(|e| e.created_at).max();
            (entries.len(), oldest, newest)
        };
        let counters = self.counters.lock();

        CacheStats {
            kind: Some(self.kind()),
            entries,
            hits: counters.hits,
            misses: counters.misses,
            producer_failures: counters.producer_failures,
            persist_failures: counters.persist_failures,
            oldest_created_at: oldest,
            newest_created_at: newest,
        }
    }

    fn hit(&self, key: &str) -> Option<String> {
        let value = self.entries.read().get(key).map(|entry| entry.value.clone())?;
        self.counters.lock().hits += 1;
        debug!("{} cache hit for {}", self.kind(), short_key(key));
        Some(value)
    }

    async fn produce<F, Fut>(&self, key: &str, producer: F) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        self.counters.lock().misses += 1;
        info!("{} cache miss for {}, invoking producer", self.kind(), short_key(key));

        let value = match producer().await {
            Ok(value) => value,
            Err(e) => {
                self.counters.lock().producer_failures += 1;
                warn!("{} producer failed for {}: {:#}", self.kind(), short_key(key), e);
                return Err(CacheError::Producer(e));
            }
        };

        self.insert(CacheEntry::new(key, value.clone()));

        if let Err(e) = self.persist() {
            self.counters.lock().persist_failures += 1;
            warn!("{} cache update is not durable: {}", self.kind(), e);
        }

        Ok(value)
    }

    fn insert(&self, entry: CacheEntry) {
        let mut entries = self.entries.write();
        entries.insert(entry.key.clone(), entry);

        if let Some(max_entries) = self.eviction.max_entries {
            while entries.len() > max_entries {
                let oldest = entries
                    .values()
                    .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)))
                    .map(|entry| entry.key.clone());
                match oldest {
                    Some(key) => {
                        debug!("Evicting oldest {} entry {}", self.kind(), short_key(&key));
                        entries.remove(&key);
                    }
                    None => break,
                }
            }
        }
    }

    fn acquire_gate(&self, key: &str) -> GateLease<'_> {
        let gate = self
            .gates
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        GateLease {
            gates: &self.gates,
            key: key.to_string(),
            gate,
        }
    }
}

/// A caller's hold on a key gate; dropping it removes the gate once unused
struct GateLease<'a> {
    gates: &'a Mutex<HashMap<String, KeyGate>>,
    key: String,
    gate: KeyGate,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        // One reference in the table plus ours means nobody else is waiting
        if Arc::strong_count(&self.gate) <= 2 {
            gates.remove(&self.key);
        }
    }
}
