//! TTL-aware caching over a pluggable key-value backend
//!
//! `CacheAdapter` normalizes keys (language tagging, over-length hashing),
//! wraps payloads in a structured envelope and degrades backend faults to
//! cache misses. The backend itself is behind the `KeyValueStore` trait so
//! persistence stays external; an in-memory store is provided for tests and
//! single-process deployments.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::query::Language;

/// Longest key accepted verbatim; anything longer is replaced by its
/// SHA-256 digest before touching the backend.
const MAX_KEY_LEN: usize = 256;

/// Namespace a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    Search,
    Metadata,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Search => "search",
            CacheType::Metadata => "metadata",
        }
    }
}

/// Minimal persistent key-value contract the adapter wraps.
///
/// Implementations may fail freely; the adapter converts every backend
/// error into a miss on read and a no-op on write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str, cache_type: CacheType) -> anyhow::Result<Option<String>>;
    fn set(
        &self,
        key: &str,
        value: String,
        cache_type: CacheType,
        ttl: Option<Duration>,
    ) -> anyhow::Result<()>;
    fn delete(&self, key: &str, cache_type: CacheType) -> anyhow::Result<()>;
}

/// Persisted cache envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    cache_type: CacheType,
    key_hash: String,
}

/// Key-normalizing, TTL-aware cache front.
pub struct CacheAdapter<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> CacheAdapter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read a cached value. Expired entries, corrupt payloads and backend
    /// errors all read as a miss.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        cache_type: CacheType,
        language: Language,
    ) -> Option<T> {
        let backend_key = self.backend_key(key, cache_type, language);
        let raw = match self.store.get(&backend_key, cache_type) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Cache backend read failed, treating as miss");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Corrupt cache payload, treating as miss");
                return None;
            }
        };

        if let Some(expires_at) = record.expires_at {
            if expires_at <= Utc::now() {
                debug!(key = %backend_key, "Cache entry expired");
                return None;
            }
        }

        match serde_json::from_value(record.data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Cache payload shape mismatch, treating as miss");
                None
            }
        }
    }

    /// Write a value. Serialization and backend errors are logged and
    /// swallowed; the cache is always recomputable.
    pub fn set<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        cache_type: CacheType,
        language: Language,
        ttl: Option<Duration>,
    ) {
        let backend_key = self.backend_key(key, cache_type, language);
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Cache serialization failed, skipping write");
                return;
            }
        };

        let now = Utc::now();
        let record = CacheRecord {
            data,
            created_at: now,
            expires_at: ttl.and_then(|ttl| {
                chrono::TimeDelta::from_std(ttl).ok().map(|delta| now + delta)
            }),
            cache_type,
            key_hash: hash_key(&backend_key),
        };

        let raw = match serde_json::to_string(&record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Cache envelope serialization failed");
                return;
            }
        };

        if let Err(e) = self.store.set(&backend_key, raw, cache_type, ttl) {
            warn!(key = %backend_key, error = %e, "Cache backend write failed, skipping");
        }
    }

    /// Remove a value. Backend errors are swallowed.
    pub fn delete(&self, key: &str, cache_type: CacheType, language: Language) {
        let backend_key = self.backend_key(key, cache_type, language);
        if let Err(e) = self.store.delete(&backend_key, cache_type) {
            warn!(key = %backend_key, error = %e, "Cache backend delete failed, skipping");
        }
    }

    /// Namespace, language-tag and, when over-long, hash the logical key.
    fn backend_key(&self, key: &str, cache_type: CacheType, language: Language) -> String {
        let tagged = format!("{}:{}:lang={}", cache_type.as_str(), key, language);
        if tagged.len() > MAX_KEY_LEN {
            hash_key(&tagged)
        } else {
            tagged
        }
    }
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Simple in-memory `KeyValueStore` with TTL support.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remove all expired entries.
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.write();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at.map(|at| at > now).unwrap_or(true));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str, _cache_type: CacheType) -> anyhow::Result<Option<String>> {
        let entries = self.entries.read();
        Ok(entries.get(key).and_then(|entry| {
            let live = entry.expires_at.map(|at| Instant::now() < at).unwrap_or(true);
            if live { Some(entry.value.clone()) } else { None }
        }))
    }

    fn set(
        &self,
        key: &str,
        value: String,
        _cache_type: CacheType,
        ttl: Option<Duration>,
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str, _cache_type: CacheType) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        entries.remove(key);
        Ok(())
    }
}
