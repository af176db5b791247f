//! Session cache interface and a bundled in-memory backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::session::Session;

/// Storage for sessions keyed by request identity.
///
/// The backend owns expiry and eviction. The client only gets, sets and
/// deletes, and never asks whether an entry is stale.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch the session stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Session>, CacheError>;

    /// Store `session` under `key`, replacing any previous value.
    async fn set(&self, key: &str, session: Session) -> Result<(), CacheError>;

    /// Remove `key`.
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CachedSession {
    session: Session,
    cached_at: Instant,
}

/// Thread-safe TTL cache held in process memory.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedSession>>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a cache keeping entries for `ttl_seconds`, holding at most
    /// `max_entries` of them.
    pub fn new(ttl_seconds: u64, max_entries: usize) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_seconds), max_entries)
    }

    /// Create a cache with an exact TTL, holding at most `max_entries`.
    pub fn with_ttl(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    fn is_expired(&self, entry: &CachedSession) -> bool {
        entry.cached_at.elapsed() > self.ttl
    }

    /// Remove expired entries.
    pub fn cleanup(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, v| !self.is_expired(v));
        }
    }

    /// Get the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::backend("memory cache lock poisoned")
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Session>, CacheError> {
        let entries = self.entries.read().map_err(poisoned)?;
        // Expired entries stay until the next write or cleanup.
        Ok(entries
            .get(key)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.session.clone()))
    }

    async fn set(&self, key: &str, session: Session) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            entries.retain(|_, v| !self.is_expired(v));

            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, v)| v.cached_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CachedSession {
                session,
                cached_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}
