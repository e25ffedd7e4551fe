use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fetchkit_http::RawResponse;
use parking_lot::RwLock;

use super::{is_expired, Cache, CacheLookup, Clock, SystemClock};
use crate::error::Error;

#[derive(Debug, Clone)]
struct Entry {
    response: RawResponse,
    inserted_at: u64,
}

/// In memory response cache.
///
/// This is the default backend. Entries live as long as the process and are not
/// shared between engines unless the same `Arc` is handed to each of them.
#[derive(Debug)]
pub struct MemoryCache {
    cache_life: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl MemoryCache {
    /// Cache whose entries expire after `cache_life`; zero means never
    pub fn new(cache_life: Duration) -> Self {
        Self::with_clock(cache_life, Arc::new(SystemClock))
    }

    /// Cache reading time from `clock`
    pub fn with_clock(cache_life: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache_life,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn lookup(&self, key: &str) -> Result<CacheLookup, Error> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write();

        let expired = match entries.get(key) {
            None => return Ok(CacheLookup::Miss),
            Some(entry) => is_expired(entry.inserted_at, self.cache_life, now),
        };

        if expired {
            tracing::debug!("Evicting expired cache entry {}", key);
            entries.remove(key);
            return Ok(CacheLookup::Expired);
        }

        Ok(entries
            .get(key)
            .map(|entry| CacheLookup::Hit(entry.response.clone()))
            .unwrap_or(CacheLookup::Miss))
    }

    async fn set(&self, key: &str, response: RawResponse) -> Result<(), Error> {
        let inserted_at = self.clock.now_ms();
        self.entries.write().insert(
            key.to_string(),
            Entry {
                response,
                inserted_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), Error> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.entries.write().clear();
        Ok(())
    }
}
