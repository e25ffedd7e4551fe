//! Response cache.
//!
//! Responses are keyed by the request fingerprint built in
//! [`request`](crate::request). Entries expire once their lifetime has elapsed;
//! a lookup that finds an expired entry evicts it before reporting the miss.
//!
//! Two backends are provided: [`MemoryCache`], the default, and
//! [`PersistentCache`], which keeps everything in a single serialized blob of a
//! [`Storage`](crate::storage::Storage).
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fetchkit_http::RawResponse;

use crate::error::Error;

mod memory;
mod persistent;

pub use self::memory::MemoryCache;
pub use self::persistent::{PersistentCache, CACHE_NAMESPACE};

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Nothing stored under the key
    Miss,
    /// An entry existed but outlived its lifetime and was evicted
    Expired,
    /// A live entry
    Hit(RawResponse),
}

/// Response cache keyed by request fingerprint
#[async_trait]
pub trait Cache: Debug + Send + Sync {
    /// Look up `key`, evicting the entry if it has expired
    async fn lookup(&self, key: &str) -> Result<CacheLookup, Error>;

    /// Store `response` under `key`, stamped with the current time
    async fn set(&self, key: &str, response: RawResponse) -> Result<(), Error>;

    /// Remove the given keys
    async fn delete(&self, keys: &[&str]) -> Result<(), Error>;

    /// Remove every entry
    async fn clear(&self) -> Result<(), Error>;

    /// Live entry for `key`
    async fn get(&self, key: &str) -> Result<Option<RawResponse>, Error> {
        match self.lookup(key).await? {
            CacheLookup::Hit(response) => Ok(Some(response)),
            CacheLookup::Miss | CacheLookup::Expired => Ok(None),
        }
    }

    /// Whether a live entry exists for `key`
    async fn has(&self, key: &str) -> Result<bool, Error> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Millisecond wall clock used to stamp and expire entries
pub trait Clock: Debug + Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// [`Clock`] moved by hand
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock reading `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Move the clock to `now_ms`
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A zero lifetime never expires
pub(crate) fn is_expired(inserted_at: u64, cache_life: Duration, now: u64) -> bool {
    let life = cache_life.as_millis() as u64;
    life > 0 && now > inserted_at.saturating_add(life)
}
