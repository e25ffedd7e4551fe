use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fetchkit_http::{Headers, RawResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{is_expired, Cache, CacheLookup, Clock, SystemClock};
use crate::error::Error;
use crate::storage::Storage;

/// Storage key holding the serialized cache
pub const CACHE_NAMESPACE: &str = "fetchkit-cache";

/// Stored form of a response
///
/// Bodies are kept as text; binary payloads are stored lossily.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredResponse {
    body: String,
    status: u16,
    status_text: String,
    #[serde(default)]
    headers: Headers,
    #[serde(default)]
    url: String,
    inserted_at: u64,
}

impl StoredResponse {
    fn new(response: &RawResponse, inserted_at: u64) -> Self {
        Self {
            body: String::from_utf8_lossy(response.body()).into_owned(),
            status: response.status(),
            status_text: response.status_text().to_string(),
            headers: response.headers().clone(),
            url: response.url().to_string(),
            inserted_at,
        }
    }

    fn to_response(&self) -> RawResponse {
        RawResponse::new(self.status, self.body.clone())
            .with_status_text(self.status_text.clone())
            .with_headers(self.headers.clone())
            .with_url(self.url.clone())
    }
}

type Blob = BTreeMap<String, StoredResponse>;

/// Response cache persisted through a [`Storage`]
///
/// The whole cache lives in one JSON document stored under
/// [`CACHE_NAMESPACE`]. Every operation reads, changes and writes back that
/// document; writers are serialized so concurrent updates do not drop entries.
#[derive(Debug)]
pub struct PersistentCache<S: Storage> {
    storage: S,
    cache_life: Duration,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl<S: Storage> PersistentCache<S> {
    /// Cache over `storage` whose entries expire after `cache_life`
    pub fn new(storage: S, cache_life: Duration) -> Self {
        Self::with_clock(storage, cache_life, Arc::new(SystemClock))
    }

    /// Cache reading time from `clock`
    pub fn with_clock(storage: S, cache_life: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            cache_life,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn load(&self) -> Result<Blob, Error> {
        let raw = match self.storage.get_item(CACHE_NAMESPACE).await? {
            Some(raw) => raw,
            None => return Ok(Blob::new()),
        };

        match serde_json::from_str(&raw) {
            Ok(blob) => Ok(blob),
            Err(err) => {
                tracing::warn!("Persistent cache is corrupt, clearing it: {}", err);
                self.save(&Blob::new()).await?;
                Ok(Blob::new())
            }
        }
    }

    async fn save(&self, blob: &Blob) -> Result<(), Error> {
        let raw = serde_json::to_string(blob)?;
        self.storage.set_item(CACHE_NAMESPACE, &raw).await
    }
}

#[async_trait]
impl<S: Storage> Cache for PersistentCache<S> {
    async fn lookup(&self, key: &str) -> Result<CacheLookup, Error> {
        let _guard = self.write_lock.lock().await;
        let mut blob = self.load().await?;

        let (expired, response) = match blob.get(key) {
            None => return Ok(CacheLookup::Miss),
            Some(stored) => (
                is_expired(stored.inserted_at, self.cache_life, self.clock.now_ms()),
                stored.to_response(),
            ),
        };

        if expired {
            tracing::debug!("Evicting expired persisted entry {}", key);
            blob.remove(key);
            self.save(&blob).await?;
            return Ok(CacheLookup::Expired);
        }

        Ok(CacheLookup::Hit(response))
    }

    async fn set(&self, key: &str, response: RawResponse) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut blob = self.load().await?;
        blob.insert(
            key.to_string(),
            StoredResponse::new(&response, self.clock.now_ms()),
        );
        self.save(&blob).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut blob = self.load().await?;
        for key in keys {
            blob.remove(*key);
        }
        self.save(&blob).await
    }

    async fn clear(&self) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        self.save(&Blob::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::MemoryStorage;

    fn cache(life_ms: u64) -> (PersistentCache<Arc<MemoryStorage>>, ManualClock) {
        let clock = ManualClock::new(5_000);
        let cache = PersistentCache::with_clock(
            Arc::new(MemoryStorage::new()),
            Duration::from_millis(life_ms),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let (cache, _) = cache(0);
        let response = RawResponse::new(201, r#"{"id":1}"#)
            .with_header("Content-Type", "application/json")
            .with_url("https://example.com/items");

        cache.set("k", response.clone()).await.expect("set");

        let restored = cache.get("k").await.expect("get").expect("hit");
        assert_eq!(restored.status(), 201);
        assert_eq!(restored.status_text(), "Created");
        assert_eq!(restored.body(), response.body());
        assert_eq!(
            restored.headers().get("content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_blob_layout() {
        let (cache, _) = cache(0);
        cache
            .set("k", RawResponse::new(200, "hi"))
            .await
            .expect("set");

        let raw = cache
            .storage()
            .get_item(CACHE_NAMESPACE)
            .await
            .expect("get")
            .expect("blob present");
        let blob: serde_json::Value = serde_json::from_str(&raw).expect("json blob");

        assert_eq!(blob["k"]["body"], "hi");
        assert_eq!(blob["k"]["status"], 200);
        assert_eq!(blob["k"]["statusText"], "OK");
        assert_eq!(blob["k"]["insertedAt"], 5_000);
    }

    #[tokio::test]
    async fn test_entries_survive_a_new_cache_instance() {
        let storage = Arc::new(MemoryStorage::new());
        let first = PersistentCache::new(storage.clone(), Duration::ZERO);
        first
            .set("k", RawResponse::new(200, "kept"))
            .await
            .expect("set");

        let second = PersistentCache::new(storage, Duration::ZERO);
        let restored = second.get("k").await.expect("get").expect("hit");
        assert_eq!(restored.text().expect("text"), "kept");
    }

    #[tokio::test]
    async fn test_expiry_evicts_from_storage() {
        let (cache, clock) = cache(100);
        cache
            .set("k", RawResponse::new(200, "hi"))
            .await
            .expect("set");

        clock.advance(Duration::from_millis(101));
        assert_eq!(
            cache.lookup("k").await.expect("lookup"),
            CacheLookup::Expired
        );
        assert_eq!(cache.lookup("k").await.expect("lookup"), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_cleared() {
        let (cache, _) = cache(0);
        cache
            .storage()
            .set_item(CACHE_NAMESPACE, "{not json")
            .await
            .expect("set");

        assert_eq!(cache.lookup("k").await.expect("lookup"), CacheLookup::Miss);
        assert_eq!(
            cache
                .storage()
                .get_item(CACHE_NAMESPACE)
                .await
                .expect("get"),
            Some("{}".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (cache, _) = cache(0);
        for key in ["a", "b"] {
            cache
                .set(key, RawResponse::new(200, key.to_string()))
                .await
                .expect("set");
        }

        cache.delete(&["a"]).await.expect("delete");
        assert!(!cache.has("a").await.expect("has"));
        assert!(cache.has("b").await.expect("has"));

        cache.clear().await.expect("clear");
        assert!(!cache.has("b").await.expect("has"));
    }
}
