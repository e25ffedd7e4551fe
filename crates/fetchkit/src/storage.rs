//! Key-value storage backing the persistent cache

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Error;

/// String key-value store
///
/// Used by [`PersistentCache`](crate::cache::PersistentCache) to keep responses
/// across process restarts.
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    /// Read the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set_item(key, value).await
    }
}

/// In-process [`Storage`]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
