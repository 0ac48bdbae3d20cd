use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore};

const KEY_NAMESPACE: &str = "vetora";

impl InMemoryCacheStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Using the in-memory cache store");
        Self {
            entries: HashMap::new(),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{KEY_NAMESPACE}:{prefix}:{key}")
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&mut self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        self.entries.insert(Self::make_key(prefix, key), value);
        Ok(())
    }

    // Entries are never evicted here; callers that need an expiry embed it
    // in the payload and check it on read.
    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        _ttl: usize,
    ) -> Result<(), StorageError> {
        self.entries.insert(Self::make_key(prefix, key), value);
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self.entries.get(&Self::make_key(prefix, key)).cloned())
    }

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError> {
        self.entries.remove(&Self::make_key(prefix, key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        let result = InMemoryCacheStore::make_key("refresh_token", "user123");
        assert_eq!(result, "vetora:refresh_token:user123");
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "test value".to_string(),
        };

        store.put("test", "key1", value.clone()).await.unwrap();

        let retrieved = store.get("test", "key1").await.unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().value, "test value");
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let store = InMemoryCacheStore::new();
        let retrieved = store.get("test", "absent").await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "to be removed".to_string(),
        };

        store.put("test", "key2", value).await.unwrap();
        store.remove("test", "key2").await.unwrap();

        let retrieved = store.get("test", "key2").await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_prefixes_are_isolated() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "prefixed".to_string(),
        };

        store.put("a", "shared", value).await.unwrap();

        assert!(store.get("a", "shared").await.unwrap().is_some());
        assert!(store.get("b", "shared").await.unwrap().is_none());
    }
}
