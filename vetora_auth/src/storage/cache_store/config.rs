use std::{env, sync::LazyLock};
use tokio::sync::Mutex;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};

pub static GENERIC_CACHE_STORE_TYPE: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_CACHE_STORE_TYPE").expect("GENERIC_CACHE_STORE_TYPE must be set")
});

pub static GENERIC_CACHE_STORE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_CACHE_STORE_URL").expect("GENERIC_CACHE_STORE_URL must be set")
});

/// Process-wide cache store, shared by refresh tokens, role lookups,
/// wallet nonces and JWKS documents.
pub static GENERIC_CACHE_STORE: LazyLock<Mutex<Box<dyn CacheStore>>> = LazyLock::new(|| {
    let store_type = GENERIC_CACHE_STORE_TYPE.as_str();
    let store_url = GENERIC_CACHE_STORE_URL.as_str();

    tracing::info!(
        store_type = %store_type,
        "Selecting cache store backend"
    );

    let store: Box<dyn CacheStore> = match store_type {
        "memory" => Box::new(InMemoryCacheStore::new()),
        "redis" => {
            let client = redis::Client::open(store_url)
                .unwrap_or_else(|e| panic!("Bad cache store URL {store_url}: {e}"));
            let store = RedisCacheStore { client };
            // Fail at startup rather than on the first request
            if let Err(e) = tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async { store.init().await })
            }) {
                panic!("Redis cache store at {store_url} is unreachable: {e}");
            }
            tracing::info!(url = %store_url, "Connected to Redis cache store");
            Box::new(store)
        }
        t => panic!("Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"),
    };

    Mutex::new(store)
});
