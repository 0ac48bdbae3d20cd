//! Derived role resolution
//!
//! An account's role is not authoritative on the user record; it is derived
//! from whether the user currently owns a vendor store. Lookups go through a
//! short-lived cache entry so the read path never writes back to the user
//! record.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::token::verify_access_token;
use crate::userdb::{ROLE_USER, ROLE_VENDOR, User, UserStore, VendorStoreStore};

use super::errors::CoordinationError;

const ROLE_CACHE_PREFIX: &str = "user_role";

/// How long a derived role stays cached, in seconds
static ROLE_CACHE_TTL: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("ROLE_CACHE_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
});

/// Cached role record. The in-memory cache backend does not evict, so the
/// expiry rides in the record and is checked on read.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRole {
    role: String,
    expires_at: DateTime<Utc>,
}

/// Resolve the derived role for a user, consulting the cache first.
///
/// An expired or unreadable cache entry counts as a miss and is
/// overwritten by the fresh lookup.
pub(super) async fn resolve_role(user_id: &str) -> Result<String, CoordinationError> {
    {
        let store = GENERIC_CACHE_STORE.lock().await;
        if let Some(cached) = store
            .get(ROLE_CACHE_PREFIX, user_id)
            .await
            .map_err(|e| CoordinationError::Database(e.to_string()))?
            && let Ok(record) = serde_json::from_str::<StoredRole>(&cached.value)
            && record.expires_at > Utc::now()
        {
            return Ok(record.role);
        }
    }

    let role = if VendorStoreStore::get_store_by_user(user_id).await?.is_some() {
        ROLE_VENDOR
    } else {
        ROLE_USER
    };

    let record = StoredRole {
        role: role.to_string(),
        expires_at: Utc::now() + Duration::seconds(*ROLE_CACHE_TTL as i64),
    };
    let value = serde_json::to_string(&record)
        .map_err(|e| CoordinationError::Coordination(e.to_string()))?;

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            ROLE_CACHE_PREFIX,
            user_id,
            CacheData { value },
            *ROLE_CACHE_TTL as usize,
        )
        .await
        .map_err(|e| CoordinationError::Database(e.to_string()))?;

    Ok(role.to_string())
}

/// Drop the cached role for a user so the next lookup hits the database.
pub(super) async fn invalidate_role_cache(user_id: &str) -> Result<(), CoordinationError> {
    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(ROLE_CACHE_PREFIX, user_id)
        .await
        .map_err(|e| CoordinationError::Database(e.to_string()))
}

/// Verify a bearer access token and load its user with the derived role.
///
/// This is the single entry point the HTTP extractors use; any failure
/// collapses to `Unauthorized` so callers never learn whether the token or
/// the account was the problem.
pub async fn authenticate_access_token(token: &str) -> Result<User, CoordinationError> {
    let claims =
        verify_access_token(token).map_err(|_| CoordinationError::Unauthorized.log())?;

    let mut user = UserStore::get_user(&claims.user_id)
        .await?
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;

    user.role = resolve_role(&user.id).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use crate::token::issue_token_pair;
    use crate::userdb::VendorStore;
    use chrono::Utc;
    use serial_test::serial;

    /// Test that the derived role follows vendor store ownership
    ///
    /// The cached value is served until invalidated, so the vendor role only
    /// becomes visible after the cache entry is dropped.
    #[tokio::test]
    #[serial]
    async fn test_role_follows_vendor_store() {
        init_test_environment().await;

        let user = UserStore::upsert_user(User::new(
            "role-user-1".to_string(),
            Some("role-user-1@example.com".to_string()),
            "Role User".to_string(),
        ))
        .await
        .expect("User creation should succeed");

        invalidate_role_cache(&user.id)
            .await
            .expect("Cache invalidation should succeed");
        let role = resolve_role(&user.id).await.expect("Role should resolve");
        assert_eq!(role, "user");

        VendorStoreStore::upsert_store(VendorStore {
            id: "role-store-1".to_string(),
            user_id: user.id.clone(),
            name: "Role Store".to_string(),
            created_at: Utc::now(),
        })
        .await
        .expect("Store creation should succeed");

        // Still cached as plain user
        let role = resolve_role(&user.id).await.expect("Role should resolve");
        assert_eq!(role, "user");

        invalidate_role_cache(&user.id)
            .await
            .expect("Cache invalidation should succeed");
        let role = resolve_role(&user.id).await.expect("Role should resolve");
        assert_eq!(role, "vendor");

        let _ = VendorStoreStore::delete_stores_for_user(&user.id).await;
        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test that an expired cache entry counts as a miss
    ///
    /// The in-memory cache backend never evicts, so a stale record must be
    /// ignored based on its embedded expiry; otherwise a user who gains or
    /// loses a vendor store would keep the old role for the process
    /// lifetime.
    #[tokio::test]
    #[serial]
    async fn test_expired_role_cache_entry_is_refreshed() {
        init_test_environment().await;

        let user = UserStore::upsert_user(User::new(
            "role-user-3".to_string(),
            Some("role-user-3@example.com".to_string()),
            "Stale Role User".to_string(),
        ))
        .await
        .expect("User creation should succeed");

        // Seed a vendor entry whose expiry is already in the past
        let stale = StoredRole {
            role: ROLE_VENDOR.to_string(),
            expires_at: Utc::now() - Duration::seconds(5),
        };
        GENERIC_CACHE_STORE
            .lock()
            .await
            .put_with_ttl(
                ROLE_CACHE_PREFIX,
                &user.id,
                CacheData {
                    value: serde_json::to_string(&stale).unwrap(),
                },
                60,
            )
            .await
            .expect("Cache write should succeed");

        let role = resolve_role(&user.id).await.expect("Role should resolve");
        assert_eq!(
            role, "user",
            "An expired cache entry must not be served as the current role"
        );

        // A live entry is served without hitting the database
        let live = StoredRole {
            role: ROLE_VENDOR.to_string(),
            expires_at: Utc::now() + Duration::seconds(60),
        };
        GENERIC_CACHE_STORE
            .lock()
            .await
            .put_with_ttl(
                ROLE_CACHE_PREFIX,
                &user.id,
                CacheData {
                    value: serde_json::to_string(&live).unwrap(),
                },
                60,
            )
            .await
            .expect("Cache write should succeed");

        let role = resolve_role(&user.id).await.expect("Role should resolve");
        assert_eq!(role, "vendor");

        let _ = invalidate_role_cache(&user.id).await;
        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test that authenticate_access_token loads the user behind a token
    #[tokio::test]
    #[serial]
    async fn test_authenticate_access_token() {
        init_test_environment().await;

        let user = UserStore::upsert_user(User::new(
            "role-user-2".to_string(),
            Some("role-user-2@example.com".to_string()),
            "Token User".to_string(),
        ))
        .await
        .expect("User creation should succeed");

        let pair = issue_token_pair(&user.id)
            .await
            .expect("Token issuance should succeed");

        let authenticated = authenticate_access_token(&pair.access_token)
            .await
            .expect("Authentication should succeed");
        assert_eq!(authenticated.id, user.id);
        assert_eq!(authenticated.role, "user");

        // Garbage tokens and tokens for deleted users both collapse to Unauthorized
        assert!(matches!(
            authenticate_access_token("not-a-jwt").await,
            Err(CoordinationError::Unauthorized)
        ));

        UserStore::delete_user(&user.id)
            .await
            .expect("User deletion should succeed");
        assert!(matches!(
            authenticate_access_token(&pair.access_token).await,
            Err(CoordinationError::Unauthorized)
        ));
    }
}
