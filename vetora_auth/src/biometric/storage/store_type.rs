use chrono::{DateTime, Utc};

use crate::biometric::config::{MAX_AUTH_CHALLENGES, MAX_RECENT_DEVICES};
use crate::biometric::errors::BiometricError;
use crate::biometric::types::{
    AuthChallenge, BiometricCredential, RecentDevice, RegistrationChallenge,
};
use crate::storage::GENERIC_DATA_STORE;

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct BiometricStore;

impl BiometricStore {
    /// Initialize the biometric database tables
    pub(crate) async fn init() -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => create_tables_sqlite(pool).await,
            (_, Some(pool)) => create_tables_postgres(pool).await,
            _ => Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            )),
        }
    }

    #[tracing::instrument(fields(credential_id = %credential_id))]
    pub(crate) async fn get_credential(
        credential_id: &str,
    ) -> Result<Option<BiometricCredential>, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credential_by_id_sqlite(pool, credential_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credential_by_id_postgres(pool, credential_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    #[tracing::instrument(fields(user_id = %user_id))]
    pub(crate) async fn get_credential_by_user(
        user_id: &str,
    ) -> Result<Option<BiometricCredential>, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credential_by_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credential_by_user_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    #[tracing::instrument(skip(credential), fields(user_id = %credential.user_id))]
    pub(crate) async fn store_credential(
        credential: &BiometricCredential,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let result = if let Some(pool) = store.as_sqlite() {
            store_credential_sqlite(pool, credential).await
        } else if let Some(pool) = store.as_postgres() {
            store_credential_postgres(pool, credential).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        };

        match &result {
            Ok(()) => tracing::info!("Stored biometric credential"),
            Err(e) => tracing::error!(error = %e, "Failed to store biometric credential"),
        }

        result
    }

    pub(crate) async fn update_credential_counter(
        credential_id: &str,
        counter: i64,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            update_credential_counter_sqlite(pool, credential_id, counter).await
        } else if let Some(pool) = store.as_postgres() {
            update_credential_counter_postgres(pool, credential_id, counter).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn update_credential_last_used(
        credential_id: &str,
        last_used_at: DateTime<Utc>,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            update_credential_last_used_sqlite(pool, credential_id, last_used_at).await
        } else if let Some(pool) = store.as_postgres() {
            update_credential_last_used_postgres(pool, credential_id, last_used_at).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    /// Remove a user's credential along with any outstanding challenges
    #[tracing::instrument(fields(user_id = %user_id))]
    pub(crate) async fn delete_credential_by_user(user_id: &str) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_credential_by_user_sqlite(pool, user_id).await?;
            delete_challenges_for_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_credential_by_user_postgres(pool, user_id).await?;
            delete_challenges_for_user_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn put_registration_challenge(
        challenge: &RegistrationChallenge,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_registration_challenge_sqlite(pool, challenge).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_registration_challenge_postgres(pool, challenge).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn get_registration_challenge(
        user_id: &str,
    ) -> Result<Option<RegistrationChallenge>, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_registration_challenge_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_registration_challenge_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn remove_registration_challenge(
        user_id: &str,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_registration_challenge_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_registration_challenge_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    /// Add an authentication challenge to the user's ring of outstanding
    /// challenges.
    ///
    /// Expired entries are pruned lazily here, then the ring is trimmed so
    /// it never holds more than MAX_AUTH_CHALLENGES entries after insert.
    #[tracing::instrument(skip(challenge), fields(user_id = %challenge.user_id))]
    pub(crate) async fn add_auth_challenge(
        challenge: &AuthChallenge,
    ) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let now = Utc::now();

        if let Some(pool) = store.as_sqlite() {
            prune_expired_auth_challenges_sqlite(pool, &challenge.user_id, now).await?;
            trim_auth_challenges_sqlite(pool, &challenge.user_id, MAX_AUTH_CHALLENGES - 1).await?;
            insert_auth_challenge_sqlite(pool, challenge).await
        } else if let Some(pool) = store.as_postgres() {
            prune_expired_auth_challenges_postgres(pool, &challenge.user_id, now).await?;
            trim_auth_challenges_postgres(pool, &challenge.user_id, MAX_AUTH_CHALLENGES - 1)
                .await?;
            insert_auth_challenge_postgres(pool, challenge).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    /// Fetch and remove an authentication challenge, making it single-use.
    pub(crate) async fn take_auth_challenge(
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<AuthChallenge>, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            take_auth_challenge_sqlite(pool, user_id, challenge_id).await
        } else if let Some(pool) = store.as_postgres() {
            take_auth_challenge_postgres(pool, user_id, challenge_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn count_auth_challenges(user_id: &str) -> Result<i64, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            count_auth_challenges_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            count_auth_challenges_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    /// Record a device that just authenticated, keeping only the newest
    /// MAX_RECENT_DEVICES records per user.
    pub(crate) async fn add_recent_device(device: &RecentDevice) -> Result<(), BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_recent_device_sqlite(pool, device).await?;
            trim_recent_devices_sqlite(pool, &device.user_id, MAX_RECENT_DEVICES).await
        } else if let Some(pool) = store.as_postgres() {
            insert_recent_device_postgres(pool, device).await?;
            trim_recent_devices_postgres(pool, &device.user_id, MAX_RECENT_DEVICES).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }

    pub(crate) async fn get_recent_devices(
        user_id: &str,
    ) -> Result<Vec<RecentDevice>, BiometricError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_recent_devices_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_recent_devices_postgres(pool, user_id).await
        } else {
            Err(BiometricError::Storage(
                "Unsupported database type".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use chrono::Duration;
    use serial_test::serial;

    fn test_credential(user_id: &str) -> BiometricCredential {
        let now = Utc::now();
        BiometricCredential {
            credential_id: format!("cred-{user_id}"),
            user_id: user_id.to_string(),
            public_key: "BBase64urlKey".to_string(),
            counter: 0,
            transports: Some(r#"["internal"]"#.to_string()),
            device_type: "multiDevice".to_string(),
            backed_up: true,
            registered_at: now,
            last_used_at: now,
        }
    }

    fn auth_challenge(user_id: &str, suffix: usize, ttl_secs: i64) -> AuthChallenge {
        AuthChallenge {
            challenge_id: format!("chal-{user_id}-{suffix}"),
            user_id: user_id.to_string(),
            challenge: format!("challenge-value-{suffix}"),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    /// Test credential round trip: store, fetch by both keys, delete
    #[tokio::test]
    #[serial]
    async fn test_credential_round_trip() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-user-{}", Utc::now().timestamp_millis());
        let credential = test_credential(&user_id);

        BiometricStore::store_credential(&credential)
            .await
            .expect("Storing credential should succeed");

        let by_id = BiometricStore::get_credential(&credential.credential_id)
            .await
            .expect("Lookup by credential id should succeed")
            .expect("Credential should be found");
        assert_eq!(by_id, credential);

        let by_user = BiometricStore::get_credential_by_user(&user_id)
            .await
            .expect("Lookup by user should succeed")
            .expect("Credential should be found");
        assert_eq!(by_user.credential_id, credential.credential_id);

        BiometricStore::delete_credential_by_user(&user_id)
            .await
            .expect("Deletion should succeed");

        let gone = BiometricStore::get_credential_by_user(&user_id)
            .await
            .expect("Lookup should succeed");
        assert!(gone.is_none(), "Credential should be gone after deletion");
    }

    /// Test that storing a second credential for the same user fails
    ///
    /// The user_id column is unique, so the one-credential-per-user rule
    /// holds even if a caller skips the upfront check.
    #[tokio::test]
    #[serial]
    async fn test_second_credential_for_user_rejected() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-dup-{}", Utc::now().timestamp_millis());
        let first = test_credential(&user_id);
        BiometricStore::store_credential(&first)
            .await
            .expect("First credential should store");

        let mut second = test_credential(&user_id);
        second.credential_id = format!("other-{user_id}");
        let result = BiometricStore::store_credential(&second).await;
        assert!(
            matches!(result, Err(BiometricError::Storage(_))),
            "Second credential for the same user should be rejected"
        );

        let _ = BiometricStore::delete_credential_by_user(&user_id).await;
    }

    /// Test that the auth challenge ring never exceeds its cap
    #[tokio::test]
    #[serial]
    async fn test_auth_challenge_ring_is_capped() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-ring-{}", Utc::now().timestamp_millis());

        for i in 0..8 {
            BiometricStore::add_auth_challenge(&auth_challenge(&user_id, i, 120))
                .await
                .expect("Adding auth challenge should succeed");
        }

        let count = BiometricStore::count_auth_challenges(&user_id)
            .await
            .expect("Counting challenges should succeed");
        assert_eq!(count, MAX_AUTH_CHALLENGES, "Ring should be capped");

        // The oldest entries were evicted; the newest survive
        let oldest = BiometricStore::take_auth_challenge(&user_id, &format!("chal-{user_id}-0"))
            .await
            .expect("Take should succeed");
        assert!(oldest.is_none(), "Oldest challenge should have been evicted");

        let newest = BiometricStore::take_auth_challenge(&user_id, &format!("chal-{user_id}-7"))
            .await
            .expect("Take should succeed");
        assert!(newest.is_some(), "Newest challenge should still be present");
    }

    /// Test that expired challenges are pruned when a new one arrives
    #[tokio::test]
    #[serial]
    async fn test_expired_auth_challenges_are_pruned_lazily() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-prune-{}", Utc::now().timestamp_millis());

        // Two challenges already past their expiry
        BiometricStore::add_auth_challenge(&auth_challenge(&user_id, 0, -10))
            .await
            .expect("Adding expired challenge should succeed");
        BiometricStore::add_auth_challenge(&auth_challenge(&user_id, 1, -5))
            .await
            .expect("Adding expired challenge should succeed");

        // A fresh one triggers pruning of the expired entries
        BiometricStore::add_auth_challenge(&auth_challenge(&user_id, 2, 120))
            .await
            .expect("Adding fresh challenge should succeed");

        let count = BiometricStore::count_auth_challenges(&user_id)
            .await
            .expect("Counting challenges should succeed");
        assert_eq!(count, 1, "Only the fresh challenge should remain");
    }

    /// Test that taking an auth challenge consumes it
    #[tokio::test]
    #[serial]
    async fn test_take_auth_challenge_is_single_use() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-take-{}", Utc::now().timestamp_millis());
        let challenge = auth_challenge(&user_id, 0, 120);

        BiometricStore::add_auth_challenge(&challenge)
            .await
            .expect("Adding challenge should succeed");

        let first = BiometricStore::take_auth_challenge(&user_id, &challenge.challenge_id)
            .await
            .expect("Take should succeed");
        assert!(first.is_some(), "First take should find the challenge");

        let second = BiometricStore::take_auth_challenge(&user_id, &challenge.challenge_id)
            .await
            .expect("Take should succeed");
        assert!(second.is_none(), "Second take must come back empty");
    }

    /// Test registration challenge upsert and removal
    #[tokio::test]
    #[serial]
    async fn test_registration_challenge_is_replaced_on_reissue() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-reg-{}", Utc::now().timestamp_millis());
        let first = RegistrationChallenge {
            user_id: user_id.clone(),
            challenge_id: "reg-1".to_string(),
            challenge: "value-1".to_string(),
            expires_at: Utc::now() + Duration::seconds(300),
        };
        BiometricStore::put_registration_challenge(&first)
            .await
            .expect("Putting challenge should succeed");

        let second = RegistrationChallenge {
            challenge_id: "reg-2".to_string(),
            challenge: "value-2".to_string(),
            ..first.clone()
        };
        BiometricStore::put_registration_challenge(&second)
            .await
            .expect("Replacing challenge should succeed");

        let stored = BiometricStore::get_registration_challenge(&user_id)
            .await
            .expect("Getting challenge should succeed")
            .expect("Challenge should exist");
        assert_eq!(stored.challenge_id, "reg-2", "Reissue replaces the slot");

        BiometricStore::remove_registration_challenge(&user_id)
            .await
            .expect("Removing challenge should succeed");
        let gone = BiometricStore::get_registration_challenge(&user_id)
            .await
            .expect("Getting challenge should succeed");
        assert!(gone.is_none());
    }

    /// Test that the recent device list is bounded
    #[tokio::test]
    #[serial]
    async fn test_recent_devices_are_bounded() {
        init_test_environment().await;
        BiometricStore::init()
            .await
            .expect("Failed to initialize BiometricStore");

        let user_id = format!("bio-dev-{}", Utc::now().timestamp_millis());

        for i in 0..15 {
            let device = RecentDevice {
                user_id: user_id.clone(),
                device_name: format!("Device {i}"),
                authenticated_at: Utc::now() + Duration::seconds(i),
            };
            BiometricStore::add_recent_device(&device)
                .await
                .expect("Adding device should succeed");
        }

        let devices = BiometricStore::get_recent_devices(&user_id)
            .await
            .expect("Getting devices should succeed");
        assert_eq!(devices.len() as i64, MAX_RECENT_DEVICES);
        assert_eq!(
            devices[0].device_name, "Device 14",
            "Newest device should come first"
        );
    }
}
