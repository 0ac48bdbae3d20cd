use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::biometric::errors::BiometricError;
use crate::biometric::types::{
    AuthChallenge, BiometricCredential, RecentDevice, RegistrationChallenge,
};
use crate::storage::DB_TABLE_PREFIX;

fn credentials_table() -> String {
    format!("{}biometric_credentials", *DB_TABLE_PREFIX)
}

fn registration_challenges_table() -> String {
    format!("{}biometric_registration_challenges", *DB_TABLE_PREFIX)
}

fn auth_challenges_table() -> String {
    format!("{}biometric_auth_challenges", *DB_TABLE_PREFIX)
}

fn recent_devices_table() -> String {
    format!("{}biometric_recent_devices", *DB_TABLE_PREFIX)
}

// PostgreSQL implementations
pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), BiometricError> {
    let credentials = credentials_table();
    let registration_challenges = registration_challenges_table();
    let auth_challenges = auth_challenges_table();
    let recent_devices = recent_devices_table();

    // user_id is UNIQUE: at most one credential per user
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {credentials} (
            credential_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            public_key TEXT NOT NULL,
            counter BIGINT NOT NULL DEFAULT 0,
            transports TEXT,
            device_type TEXT NOT NULL,
            backed_up BOOLEAN NOT NULL DEFAULT FALSE,
            registered_at TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {registration_challenges} (
            user_id TEXT PRIMARY KEY,
            challenge_id TEXT NOT NULL,
            challenge TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {auth_challenges} (
            challenge_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            challenge TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {recent_devices} (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            device_name TEXT NOT NULL,
            authenticated_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_credential_by_id_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<BiometricCredential>, BiometricError> {
    let table_name = credentials_table();

    sqlx::query_as::<_, BiometricCredential>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE credential_id = $1
        "#
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn get_credential_by_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Option<BiometricCredential>, BiometricError> {
    let table_name = credentials_table();

    sqlx::query_as::<_, BiometricCredential>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn store_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &BiometricCredential,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name}
            (credential_id, user_id, public_key, counter, transports, device_type,
             backed_up, registered_at, last_used_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(credential.counter)
    .bind(&credential.transports)
    .bind(&credential.device_type)
    .bind(credential.backed_up)
    .bind(credential.registered_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn update_credential_counter_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    counter: i64,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET counter = $1 WHERE credential_id = $2
        "#
    ))
    .bind(counter)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn update_credential_last_used_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    last_used_at: DateTime<Utc>,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET last_used_at = $1 WHERE credential_id = $2
        "#
    ))
    .bind(last_used_at)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn delete_credential_by_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn upsert_registration_challenge_postgres(
    pool: &Pool<Postgres>,
    challenge: &RegistrationChallenge,
) -> Result<(), BiometricError> {
    let table_name = registration_challenges_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (user_id, challenge_id, challenge, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            challenge_id = EXCLUDED.challenge_id,
            challenge = EXCLUDED.challenge,
            expires_at = EXCLUDED.expires_at
        "#
    ))
    .bind(&challenge.user_id)
    .bind(&challenge.challenge_id)
    .bind(&challenge.challenge)
    .bind(challenge.expires_at)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_registration_challenge_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Option<RegistrationChallenge>, BiometricError> {
    let table_name = registration_challenges_table();

    sqlx::query_as::<_, RegistrationChallenge>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn delete_registration_challenge_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<(), BiometricError> {
    let table_name = registration_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn insert_auth_challenge_postgres(
    pool: &Pool<Postgres>,
    challenge: &AuthChallenge,
) -> Result<(), BiometricError> {
    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (challenge_id, user_id, challenge, expires_at)
        VALUES ($1, $2, $3, $4)
        "#
    ))
    .bind(&challenge.challenge_id)
    .bind(&challenge.user_id)
    .bind(&challenge.challenge)
    .bind(challenge.expires_at)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn prune_expired_auth_challenges_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), BiometricError> {
    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = $1 AND expires_at < $2
        "#
    ))
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

/// Keep only the `keep` newest outstanding challenges for a user.
pub(super) async fn trim_auth_challenges_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    keep: i64,
) -> Result<(), BiometricError> {
    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE user_id = $1 AND challenge_id NOT IN (
            SELECT challenge_id FROM {table_name}
            WHERE user_id = $1
            ORDER BY expires_at DESC
            LIMIT $2
        )
        "#
    ))
    .bind(user_id)
    .bind(keep)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn count_auth_challenges_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<i64, BiometricError> {
    let table_name = auth_challenges_table();

    let (count,): (i64,) = sqlx::query_as(&format!(
        r#"
        SELECT COUNT(*) FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(count)
}

pub(super) async fn take_auth_challenge_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    challenge_id: &str,
) -> Result<Option<AuthChallenge>, BiometricError> {
    let table_name = auth_challenges_table();

    sqlx::query_as::<_, AuthChallenge>(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE user_id = $1 AND challenge_id = $2
        RETURNING challenge_id, user_id, challenge, expires_at
        "#
    ))
    .bind(user_id)
    .bind(challenge_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn insert_recent_device_postgres(
    pool: &Pool<Postgres>,
    device: &RecentDevice,
) -> Result<(), BiometricError> {
    let table_name = recent_devices_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (user_id, device_name, authenticated_at)
        VALUES ($1, $2, $3)
        "#
    ))
    .bind(&device.user_id)
    .bind(&device.device_name)
    .bind(device.authenticated_at)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

/// Keep only the `keep` newest device records for a user.
pub(super) async fn trim_recent_devices_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    keep: i64,
) -> Result<(), BiometricError> {
    let table_name = recent_devices_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE user_id = $1 AND id NOT IN (
            SELECT id FROM {table_name}
            WHERE user_id = $1
            ORDER BY authenticated_at DESC, id DESC
            LIMIT $2
        )
        "#
    ))
    .bind(user_id)
    .bind(keep)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_recent_devices_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<RecentDevice>, BiometricError> {
    let table_name = recent_devices_table();

    sqlx::query_as::<_, RecentDevice>(&format!(
        r#"
        SELECT user_id, device_name, authenticated_at FROM {table_name}
        WHERE user_id = $1
        ORDER BY authenticated_at DESC, id DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn delete_challenges_for_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<(), BiometricError> {
    delete_registration_challenge_postgres(pool, user_id).await?;

    let table_name = auth_challenges_table();
    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}
