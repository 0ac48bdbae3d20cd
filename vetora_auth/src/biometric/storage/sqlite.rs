use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

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

// SQLite implementations
pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), BiometricError> {
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
            counter INTEGER NOT NULL DEFAULT 0,
            transports TEXT,
            device_type TEXT NOT NULL,
            backed_up BOOLEAN NOT NULL DEFAULT FALSE,
            registered_at TIMESTAMP NOT NULL,
            last_used_at TIMESTAMP NOT NULL
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
            expires_at TIMESTAMP NOT NULL
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
            expires_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {recent_devices} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            device_name TEXT NOT NULL,
            authenticated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_credential_by_id_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<BiometricCredential>, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = credentials_table();

    sqlx::query_as::<_, BiometricCredential>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE credential_id = ?
        "#
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn get_credential_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Option<BiometricCredential>, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = credentials_table();

    sqlx::query_as::<_, BiometricCredential>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn store_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential: &BiometricCredential,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name}
            (credential_id, user_id, public_key, counter, transports, device_type,
             backed_up, registered_at, last_used_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
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

pub(super) async fn update_credential_counter_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    counter: i64,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET counter = ? WHERE credential_id = ?
        "#
    ))
    .bind(counter)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn update_credential_last_used_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    last_used_at: DateTime<Utc>,
) -> Result<(), BiometricError> {
    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET last_used_at = ? WHERE credential_id = ?
        "#
    ))
    .bind(last_used_at)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn delete_credential_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = credentials_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn upsert_registration_challenge_sqlite(
    pool: &Pool<Sqlite>,
    challenge: &RegistrationChallenge,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = registration_challenges_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (user_id, challenge_id, challenge, expires_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            challenge_id = excluded.challenge_id,
            challenge = excluded.challenge,
            expires_at = excluded.expires_at
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

pub(super) async fn get_registration_challenge_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Option<RegistrationChallenge>, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = registration_challenges_table();

    sqlx::query_as::<_, RegistrationChallenge>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn delete_registration_challenge_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<(), BiometricError> {
    let table_name = registration_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn insert_auth_challenge_sqlite(
    pool: &Pool<Sqlite>,
    challenge: &AuthChallenge,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (challenge_id, user_id, challenge, expires_at)
        VALUES (?, ?, ?, ?)
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

pub(super) async fn prune_expired_auth_challenges_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = ? AND expires_at < ?
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
pub(super) async fn trim_auth_challenges_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    keep: i64,
) -> Result<(), BiometricError> {
    let table_name = auth_challenges_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE user_id = ? AND challenge_id NOT IN (
            SELECT challenge_id FROM {table_name}
            WHERE user_id = ?
            ORDER BY expires_at DESC
            LIMIT ?
        )
        "#
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(keep)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn count_auth_challenges_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<i64, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = auth_challenges_table();

    let (count,): (i64,) = sqlx::query_as(&format!(
        r#"
        SELECT COUNT(*) FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(count)
}

pub(super) async fn take_auth_challenge_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    challenge_id: &str,
) -> Result<Option<AuthChallenge>, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = auth_challenges_table();

    let challenge = sqlx::query_as::<_, AuthChallenge>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ? AND challenge_id = ?
        "#
    ))
    .bind(user_id)
    .bind(challenge_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    if challenge.is_some() {
        sqlx::query(&format!(
            r#"
            DELETE FROM {table_name} WHERE user_id = ? AND challenge_id = ?
            "#
        ))
        .bind(user_id)
        .bind(challenge_id)
        .execute(pool)
        .await
        .map_err(|e| BiometricError::Storage(e.to_string()))?;
    }

    Ok(challenge)
}

pub(super) async fn insert_recent_device_sqlite(
    pool: &Pool<Sqlite>,
    device: &RecentDevice,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = recent_devices_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (user_id, device_name, authenticated_at)
        VALUES (?, ?, ?)
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
pub(super) async fn trim_recent_devices_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    keep: i64,
) -> Result<(), BiometricError> {
    let table_name = recent_devices_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE user_id = ? AND id NOT IN (
            SELECT id FROM {table_name}
            WHERE user_id = ?
            ORDER BY authenticated_at DESC, id DESC
            LIMIT ?
        )
        "#
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(keep)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_recent_devices_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<RecentDevice>, BiometricError> {
    create_tables_sqlite(pool).await?;

    let table_name = recent_devices_table();

    sqlx::query_as::<_, RecentDevice>(&format!(
        r#"
        SELECT user_id, device_name, authenticated_at FROM {table_name}
        WHERE user_id = ?
        ORDER BY authenticated_at DESC, id DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))
}

pub(super) async fn delete_challenges_for_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<(), BiometricError> {
    create_tables_sqlite(pool).await?;

    delete_registration_challenge_sqlite(pool, user_id).await?;

    let table_name = auth_challenges_table();
    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| BiometricError::Storage(e.to_string()))?;

    Ok(())
}
