use sqlx::{Pool, Postgres};

use crate::storage::DB_TABLE_PREFIX;
use crate::userdb::{
    errors::UserError,
    types::{User, UserSearchField, VendorStore},
};

fn users_table() -> String {
    format!("{}users", *DB_TABLE_PREFIX)
}

fn vendor_stores_table() -> String {
    format!("{}vendor_stores", *DB_TABLE_PREFIX)
}

// PostgreSQL implementations
pub(super) async fn create_user_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let table_name = users_table();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            sequence_number BIGSERIAL PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT,
            wallet_address TEXT UNIQUE,
            google_sub TEXT UNIQUE,
            apple_sub TEXT UNIQUE,
            role TEXT NOT NULL DEFAULT 'user',
            settings TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn create_vendor_store_tables_postgres(
    pool: &Pool<Postgres>,
) -> Result<(), UserError> {
    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_user_by_field_postgres(
    pool: &Pool<Postgres>,
    field: &UserSearchField,
) -> Result<Option<User>, UserError> {
    let table_name = users_table();

    let (column, value) = match field {
        UserSearchField::Id(v) => ("id", v),
        UserSearchField::Email(v) => ("email", v),
        UserSearchField::WalletAddress(v) => ("wallet_address", v),
        UserSearchField::GoogleSub(v) => ("google_sub", v),
        UserSearchField::AppleSub(v) => ("apple_sub", v),
    };

    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE {column} = $1
        "#
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn upsert_user_postgres(
    pool: &Pool<Postgres>,
    user: User,
) -> Result<User, UserError> {
    let table_name = users_table();
    let now = chrono::Utc::now();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name}
            (id, email, display_name, password_hash, wallet_address, google_sub, apple_sub,
             role, settings, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            email = EXCLUDED.email,
            display_name = EXCLUDED.display_name,
            password_hash = EXCLUDED.password_hash,
            wallet_address = EXCLUDED.wallet_address,
            google_sub = EXCLUDED.google_sub,
            apple_sub = EXCLUDED.apple_sub,
            role = EXCLUDED.role,
            settings = EXCLUDED.settings,
            updated_at = $12
        "#
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(&user.password_hash)
    .bind(&user.wallet_address)
    .bind(&user.google_sub)
    .bind(&user.apple_sub)
    .bind(&user.role)
    .bind(&user.settings)
    .bind(user.created_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(UserError::from_sqlx)?;

    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE id = $1
        "#
    ))
    .bind(&user.id)
    .fetch_one(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn delete_user_postgres(pool: &Pool<Postgres>, id: &str) -> Result<(), UserError> {
    let table_name = users_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE id = $1
        "#
    ))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_vendor_store_by_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Option<VendorStore>, UserError> {
    let table_name = vendor_stores_table();

    sqlx::query_as::<_, VendorStore>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = $1 LIMIT 1
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn upsert_vendor_store_postgres(
    pool: &Pool<Postgres>,
    store: VendorStore,
) -> Result<(), UserError> {
    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, name, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name
        "#
    ))
    .bind(&store.id)
    .bind(&store.user_id)
    .bind(&store.name)
    .bind(store.created_at)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn delete_vendor_stores_for_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<(), UserError> {
    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = $1
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}
