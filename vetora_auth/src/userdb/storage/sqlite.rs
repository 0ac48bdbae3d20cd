use sqlx::{Pool, Sqlite};

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

// SQLite implementations
pub(super) async fn create_user_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let table_name = users_table();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            sequence_number INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT,
            wallet_address TEXT UNIQUE,
            google_sub TEXT UNIQUE,
            apple_sub TEXT UNIQUE,
            role TEXT NOT NULL DEFAULT 'user',
            settings TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn create_vendor_store_tables_sqlite(
    pool: &Pool<Sqlite>,
) -> Result<(), UserError> {
    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_user_by_field_sqlite(
    pool: &Pool<Sqlite>,
    field: &UserSearchField,
) -> Result<Option<User>, UserError> {
    // Ensure tables exist before any operations - this is critical for in-memory databases
    create_user_tables_sqlite(pool).await?;

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
        SELECT * FROM {table_name} WHERE {column} = ?
        "#
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn upsert_user_sqlite(pool: &Pool<Sqlite>, user: User) -> Result<User, UserError> {
    // Ensure tables exist before any operations - this is critical for in-memory databases
    create_user_tables_sqlite(pool).await?;

    let table_name = users_table();
    let now = chrono::Utc::now();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name}
            (id, email, display_name, password_hash, wallet_address, google_sub, apple_sub,
             role, settings, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            email = excluded.email,
            display_name = excluded.display_name,
            password_hash = excluded.password_hash,
            wallet_address = excluded.wallet_address,
            google_sub = excluded.google_sub,
            apple_sub = excluded.apple_sub,
            role = excluded.role,
            settings = excluded.settings,
            updated_at = ?
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

    // Fetch the user back to get the sequence_number
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(&user.id)
    .fetch_one(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn delete_user_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), UserError> {
    create_user_tables_sqlite(pool).await?;

    let table_name = users_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_vendor_store_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Option<VendorStore>, UserError> {
    create_vendor_store_tables_sqlite(pool).await?;

    let table_name = vendor_stores_table();

    sqlx::query_as::<_, VendorStore>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ? LIMIT 1
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn upsert_vendor_store_sqlite(
    pool: &Pool<Sqlite>,
    store: VendorStore,
) -> Result<(), UserError> {
    create_vendor_store_tables_sqlite(pool).await?;

    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, name, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name
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

pub(super) async fn delete_vendor_stores_for_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<(), UserError> {
    create_vendor_store_tables_sqlite(pool).await?;

    let table_name = vendor_stores_table();

    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE user_id = ?
        "#
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}
