use crate::storage::GENERIC_DATA_STORE;
use crate::userdb::{
    errors::UserError,
    types::{User, UserSearchField, VendorStore},
};

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct UserStore;

impl UserStore {
    /// Initialize the user database tables
    pub(crate) async fn init() -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => create_user_tables_sqlite(pool).await,
            (_, Some(pool)) => create_user_tables_postgres(pool).await,
            _ => Err(UserError::Storage("Unsupported database type".to_string())),
        }
    }

    /// Get a user by their ID
    #[tracing::instrument(fields(user_id = %id))]
    pub(crate) async fn get_user(id: &str) -> Result<Option<User>, UserError> {
        Self::get_user_by(UserSearchField::Id(id.to_string())).await
    }

    #[tracing::instrument(fields(user_field = %field))]
    pub(crate) async fn get_user_by(field: UserSearchField) -> Result<Option<User>, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let result = if let Some(pool) = store.as_sqlite() {
            get_user_by_field_sqlite(pool, &field).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_by_field_postgres(pool, &field).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        };

        match &result {
            Ok(Some(_)) => {
                tracing::debug!(found = true, "User lookup completed");
            }
            Ok(None) => {
                tracing::debug!(found = false, "User lookup completed - not found");
            }
            Err(e) => {
                tracing::error!(error = %e, "User lookup failed");
            }
        }

        result
    }

    /// Create or update a user
    #[tracing::instrument(skip(user), fields(user_id = %user.id))]
    pub(crate) async fn upsert_user(user: User) -> Result<User, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let result = if let Some(pool) = store.as_sqlite() {
            upsert_user_sqlite(pool, user).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_user_postgres(pool, user).await
        } else {
            return Err(UserError::Storage("Unsupported database type".to_string()));
        };

        match &result {
            Ok(user) => {
                tracing::info!(
                    user_id = %user.id,
                    sequence_number = user.sequence_number,
                    "User upsert completed successfully"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "User upsert failed");
            }
        }

        result
    }

    pub(crate) async fn delete_user(id: &str) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_user_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_user_postgres(pool, id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }
}

pub(crate) struct VendorStoreStore;

impl VendorStoreStore {
    /// Initialize the vendor store tables
    pub(crate) async fn init() -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => create_vendor_store_tables_sqlite(pool).await,
            (_, Some(pool)) => create_vendor_store_tables_postgres(pool).await,
            _ => Err(UserError::Storage("Unsupported database type".to_string())),
        }
    }

    /// Get the store owned by a user, if any
    #[tracing::instrument(fields(user_id = %user_id))]
    pub(crate) async fn get_store_by_user(user_id: &str) -> Result<Option<VendorStore>, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_vendor_store_by_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_vendor_store_by_user_postgres(pool, user_id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn upsert_store(vendor_store: VendorStore) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_vendor_store_sqlite(pool, vendor_store).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_vendor_store_postgres(pool, vendor_store).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn delete_stores_for_user(user_id: &str) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_vendor_stores_for_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_vendor_stores_for_user_postgres(pool, user_id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }
}
