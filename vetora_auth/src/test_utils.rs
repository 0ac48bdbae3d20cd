//! Test utilities module for shared test initialization and helpers
//!
//! This module provides centralized test setup functionality that can be used
//! across all test modules in the crate to ensure consistent environment
//! configuration and database initialization.

use std::sync::Once;

/// Centralized test initialization for all tests across the entire crate
///
/// This function ensures that:
/// 1. Test environment variables are loaded from .env_test (with fallback to .env) - **ONCE**
/// 2. All database stores are initialized
///
/// SQLite functions ensure their tables exist at the point of use, so only
/// basic store setup is needed here.
///
/// ## Usage
/// ```rust
/// use crate::test_utils::init_test_environment;
///
/// #[tokio::test]
/// async fn my_test() {
///     init_test_environment().await;
///     // ... test code that requires database access
/// }
/// ```
pub async fn init_test_environment() {
    // Environment setup (synchronous, runs once)
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        println!("🧪 Loading test environment (.env_test)");
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });

    ensure_stores_initialized().await;
}

/// Ensures all stores are properly initialized
async fn ensure_stores_initialized() {
    use crate::biometric::BiometricStore;
    use crate::userdb::{UserStore, VendorStoreStore};

    // Initialize stores - log errors but don't panic in tests
    if let Err(e) = UserStore::init().await {
        eprintln!("Warning: Failed to initialize UserStore: {e}");
    }
    if let Err(e) = VendorStoreStore::init().await {
        eprintln!("Warning: Failed to initialize VendorStoreStore: {e}");
    }
    if let Err(e) = BiometricStore::init().await {
        eprintln!("Warning: Failed to initialize BiometricStore: {e}");
    }
}
