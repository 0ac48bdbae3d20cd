//! Central configuration for the vetora-auth crate

use std::sync::LazyLock;

/// Route prefix under which all authentication endpoints are mounted.
///
/// Default: "/api/auth"
pub static VETORA_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    std::env::var("VETORA_ROUTE_PREFIX").unwrap_or_else(|_| "/api/auth".to_string())
});
