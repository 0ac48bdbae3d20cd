//! vetora-auth-axum - Axum integration for the vetora-auth library
//!
//! Exposes the authentication endpoints as an axum router and provides the
//! bearer-token extractors handlers use to identify callers.

mod auth;
mod biometric;
mod error;
mod oauth2;
mod router;
mod user;
mod wallet;

pub use auth::{AuthRejection, AuthUser, MaybeAuthUser};
pub use error::IntoResponseError;
pub use router::vetora_auth_router;

// Re-export the route prefix and initialization function from vetora_auth
pub use vetora_auth::{VETORA_ROUTE_PREFIX, init};
