//! Combined router for all authentication endpoints

use axum::Router;

/// Create a combined router for all authentication endpoints
///
/// Mount this under `VETORA_ROUTE_PREFIX` (default `/api/auth`); the
/// endpoints then appear at:
/// - {VETORA_ROUTE_PREFIX}/register, /login, /refresh, /logout, /profile,
///   /settings, /password, /account, /me
/// - {VETORA_ROUTE_PREFIX}/oauth/google, /oauth/apple
/// - {VETORA_ROUTE_PREFIX}/wallet
/// - {VETORA_ROUTE_PREFIX}/biometric/...
pub fn vetora_auth_router() -> Router {
    Router::new()
        .merge(super::user::router())
        .merge(super::wallet::router())
        .nest("/oauth", super::oauth2::router())
        .nest("/biometric", super::biometric::router())
}
