//! Authentication coordination module
//!
//! This module provides high-level functions that coordinate between the
//! individual authentication mechanisms (password, biometric, OAuth, wallet)
//! and user management. It is the entry point the HTTP layer calls into.
//!
//! The module is divided into several submodules:
//! - `errors`: Error types specific to coordination operations
//! - `user`: Registration, login and account management
//! - `biometric`: WebAuthn registration/authentication flow coordination
//! - `oauth2`: Provider id-token sign-in
//! - `wallet`: Wallet nonce and signature sign-in
//! - `token`: Refresh and logout
//! - `role`: Derived role resolution and bearer-token authentication

mod biometric;
mod errors;
mod oauth2;
mod role;
mod token;
mod user;
mod wallet;

pub use biometric::{
    BiometricStatus, RecentDeviceEntry, biometric_status, finish_biometric_authentication,
    finish_biometric_registration, remove_biometric_credential, start_biometric_authentication,
    start_biometric_registration,
};
pub use errors::CoordinationError;
pub use oauth2::oauth_sign_in;
pub use role::authenticate_access_token;
pub use token::{logout, refresh_tokens};
pub use user::{
    ProfileUpdate, change_password, delete_account, get_profile, login_user, register_user,
    update_profile, update_settings,
};
pub use wallet::{request_wallet_nonce, wallet_sign_in};
