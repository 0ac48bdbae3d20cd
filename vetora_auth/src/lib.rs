//! vetora-auth - Authentication core for the Vetora platform
//!
//! This crate coordinates the platform's authentication mechanisms: email +
//! password, biometric (WebAuthn), Google/Apple id tokens and wallet
//! signatures, with a shared non-expiring JWT token pair on top.

mod biometric;
mod config;
mod coordination;
mod oauth2;
mod storage;
mod token;
mod userdb;
mod utils;
mod wallet;

#[cfg(test)]
mod test_utils;

// Re-export the main coordination components
pub use coordination::{
    BiometricStatus, CoordinationError, ProfileUpdate, RecentDeviceEntry,
    authenticate_access_token, biometric_status, change_password, delete_account,
    finish_biometric_authentication, finish_biometric_registration, get_profile, login_user,
    logout, oauth_sign_in, refresh_tokens, register_user, remove_biometric_credential,
    request_wallet_nonce, start_biometric_authentication, start_biometric_registration,
    update_profile, update_settings, wallet_sign_in,
};

// Re-export the route prefix
pub use config::VETORA_ROUTE_PREFIX;

pub use biometric::{
    AuthenticationOptions, AuthenticatorResponse, BiometricCredential, BiometricError,
    RegisterCredential, RegistrationOptions,
};
pub use oauth2::{OAuth2Error, OAuthProvider};
pub use token::{AccessClaims, TokenError, TokenPair};
pub use userdb::{User, UserError};
pub use wallet::WalletError;

/// Initialize the authentication coordination layer
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the underlying stores
    userdb::init().await?;
    biometric::init().await?;
    Ok(())
}
