mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use errors::BiometricError;
pub use types::{
    AuthenticationOptions, AuthenticatorResponse, BiometricCredential, RegisterCredential,
    RegistrationOptions,
};

pub(crate) use main::{
    finish_authentication, finish_registration, start_authentication, start_registration,
};
pub(crate) use storage::BiometricStore;

pub(crate) async fn init() -> Result<(), BiometricError> {
    BiometricStore::init().await
}
