mod config;
mod errors;
mod main;
mod types;

pub use errors::OAuth2Error;
pub use main::TokenVerificationError;
pub use types::{OAuthIdentity, OAuthProvider};

pub(crate) use main::{verify_apple_token, verify_google_token};
