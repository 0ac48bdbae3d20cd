mod config;
mod errors;
mod main;
mod types;

pub use errors::TokenError;
pub use types::{AccessClaims, TokenPair};

pub(crate) use main::{
    issue_token_pair, refresh_token_pair, revoke_refresh_token, verify_access_token,
};
