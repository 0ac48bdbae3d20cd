mod config;
mod errors;
mod main;

pub use errors::WalletError;

pub(crate) use main::{consume_nonce, issue_nonce, verify_wallet_signature};
