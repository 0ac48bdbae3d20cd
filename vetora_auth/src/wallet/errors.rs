use thiserror::Error;

/// Errors that can occur during wallet signature authentication.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The supplied address is not a valid Ethereum address
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// The signature is malformed or does not recover to the claimed address
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// No outstanding nonce for the address, or it expired
    #[error("Nonce not found or expired")]
    NonceNotFound,

    /// Error accessing the nonce store
    #[error("Storage error: {0}")]
    Storage(String),
}
