use thiserror::Error;

/// Errors that can occur during token issuance and verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token signature or structure is invalid
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// The refresh token is not present in the server-side store
    #[error("Refresh token revoked or unknown")]
    Revoked,

    /// The server-side refresh token record has expired
    #[error("Refresh token expired")]
    Expired,

    /// Error accessing the token store
    #[error("Storage error: {0}")]
    Storage(String),
}
