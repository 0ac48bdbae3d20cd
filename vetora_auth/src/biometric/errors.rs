use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur during biometric (WebAuthn) operations.
///
/// Each failure mode gets its own variant so callers can map it to a
/// precise HTTP status instead of matching on message substrings.
#[derive(Debug, Error)]
pub enum BiometricError {
    /// The user already has a registered credential
    #[error("A biometric credential is already registered for this account")]
    AlreadyRegistered,

    /// The user has no registered credential
    #[error("No biometric credential is registered for this account")]
    NotRegistered,

    /// Error with the cryptographic challenge used in the WebAuthn protocol
    #[error("Invalid challenge: {0}")]
    Challenge(String),

    /// The challenge exists but its expiry has passed
    #[error("Challenge expired")]
    ChallengeExpired,

    /// Error during the authentication process (e.g., invalid signature)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Error during the registration process
    #[error("Registration error: {0}")]
    Registration(String),

    /// Error validating the client data JSON from the browser
    #[error("Invalid client data: {0}")]
    ClientData(String),

    /// Error parsing or validating the authenticator data structure
    #[error("Invalid authenticator data: {0}")]
    AuthenticatorData(String),

    /// Error during cryptographic verification of WebAuthn assertions
    #[error("Verification error: {0}")]
    Verification(String),

    /// Error when a requested resource (e.g., credential) is not found
    #[error("Not found error: {0}")]
    NotFound(String),

    /// Error accessing or modifying stored credential data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error with improperly formatted data
    #[error("Invalid format: {0}")]
    Format(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from JSON serialization/deserialization
    #[error("Serde error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
