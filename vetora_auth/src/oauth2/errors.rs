use thiserror::Error;

use super::main::TokenVerificationError;

/// Errors that can occur while bridging OAuth identity providers.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    /// The identity token failed cryptographic or claim verification
    #[error("Id token verification failed: {0}")]
    IdToken(#[from] TokenVerificationError),

    /// The verified token is missing a claim we require
    #[error("Missing claim: {0}")]
    MissingClaim(String),
}
