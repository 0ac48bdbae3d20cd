//! Error types for authentication coordination

use thiserror::Error;

use crate::biometric::BiometricError;
use crate::oauth2::OAuth2Error;
use crate::token::TokenError;
use crate::userdb::UserError;
use crate::utils::UtilError;
use crate::wallet::WalletError;

/// Errors that can occur during authentication coordination
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// General coordination error
    #[error("Coordination error: {0}")]
    Coordination(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Unauthorized access error
    #[error("Unauthorized access")]
    Unauthorized,

    /// Request payload is missing or malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found with context
    #[error("Resource not found: {resource_type} {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Error from the user database operations
    #[error("User error: {0}")]
    UserError(UserError),

    /// Error from token operations
    #[error("Token error: {0}")]
    TokenError(TokenError),

    /// Error from biometric operations
    #[error("Biometric error: {0}")]
    BiometricError(BiometricError),

    /// Error from OAuth2 operations
    #[error("OAuth2 error: {0}")]
    OAuth2Error(OAuth2Error),

    /// Error from wallet operations
    #[error("Wallet error: {0}")]
    WalletError(WalletError),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    UtilsError(UtilError),
}

impl CoordinationError {
    /// Log the error and return self
    ///
    /// This method logs the error with appropriate context and returns self,
    /// allowing for method chaining and explicit logging when needed.
    pub fn log(self) -> Self {
        match &self {
            Self::Coordination(msg) => tracing::error!("Coordination error: {}", msg),
            Self::Database(msg) => tracing::error!("Database error: {}", msg),
            Self::Unauthorized => tracing::debug!("Unauthorized access"),
            Self::InvalidRequest(msg) => tracing::debug!("Invalid request: {}", msg),
            Self::Conflict(msg) => tracing::debug!("Conflict: {}", msg),
            Self::ResourceNotFound {
                resource_type,
                resource_id,
            } => tracing::debug!("Resource not found: {} {}", resource_type, resource_id),
            Self::UserError(err) => tracing::error!("User error: {}", err),
            Self::TokenError(err) => tracing::error!("Token error: {}", err),
            Self::BiometricError(err) => tracing::error!("Biometric error: {}", err),
            Self::OAuth2Error(err) => tracing::error!("OAuth2 error: {}", err),
            Self::WalletError(err) => tracing::error!("Wallet error: {}", err),
            Self::UtilsError(err) => tracing::error!("Utils error: {}", err),
        }
        self
    }
}

// Custom From implementations that automatically log errors

impl From<UserError> for CoordinationError {
    fn from(err: UserError) -> Self {
        let error = Self::UserError(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<TokenError> for CoordinationError {
    fn from(err: TokenError) -> Self {
        let error = Self::TokenError(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<BiometricError> for CoordinationError {
    fn from(err: BiometricError) -> Self {
        let error = Self::BiometricError(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<OAuth2Error> for CoordinationError {
    fn from(err: OAuth2Error) -> Self {
        let error = Self::OAuth2Error(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<WalletError> for CoordinationError {
    fn from(err: WalletError) -> Self {
        let error = Self::WalletError(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        let error = Self::UtilsError(err);
        tracing::error!("{}", error);
        error
    }
}
