use thiserror::Error;

/// Errors that can occur during user database operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Error accessing or modifying stored user data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error when a requested user is not found
    #[error("User not found: {0}")]
    NotFound(String),

    /// Error when a unique constraint would be violated
    #[error("Duplicate user: {0}")]
    Duplicate(String),

    /// Error converting between data formats
    #[error("Invalid user data: {0}")]
    InvalidData(String),
}

impl UserError {
    /// Classify a database error from a write, so a unique-constraint
    /// violation on email, wallet address or provider subject surfaces as
    /// `Duplicate` instead of a generic storage failure.
    pub(super) fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return Self::Duplicate(db_err.to_string());
        }
        Self::Storage(e.to_string())
    }
}
