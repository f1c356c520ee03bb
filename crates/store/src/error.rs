use domain::CommerceError;
use thiserror::Error;

/// Errors that can occur when reading or mutating the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule refused the operation; nothing was written.
    #[error(transparent)]
    Rejected(#[from] CommerceError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns the business rejection, if this is one.
    pub fn rejection(&self) -> Option<&CommerceError> {
        match self {
            StoreError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
