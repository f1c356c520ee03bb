//! Workflow error types.

use domain::CommerceError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the cart and order services.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A business rule refused the request.
    #[error(transparent)]
    Rejected(#[from] CommerceError),

    /// The caller is not allowed to perform the operation.
    #[error("Admin access required")]
    Forbidden,

    /// The store failed for a reason unrelated to business rules.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(rejection) => WorkflowError::Rejected(rejection),
            other => WorkflowError::Store(other),
        }
    }
}

impl WorkflowError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Rejected(rejection) => rejection.kind(),
            WorkflowError::Forbidden => "forbidden",
            WorkflowError::Store(_) => "store",
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
