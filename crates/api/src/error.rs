//! API error types with HTTP response mapping.
//!
//! Every error body is `{"success": false, "error": <message>}`; stock
//! shortfalls add a `details` array with one line per offending book.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::CommerceError;
use serde::Serialize;
use workflow::WorkflowError;

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(AuthError),
    /// Workflow error, including business rule rejections.
    Workflow(WorkflowError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            ApiError::Workflow(WorkflowError::Rejected(err)) => {
                if let CommerceError::InsufficientStock(lines) = &err {
                    details = Some(lines.iter().map(ToString::to_string).collect());
                }
                (rejection_status(&err), err.to_string())
            }
            ApiError::Workflow(WorkflowError::Forbidden) => (
                StatusCode::FORBIDDEN,
                WorkflowError::Forbidden.to_string(),
            ),
            ApiError::Workflow(WorkflowError::Store(err)) => {
                tracing::error!(error = %err, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
            details,
        };
        (status, axum::Json(body)).into_response()
    }
}

fn rejection_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::Validation(_)
        | CommerceError::EmptyCart
        | CommerceError::InsufficientStock(_) => StatusCode::BAD_REQUEST,
        CommerceError::BookNotFound(_)
        | CommerceError::CartItemNotFound(_)
        | CommerceError::OrderNotFound(_)
        | CommerceError::AlreadyProcessed { .. } => StatusCode::NOT_FOUND,
        CommerceError::InvalidTransition { .. } => StatusCode::CONFLICT,
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        ApiError::Workflow(WorkflowError::Rejected(err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
