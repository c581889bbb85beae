// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::models::comment::CommentStatus;

/// Errors raised by the comment engine.
/// Every variant carries a stable machine-readable code, see [`CommentError::code`].
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("Target not found")]
    TargetNotFound,

    #[error("Parent comment not found")]
    ParentNotFound,

    #[error("Cannot reply inside a blocked thread")]
    InvalidParent,

    #[error("Comment must have a body or media")]
    EmptyContent,

    #[error("At most {max} media items are allowed")]
    TooManyMedia { max: usize },

    #[error("{0}")]
    Validation(String),

    #[error("Reply depth would exceed the maximum of {max}")]
    MaxDepthExceeded { max: u32 },

    #[error("Comment not found")]
    NotFound,

    #[error("Comment is already deleted")]
    AlreadyDeleted,

    #[error("You are not authorized to modify this comment")]
    Unauthorized,

    #[error("Cannot move a comment from {from} to {to}")]
    InvalidTransition {
        from: CommentStatus,
        to: CommentStatus,
    },

    #[error("Invalid cursor")]
    InvalidCursor,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl CommentError {
    pub fn code(&self) -> &'static str {
        match self {
            CommentError::TargetNotFound => "TARGET_NOT_FOUND",
            CommentError::ParentNotFound => "PARENT_NOT_FOUND",
            CommentError::InvalidParent => "INVALID_PARENT",
            CommentError::EmptyContent => "EMPTY_CONTENT",
            CommentError::TooManyMedia { .. } => "TOO_MANY_MEDIA",
            CommentError::Validation(_) => "VALIDATION_FAILED",
            CommentError::MaxDepthExceeded { .. } => "MAX_DEPTH_EXCEEDED",
            CommentError::NotFound => "NOT_FOUND",
            CommentError::AlreadyDeleted => "ALREADY_DELETED",
            CommentError::Unauthorized => "UNAUTHORIZED",
            CommentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CommentError::InvalidCursor => "INVALID_CURSOR",
            CommentError::Database(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CommentError::EmptyContent
            | CommentError::TooManyMedia { .. }
            | CommentError::Validation(_)
            | CommentError::MaxDepthExceeded { .. }
            | CommentError::InvalidCursor => StatusCode::BAD_REQUEST,
            CommentError::TargetNotFound
            | CommentError::ParentNotFound
            | CommentError::NotFound => StatusCode::NOT_FOUND,
            CommentError::Unauthorized => StatusCode::FORBIDDEN,
            CommentError::AlreadyDeleted
            | CommentError::InvalidTransition { .. }
            | CommentError::InvalidParent => StatusCode::CONFLICT,
            CommentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for CommentError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CommentError::Validation(errors.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 401 Unauthorized
    AuthError(String),

    // Engine errors carry their own status and code
    Comment(CommentError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg),
            AppError::Comment(CommentError::Database(err)) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Comment(err) => (err.status(), err.code(), err.to_string()),
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<CommentError> for AppError {
    fn from(err: CommentError) -> Self {
        AppError::Comment(err)
    }
}
