// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Authentication-class variants render without details so callers cannot
/// tell which check rejected them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Identity assertion invalid")]
    InvalidAssertion,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Wrong token type")]
    WrongTokenType,

    #[error("User no longer exists")]
    UserNotFound,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures that are the caller's credential problem.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAssertion
                | AppError::Unauthorized
                | AppError::InvalidToken
                | AppError::TokenExpired
                | AppError::WrongTokenType
                | AppError::UserNotFound
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::InvalidAssertion => (StatusCode::UNAUTHORIZED, "assertion_invalid", None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken | AppError::WrongTokenType => {
                (StatusCode::UNAUTHORIZED, "invalid_token", None)
            }
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired", None),
            AppError::UserNotFound => (StatusCode::UNAUTHORIZED, "user_not_found", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        debug_assert_eq!(status == StatusCode::UNAUTHORIZED, self.is_auth_failure());
        if self.is_auth_failure() {
            tracing::debug!(code = error, "Credentials rejected");
        }

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
