//! Route handlers and the helpers they share.
//!
//! Errors leave handlers as `{"error": "..."}` JSON bodies. Database and crypto failures are
//! logged server-side and surface as a bare `500` message without details.

pub mod auth;
mod body;
pub mod clients;
pub mod health;
pub mod notes;
pub mod root;
pub mod settings;
pub mod users;

pub use body::{INVALID_BODY, JsonBody};

use crate::crypto;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::sync::LazyLock;
use tracing::error;
use utoipa::ToSchema;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `400 Validation failed` responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorBody {
    pub error: String,
    pub details: Vec<String>,
}

/// Body of plain confirmation responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug)]
pub enum ServiceError {
    BadRequest(&'static str),
    Validation(Vec<&'static str>),
    Unauthorized(&'static str),
    Forbidden,
    NotFound(&'static str),
    Conflict(&'static str),
    Crypto(crypto::Error),
    Database(sqlx::Error),
    Internal(&'static str),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            Self::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation failed", "details": details })),
            )
                .into_response(),
            Self::Unauthorized(message) => error_response(StatusCode::UNAUTHORIZED, message),
            Self::Forbidden => {
                error_response(StatusCode::FORBIDDEN, "Unauthorized - Admin access required")
            }
            Self::NotFound(message) => error_response(StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => error_response(StatusCode::CONFLICT, message),
            Self::Crypto(err) => {
                error!("Crypto failure while handling request: {err}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Database(err) => {
                error!("Database error: {err}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Internal(context) => {
                error!("Internal error: {context}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<crypto::Error> for ServiceError {
    fn from(err: crypto::Error) -> Self {
        match err {
            crypto::Error::PasswordTooLong => Self::BadRequest(PASSWORD_TOO_LONG),
            other => Self::Crypto(other),
        }
    }
}

pub const PASSWORD_TOO_LONG: &str = "Password must be at most 72 bytes";

/// Reject passwords bcrypt would silently truncate.
pub fn check_password_length(password: &str) -> Result<(), ServiceError> {
    if password.len() > crypto::MAX_PASSWORD_BYTES {
        return Err(ServiceError::BadRequest(PASSWORD_TOO_LONG));
    }
    Ok(())
}

/// Map a non-admin principal to `403`.
pub fn ensure_admin(principal: &auth::Principal) -> Result<(), ServiceError> {
    principal
        .require_admin()
        .map_err(|_| ServiceError::Forbidden)
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Lightweight email sanity check used before persisting accounts.
pub fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Trim and drop empty strings.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Clamp list paging to `1..=200` rows (default 50) and a non-negative offset.
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Run CPU-heavy work (bcrypt) off the async executor.
pub async fn blocking<F, T>(work: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        error!("Blocking task failed: {err}");
        ServiceError::Internal("blocking task failed")
    })
}
