//! Error types and HTTP error response handling.
//!
//! This module defines all application errors, the failure class each one
//! belongs to, and how they are converted into HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation**: malformed input, rejected before any store mutation
/// - **Authorization**: bad API key, throttled caller, or an account that
///   does not belong to the requester
/// - **Not found**: the addressed account, entry or goal does not exist for this owner
/// - **Insufficient funds**: a transfer larger than the source balance
/// - **Conflict**: integrity rules (reserved default account, referenced accounts)
/// - **Internal**: storage failures; the transaction has been rolled back
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// The enclosing transaction is dropped, which rolls it back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Too many failed authentication attempts from this client.
    #[error("Too many failed attempts, try again later")]
    RateLimited,

    /// Requested account does not exist or doesn't belong to the owner.
    #[error("Account not found")]
    AccountNotFound,

    /// Requested income/expense does not exist or doesn't belong to the owner.
    #[error("Entry not found")]
    EntryNotFound,

    #[error("Goal not found")]
    GoalNotFound,

    /// A referenced account is not one of the requester's accounts.
    #[error("Forbidden")]
    Forbidden(String),

    /// Source account balance is lower than the transfer amount.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// The operation would break an integrity rule.
    #[error("Conflict")]
    Conflict(String),
}

/// Failure class reported to callers so they can render a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Authorization,
    NotFound,
    InsufficientFunds,
    Conflict,
    Internal,
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::InvalidRequest(_) => ErrorClass::Validation,
            AppError::InvalidApiKey | AppError::RateLimited | AppError::Forbidden(_) => {
                ErrorClass::Authorization
            }
            AppError::AccountNotFound | AppError::EntryNotFound | AppError::GoalNotFound => {
                ErrorClass::NotFound
            }
            AppError::InsufficientFunds => ErrorClass::InsufficientFunds,
            AppError::Conflict(_) => ErrorClass::Conflict,
            AppError::Database(_) => ErrorClass::Internal,
        }
    }

    /// Map a store error, turning unique and foreign-key violations into a
    /// conflict with the given message.
    pub fn integrity(err: sqlx::Error, message: &str) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
                AppError::Conflict(message.to_string())
            }
            _ => AppError::Database(err),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
            AppError::EntryNotFound => (StatusCode::NOT_FOUND, "entry_not_found"),
            AppError::GoalNotFound => (StatusCode::NOT_FOUND, "goal_not_found"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::InsufficientFunds => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `InvalidApiKey` → 401 Unauthorized
/// - `Forbidden` → 403 Forbidden
/// - `AccountNotFound` / `EntryNotFound` / `GoalNotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - `RateLimited` → 429 Too Many Requests
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::InvalidRequest(msg) | AppError::Forbidden(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "store failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
