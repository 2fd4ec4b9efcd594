//! Unified application error model and mapping helpers.
//! Component errors (store, auth, repository) convert into `AppError` at the route
//! boundary; `AppError` then renders itself as an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;

use crate::identity::AuthError;
use crate::repository::{DuplicateField, RepoError};
use crate::storage::StoreError;

/// Message returned to clients in place of any internal failure detail.
pub const GENERIC_SERVER_ERROR: &str = "Server error, please try again later";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String, details: Option<String> },
    Auth { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into(), details: None } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Conflict carrying a `details` line for the response body.
    pub fn conflict_with_details<S: Into<String>>(code: S, msg: S, details: S) -> Self {
        AppError::Conflict { code: code.into(), message: msg.into(), details: Some(details.into()) }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body sent to the client. Internal errors never expose their message.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Internal { code, .. } => serde_json::json!({ "code": code, "message": GENERIC_SERVER_ERROR }),
            AppError::Conflict { code, message, details: Some(d) } => {
                serde_json::json!({ "code": code, "message": message, "details": d })
            }
            other => serde_json::json!({ "code": other.code_str(), "message": other.message() }),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { code, message } = &self {
            error!(target: "cohortdb::http", code = %code, "request failed: {}", message);
        }
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: format!("{err:#}") }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => AppError::conflict("email_taken", "Email is already registered"),
            StoreError::AccountNotFound(_) => AppError::not_found("account_not_found", "User not found"),
            StoreError::Timeout { op, after } => AppError::internal(
                "store_timeout".to_string(),
                format!("store call '{op}' exceeded {}ms", after.as_millis()),
            ),
            other => AppError::internal("store_error".to_string(), other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::auth("missing_token", "Access Denied"),
            AuthError::InvalidToken => AppError::auth("invalid_token", "Invalid Token"),
            AuthError::Expired => AppError::auth("token_expired", "Token expired"),
            AuthError::MissingKey => AppError::auth("missing_api_key", "API key required"),
            AuthError::InvalidKey => AppError::auth("invalid_api_key", "Invalid API key"),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Invalid(msg) => AppError::user("invalid_student".to_string(), msg),
            RepoError::MissingCriteria => AppError::user("missing_criteria", "Provide hallticket or email"),
            RepoError::Conflict(field) => {
                let code = match field {
                    DuplicateField::HallTicket => "duplicate_hall_ticket",
                    DuplicateField::Email => "duplicate_email",
                };
                AppError::conflict_with_details(
                    code.to_string(),
                    "Duplicate entry found".to_string(),
                    format!("{} already exists in the database", field.label()),
                )
            }
            RepoError::NotFound => AppError::not_found("student_not_found", "Student not found"),
            RepoError::Timeout { op, after } => AppError::internal(
                "store_timeout".to_string(),
                format!("store call '{op}' exceeded {}ms", after.as_millis()),
            ),
            RepoError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
