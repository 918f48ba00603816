//! Typed errors and HTTP mapping.

use crate::response::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table} column {column}")]
    InvalidPrimaryKey { table: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Client-facing error category. Every `AppError` collapses into one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Internal => "internal",
        }
    }
}

// PostgreSQL SQLSTATE codes the API distinguishes.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const INVALID_DATETIME_FORMAT: &str = "22007";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return AppError::NotFound("row not found".into());
        }
        let Some(db) = e.as_database_error() else {
            return AppError::Db(e);
        };
        let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
        let constraint = db.constraint().unwrap_or("unknown").to_string();
        let message = db.message().to_string();
        let column = db
            .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
            .and_then(|pg| pg.column())
            .unwrap_or("field")
            .to_string();
        match code.as_str() {
            UNIQUE_VIOLATION => AppError::Conflict(format!("duplicate value violates {}", constraint)),
            FOREIGN_KEY_VIOLATION => {
                AppError::BadRequest(format!("referenced row does not exist ({})", constraint))
            }
            CHECK_VIOLATION => AppError::BadRequest(format!("check {} failed", constraint)),
            NOT_NULL_VIOLATION => AppError::BadRequest(format!("{} is required", column)),
            INVALID_TEXT_REPRESENTATION | INVALID_DATETIME_FORMAT | NUMERIC_OUT_OF_RANGE => {
                AppError::BadRequest(message)
            }
            _ => AppError::Db(e),
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::Config(_) | AppError::Db(_) | AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl AppError {
    /// Message shown to clients, without the category prefix of `Display`.
    fn client_message(&self) -> String {
        match self {
            AppError::NotFound(m)
            | AppError::Validation(m)
            | AppError::Conflict(m)
            | AppError::BadRequest(m)
            | AppError::Internal(m) => m.clone(),
            AppError::Config(e) => e.to_string(),
            AppError::Db(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = match code {
            ErrorCode::Internal => {
                tracing::error!(error = %self, "request failed");
                "internal server error".to_string()
            }
            _ => self.client_message(),
        };
        let body = Envelope::<()>::error(code.as_str(), message);
        (code.status(), Json(body)).into_response()
    }
}
