use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::services::session::SessionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {collection} document '{id}': {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Result store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::UnsupportedLanguage(_) => "unsupported_language",
            Error::BadRequest(_) => "bad_request",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::InvalidDocument { .. } => "invalid_document",
            Error::Session(err) => err.code(),
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "invalid_json",
            Error::Reqwest(_) => "external_service_error",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let (status, message) = match &self {
            Error::UnsupportedLanguage(_) | Error::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Error::Session(err) => (err.status(), err.to_string()),
            Error::InvalidDocument { .. } => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", err),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let retryable = matches!(self, Error::StoreUnavailable(_));
        let body = Json(json!({ "error": code, "message": message, "retryable": retryable }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
