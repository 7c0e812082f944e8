use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::tmdb::TmdbError;

/// Validation messages keyed by request field.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("the given data was invalid")]
    Validation(FieldErrors),

    #[error("authentication required")]
    Unauthorized,

    #[error("review belongs to another user")]
    Forbidden,

    #[error("movie not found")]
    MovieNotFound,

    #[error("review not found")]
    ReviewNotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Upstream(#[from] TmdbError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.entry(field).or_default().push(message.into());
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid("query", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid("path", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": self.to_string(), "errors": errors }),
            ),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() }))
            },
            AppError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": self.to_string() })),
            AppError::MovieNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "movie not found", "message": "Movie not found" }),
            ),
            AppError::ReviewNotFound => (StatusCode::NOT_FOUND, json!({ "success": false })),
            AppError::Conflict(_) => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            AppError::Upstream(err) => {
                tracing::error!(error = %err, "movie provider request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": err.to_string() }))
            },
            AppError::Database(_) => {
                tracing::error!(error = %self, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal server error" }))
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
