//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use flare_schema::SchemaViolation;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Alert failed the schema contract at the ingestion boundary.
    SchemaViolation(String),

    /// Resource errors
    NotFound(String),

    /// Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::SchemaViolation(msg) => {
                tracing::warn!("alert rejected: {}", msg);
                let body = Json(json!({
                    "result": "rejected",
                    "error": msg,
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            AppError::NotFound(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "status": StatusCode::NOT_FOUND.as_u16(),
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                let body = Json(json!({
                    "error": "Internal server error",
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<SchemaViolation> for AppError {
    fn from(err: SchemaViolation) -> Self {
        AppError::SchemaViolation(err.to_string())
    }
}
