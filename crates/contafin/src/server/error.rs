use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::spreadsheet::SpreadsheetError;

/// Failure of a request handler, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// A file import that failed after being recorded as an error analysis.
    #[error("{message}")]
    ImportFailed { message: String, analysis_id: Uuid },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ImportFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::ImportFailed {
                message,
                analysis_id,
            } => json!({ "error": message, "analysis_id": analysis_id }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<SpreadsheetError> for ApiError {
    fn from(err: SpreadsheetError) -> Self {
        match err {
            SpreadsheetError::UnknownTemplate { .. } => ApiError::BadRequest(err.to_string()),
            SpreadsheetError::UnsupportedFormat(_) => ApiError::BadRequest(format!(
                "Formato de archivo no soportado. Use: {}",
                crate::spreadsheet::import::SUPPORTED_EXTENSIONS.join(", ")
            )),
            other => {
                error!(error = ?other, "spreadsheet operation failed");
                ApiError::Internal(format!("Error al generar la plantilla: {other}"))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    }
}
