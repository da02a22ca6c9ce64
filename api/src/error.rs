use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fanfou_core::error::{self, ApiError};

/// Failures of the HTTP layer itself.
///
/// Tool outcomes (including FanFou errors) travel as data in a 200 body; only
/// malformed requests and unknown routes end up here.
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        docs_hint: Option<String>,
    },
    /// Unknown tool or resource (404)
    NotFound { resource: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} does not exist"),
                    field: None,
                    request_id,
                    docs_hint: Some("GET /api/tools lists every available tool.".to_string()),
                },
            ),
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<fanfou_mcp_runtime::UnknownTool> for AppError {
    fn from(err: fanfou_mcp_runtime::UnknownTool) -> Self {
        AppError::NotFound {
            resource: format!("Tool '{}'", err.0),
        }
    }
}
