use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::verification::VerificationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// Body rejection on a verification route, answered as `{error}`.
    pub fn invalid_body(rejection: JsonRejection) -> Self {
        ApiError::Verification(VerificationError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Verification routes answer with a bare `{error}` body
            ApiError::Verification(err) => {
                let status = err.status_code();
                (status, Json(json!({ "error": err.to_string() }))).into_response()
            }
            other => {
                let status = match &other {
                    ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    log::error!("Request failed: {:#}", other);
                }
                (
                    status,
                    Json(json!({ "success": false, "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
