use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::{DubError, Stage};

/// Body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl DubError {
    /// HTTP status for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            DubError::InvalidRequest(_) | DubError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            DubError::Download(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DubError::Transcription(_) | DubError::Translation(_) | DubError::Synthesis(_) => {
                StatusCode::BAD_GATEWAY
            }
            DubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            stage: self.stage(),
        };
        (status, Json(body)).into_response()
    }
}
