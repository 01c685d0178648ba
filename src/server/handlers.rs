use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::config::ResponseMode;
use crate::output::DOWNLOAD_FILENAME;
use crate::pipeline::DubRequest;
use crate::DubError;

/// `POST /dub` body; both observed field spellings are accepted
#[derive(Debug, Deserialize)]
pub struct DubRequestBody {
    #[serde(alias = "url")]
    pub video_url: String,

    #[serde(alias = "language")]
    pub target_language: String,
}

#[derive(Debug, Serialize)]
pub struct DubSuccess {
    pub status: &'static str,
    pub audio_url: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "Backend Running Successfully!".to_string(),
        }),
    )
}

pub async fn dub_handler(
    State(state): State<AppState>,
    payload: Result<Json<DubRequestBody>, JsonRejection>,
) -> Result<Response, DubError> {
    let Json(body) = payload.map_err(|rejection| DubError::InvalidRequest(rejection.body_text()))?;

    if body.target_language.trim().is_empty() {
        return Err(DubError::InvalidRequest(
            "target_language must not be empty".to_string(),
        ));
    }

    let request = DubRequest::new(body.video_url, &body.target_language);
    let dubbed = state.pipeline.run(&request).await?;

    match state.response_mode {
        ResponseMode::Json => {
            let published = state
                .artifacts
                .publish(&dubbed)
                .await
                .map_err(|e| DubError::Internal(format!("{:#}", e)))?;

            Ok(Json(DubSuccess {
                status: "success",
                audio_url: published.url,
            })
            .into_response())
        }
        ResponseMode::Binary => {
            let bytes = dubbed
                .read_bytes()
                .await
                .map_err(|e| DubError::Internal(format!("cannot read dubbed audio: {}", e)))?;

            Ok((
                [
                    (header::CONTENT_TYPE, "audio/mpeg".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
    }
}
