use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::config::{OpenAiConfig, RetryConfig};
use crate::utils::{retry_with_backoff, CallError};
use crate::DubError;

/// Speech-to-text through an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    verbose: bool,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<SegmentResponse>,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    start: f64,
    end: f64,
    text: String,
}

impl OpenAiTranscriber {
    pub fn new(client: reqwest::Client, config: &OpenAiConfig, retry: RetryConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
            verbose: config.verbose_transcription,
            retry,
        }
    }

    fn response_format(&self) -> &'static str {
        if self.verbose {
            "verbose_json"
        } else {
            "json"
        }
    }

    async fn request_once(
        &self,
        api_key: &str,
        file_name: &str,
        audio: &[u8],
    ) -> Result<Transcript, CallError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| CallError::terminal(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", self.response_format())
            .part("file", file_part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(status, &body));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CallError::terminal(format!("invalid response body: {}", e)))?;

        Ok(Transcript {
            text: parsed.text.trim().to_string(),
            language: parsed.language,
            duration: parsed.duration,
            segments: parsed
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, DubError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DubError::Transcription("OPENAI_API_KEY is not set".to_string()))?;

        let audio = tokio::fs::read(audio_path).await.map_err(|e| {
            DubError::Transcription(format!("cannot read {}: {}", audio_path.display(), e))
        })?;
        if audio.is_empty() {
            return Err(DubError::Transcription("audio file is empty".to_string()));
        }

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3");

        tracing::debug!(
            model = %self.model,
            format = self.response_format(),
            bytes = audio.len(),
            "Sending audio to transcription API"
        );

        let audio = audio.as_slice();
        let transcript = retry_with_backoff(&self.retry, |attempt| {
            tracing::debug!(attempt, "Transcription request");
            self.request_once(api_key, file_name, audio)
        })
        .await
        .map_err(|e| DubError::Transcription(e.message))?;

        tracing::info!(
            chars = transcript.text.len(),
            segments = transcript.segments.len(),
            "Transcription completed"
        );

        Ok(transcript)
    }
}

/// Pick the multipart MIME type from the file extension
fn mime_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Network-level failures: timeouts and connection problems are worth retrying
pub(crate) fn classify_transport_error(err: reqwest::Error) -> CallError {
    if err.is_timeout() || err.is_connect() {
        CallError::transient(format!("request: {}", err))
    } else {
        CallError::terminal(format!("request: {}", err))
    }
}

/// Map an error status to transient (rate limit, server error) or terminal
pub(crate) fn classify_status(status: StatusCode, body: &str) -> CallError {
    let message = format!("status {}: {}", status, body.trim());

    if status == StatusCode::TOO_MANY_REQUESTS {
        // Quota exhaustion shares 429 with rate limiting but never recovers
        if body.contains("insufficient_quota") {
            return CallError::terminal(message);
        }
        return CallError::transient(message);
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return CallError::transient(message);
    }

    CallError::terminal(message)
}
