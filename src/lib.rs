//! Video Dubber - A Rust backend for dubbing online videos
//!
//! This library downloads the audio track of a video, transcribes it, translates the
//! transcript into a target language and synthesizes dubbed speech. Every step delegates to
//! an external tool or hosted API; the crate owns the orchestration, the per-request
//! workspace and the failure-propagation contract.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod synthesize;
pub mod transcribe;
pub mod translate;
pub mod utils;

use serde::Serialize;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use fetch::AudioFetcher;
pub use pipeline::{DubPipeline, DubRequest, DubbedAudio, PipelineState};
pub use synthesize::{Synthesizer, VoiceMap, VoicePolicy};
pub use transcribe::{Transcriber, Transcript};
pub use translate::Translator;

/// Result type used by the application plumbing (config, CLI, server startup)
pub type Result<T> = anyhow::Result<T>;

/// One of the four pipeline steps; the unit of failure attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Transcription,
    Translation,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Transcription => "transcription",
            Stage::Translation => "translation",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to the caller of a dub job
#[derive(thiserror::Error, Debug)]
pub enum DubError {
    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Language not supported")]
    UnsupportedLanguage(String),

    #[error("TTS failed: {0}")]
    Synthesis(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DubError {
    /// Pipeline stage this error is attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DubError::Download(_) => Some(Stage::Download),
            DubError::Transcription(_) => Some(Stage::Transcription),
            DubError::Translation(_) => Some(Stage::Translation),
            DubError::UnsupportedLanguage(_) | DubError::Synthesis(_) => Some(Stage::Synthesis),
            DubError::InvalidRequest(_) | DubError::Internal(_) => None,
        }
    }

    /// Build the error kind that belongs to `stage`
    pub fn for_stage(stage: Stage, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::Download => DubError::Download(message),
            Stage::Transcription => DubError::Transcription(message),
            Stage::Translation => DubError::Translation(message),
            Stage::Synthesis => DubError::Synthesis(message),
        }
    }
}
