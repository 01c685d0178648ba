use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::pipeline::DubbedAudio;

/// Route prefix published artifacts are served under
pub const AUDIO_ROUTE: &str = "/audio";

/// File name used for direct binary responses and CLI output
pub const DOWNLOAD_FILENAME: &str = "dubbed_audio.mp3";

/// A dub copied out of its job workspace into the served output directory
#[derive(Debug, Clone, Serialize)]
pub struct PublishedAudio {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub url: String,
}

/// Output directory for finished dubs plus the public base URL they are reachable at
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    public_base_url: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory if needed
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))
    }

    /// Public URL for an artifact file name
    pub fn url_for(&self, file_name: &str) -> String {
        format!(
            "{}{}/{}",
            self.public_base_url,
            AUDIO_ROUTE,
            urlencoding::encode(file_name)
        )
    }

    /// Copy the dub out of its workspace; the workspace itself is left to the caller
    pub async fn publish(&self, dubbed: &DubbedAudio) -> Result<PublishedAudio> {
        let file_name = format!("dubbed_{}.mp3", dubbed.job_id());
        let path = self.dir.join(&file_name);

        self.prepare().await?;
        tokio::fs::copy(dubbed.path(), &path)
            .await
            .with_context(|| format!("Failed to publish {}", path.display()))?;

        tracing::info!(
            file = %file_name,
            completed_at = %dubbed.completed_at().to_rfc3339(),
            "Published dubbed audio"
        );

        Ok(PublishedAudio {
            url: self.url_for(&file_name),
            file_name,
            path,
        })
    }
}

/// Save the dub to a user chosen path (CLI)
pub async fn save_to_file(dubbed: &DubbedAudio, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }

    tokio::fs::copy(dubbed.path(), path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
