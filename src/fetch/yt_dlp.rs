use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::AudioFetcher;
use crate::utils::extract_domain;
use crate::DubError;

/// Base name of the downloaded file inside the job workspace
const INPUT_STEM: &str = "input";

/// Audio fetcher using yt-dlp
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Arguments for a single-file, best-quality audio download
    fn download_args(&self, url: &Url, workspace: &Path) -> Vec<String> {
        let template = workspace.join(format!("{}.%(ext)s", INPUT_STEM));
        vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-progress".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ]
    }

    /// yt-dlp prints the final path; fall back to scanning the workspace
    async fn locate_download(stdout: &str, workspace: &Path) -> Option<PathBuf> {
        if let Some(printed) = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
            let path = PathBuf::from(printed);
            if path.is_file() {
                return Some(path);
            }
        }

        let mut entries = tokio::fs::read_dir(workspace).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_input = path
                .file_stem()
                .map(|stem| stem == INPUT_STEM)
                .unwrap_or(false);
            if is_input && path.is_file() {
                return Some(path);
            }
        }

        None
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &Url, workspace: &Path) -> Result<PathBuf, DubError> {
        tracing::info!(
            domain = extract_domain(url).as_deref().unwrap_or("unknown"),
            "Downloading audio with yt-dlp"
        );

        let output = Command::new(&self.yt_dlp_path)
            .args(self.download_args(url, workspace))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DubError::Download(format!("cannot run {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Download(format!("yt-dlp failed: {}", error.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = Self::locate_download(&stdout, workspace)
            .await
            .ok_or_else(|| DubError::Download("yt-dlp produced no audio file".to_string()))?;

        tracing::debug!(path = %path.display(), "Audio downloaded");
        Ok(path)
    }

    fn fetcher_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}
