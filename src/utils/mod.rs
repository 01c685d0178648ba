use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use url::Url;

use crate::config::RetryConfig;

/// Validate a URL and return the parsed version
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    if parsed.host_str().is_none() {
        anyhow::bail!("URL has no host: {}", url);
    }

    Ok(parsed)
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Normalize a user supplied language tag for lookups
pub fn normalize_language(lang: &str) -> String {
    lang.trim().to_lowercase()
}

/// Failure of a single call to an external service
#[derive(Debug, Clone)]
pub struct CallError {
    pub message: String,
    pub retryable: bool,
}

impl CallError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Run `op` until it succeeds, fails terminally, or the attempt bound is reached.
///
/// Backoff doubles after every transient failure, capped at `max_backoff_ms`.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryConfig, mut op: F) -> Result<T, CallError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let max_backoff = Duration::from_millis(policy.max_backoff_ms);
    let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable && attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Check if the current environment has the required external tools
pub async fn check_dependencies(yt_dlp: &str, edge_tts: &str) -> Vec<String> {
    let (has_yt_dlp, has_ffmpeg, has_edge_tts) = futures_util::future::join3(
        check_command_available(yt_dlp),
        check_command_available("ffmpeg"),
        check_command_available(edge_tts),
    )
    .await;

    let mut missing = Vec::new();

    if !has_yt_dlp {
        missing.push(format!("{} - required for audio download", yt_dlp));
    }

    if !has_ffmpeg {
        missing.push("ffmpeg - required by yt-dlp for audio extraction".to_string());
    }

    if !has_edge_tts {
        missing.push(format!("{} - required for speech synthesis", edge_tts));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    let flag = if command.ends_with("ffmpeg") { "-version" } else { "--version" };

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
