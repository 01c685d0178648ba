use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

pub mod yt_dlp;

use crate::utils::validate_url;
use crate::DubError;

/// Trait for materializing the audio track of a remote video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the audio of `url` into `workspace` and return the file path
    async fn fetch(&self, url: &Url, workspace: &Path) -> Result<PathBuf, DubError>;

    /// Get the name of this fetcher
    fn fetcher_name(&self) -> &'static str;
}

/// Parse a source reference into a URL the fetchers accept
pub fn parse_source_url(input: &str) -> Result<Url, DubError> {
    validate_url(input).map_err(|e| DubError::Download(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_url_is_download_error() {
        let err = parse_source_url("not-a-url").unwrap_err();
        assert!(matches!(err, DubError::Download(_)));
        assert!(err.to_string().contains("Invalid URL format"));
    }

    #[test]
    fn test_non_http_scheme_is_download_error() {
        assert!(matches!(
            parse_source_url("file:///etc/passwd"),
            Err(DubError::Download(_))
        ));
    }

    #[test]
    fn test_video_url_is_accepted() {
        let url = parse_source_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(url.host_str(), Some("www.youtube.com"));
    }
}
