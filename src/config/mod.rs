use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::synthesize::VoicePolicy;
use crate::Stage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// OpenAI-compatible API settings (transcription and translation)
    pub openai: OpenAiConfig,

    /// Dubbing pipeline behaviour
    pub pipeline: PipelineConfig,

    /// Retry policy for transient transcription failures
    pub retry: RetryConfig,

    /// External executables
    pub tools: ToolsConfig,

    /// Logging output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Base used to build `audio_url` in JSON response mode
    pub public_base_url: String,

    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allow any origin (permissive, matches the public deployment)
    pub allow_any_origin: bool,

    /// Explicit origins, used when `allow_any_origin` is false
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key, usually supplied through `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub base_url: String,

    pub transcription_model: String,

    pub translation_model: String,

    /// Request `verbose_json` and keep segment metadata
    pub verbose_transcription: bool,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

/// How a finished dub is handed back over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Publish the artifact and answer with `{"status": "success", "audio_url": ...}`
    Json,
    /// Answer with the mp3 bytes directly
    Binary,
}

impl std::str::FromStr for ResponseMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" | "url" => Ok(ResponseMode::Json),
            "binary" | "file" => Ok(ResponseMode::Binary),
            other => anyhow::bail!("Invalid response mode: {}. Expected: json or binary", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// What to do when the target language has no voice
    pub voice_policy: VoicePolicy,

    /// Voice used by the lenient policy
    pub default_voice: String,

    pub response_mode: ResponseMode,

    /// Root for per-request workspaces (system temp dir if unset)
    pub work_dir: Option<PathBuf>,

    /// Directory published artifacts are written to and served from
    pub output_dir: PathBuf,

    pub timeouts: StageTimeouts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub download_secs: u64,
    pub transcription_secs: u64,
    pub translation_secs: u64,
    pub synthesis_secs: u64,
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        let secs = match stage {
            Stage::Download => self.download_secs,
            Stage::Transcription => self.transcription_secs,
            Stage::Translation => self.translation_secs,
            Stage::Synthesis => self.synthesis_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub edge_tts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            public_base_url: "http://localhost:10000".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: true,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "gpt-4o-mini-transcribe".to_string(),
            translation_model: "gpt-4o-mini".to_string(),
            verbose_transcription: false,
            request_timeout_secs: 120,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            voice_policy: VoicePolicy::Strict,
            default_voice: "hi-IN-SwaraNeural".to_string(),
            response_mode: ResponseMode::Json,
            work_dir: None,
            output_dir: PathBuf::from("dubbed"),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            download_secs: 600,
            transcription_secs: 300,
            translation_secs: 120,
            synthesis_secs: 300,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            edge_tts: "edge-tts".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "video_dubber=info,tower_http=info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults) and apply environment overrides
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Locate the configuration file, if any exists
    fn config_path(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        // Current directory first for easy local runs
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        let user_config = Self::default_path()?;
        Ok(user_config.exists().then_some(user_config))
    }

    /// Per-user config location, used by `dubber config --init`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-dubber").join("config.yaml"))
    }

    /// Apply environment overrides; `lookup` abstracts the environment for tests
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(base_url) = non_empty("OPENAI_BASE_URL") {
            self.openai.base_url = base_url;
        }
        if let Some(voice) = non_empty("EDGE_TTS_VOICE") {
            self.pipeline.default_voice = voice;
        }
        if let Some(policy) = non_empty("DUB_VOICE_POLICY") {
            self.pipeline.voice_policy = policy.parse()?;
        }
        if let Some(mode) = non_empty("DUB_RESPONSE_MODE") {
            self.pipeline.response_mode = mode.parse()?;
        }
        if let Some(base) = non_empty("DUB_PUBLIC_BASE_URL") {
            self.server.public_base_url = base;
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = &self.pipeline.timeouts;
        if [
            timeouts.download_secs,
            timeouts.transcription_secs,
            timeouts.translation_secs,
            timeouts.synthesis_secs,
        ]
        .contains(&0)
        {
            anyhow::bail!("Stage timeouts must be greater than zero");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.pipeline.default_voice.trim().is_empty() {
            anyhow::bail!("pipeline.default_voice must not be empty");
        }

        if !self.server.cors.allow_any_origin {
            for origin in &self.server.cors.allowed_origins {
                origin
                    .parse::<axum::http::HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", origin))?;
            }
        }

        url::Url::parse(&self.server.public_base_url)
            .with_context(|| format!("Invalid public_base_url: {}", self.server.public_base_url))?;

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Public URL: {}", self.server.public_base_url);
        println!(
            "  CORS: {}",
            if self.server.cors.allow_any_origin {
                "any origin".to_string()
            } else {
                self.server.cors.allowed_origins.join(", ")
            }
        );
        println!("  OpenAI Base URL: {}", self.openai.base_url);
        println!(
            "  OpenAI API Key: {}",
            if self.openai.api_key.is_some() { "set" } else { "not set" }
        );
        println!("  Transcription Model: {}", self.openai.transcription_model);
        println!("  Translation Model: {}", self.openai.translation_model);
        println!("  Voice Policy: {}", self.pipeline.voice_policy);
        println!("  Default Voice: {}", self.pipeline.default_voice);
        println!("  Response Mode: {:?}", self.pipeline.response_mode);
        println!("  Output Dir: {}", self.pipeline.output_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.voice_policy, VoicePolicy::Strict);
        assert_eq!(config.pipeline.response_mode, ResponseMode::Json);
        assert!(config.server.cors.allow_any_origin);
        assert_eq!(config.server.port, 10000);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "pipeline:\n  voice_policy: lenient\n  response_mode: binary\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.voice_policy, VoicePolicy::Lenient);
        assert_eq!(config.pipeline.response_mode, ResponseMode::Binary);
        assert_eq!(config.pipeline.default_voice, "hi-IN-SwaraNeural");
        assert_eq!(config.openai.translation_model, "gpt-4o-mini");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("EDGE_TTS_VOICE", "en-GB-SoniaNeural"),
                ("DUB_VOICE_POLICY", "lenient"),
                ("DUB_RESPONSE_MODE", "binary"),
                ("PORT", "8080"),
            ]))
            .unwrap();

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.pipeline.default_voice, "en-GB-SoniaNeural");
        assert_eq!(config.pipeline.voice_policy, VoicePolicy::Lenient);
        assert_eq!(config.pipeline.response_mode, ResponseMode::Binary);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("OPENAI_API_KEY", ""), ("EDGE_TTS_VOICE", "  ")]))
            .unwrap();
        assert!(config.openai.api_key.is_none());
        assert_eq!(config.pipeline.default_voice, "hi-IN-SwaraNeural");
    }

    #[test]
    fn test_invalid_env_override_is_rejected() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(env(&[("DUB_RESPONSE_MODE", "carrier-pigeon")]))
            .is_err());
        assert!(config.apply_overrides(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.pipeline.timeouts.synthesis_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_cors_origin() {
        let mut config = Config::default();
        config.server.cors.allow_any_origin = false;
        config.server.cors.allowed_origins = vec!["https://ok.example".into(), "bad\norigin".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.server.port = 9999;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 9999);
    }

    #[test]
    fn test_stage_timeouts() {
        let timeouts = StageTimeouts::default();
        assert_eq!(timeouts.for_stage(Stage::Download), Duration::from_secs(600));
        assert_eq!(timeouts.for_stage(Stage::Translation), Duration::from_secs(120));
    }
}
