use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod edge_tts;

use crate::utils::normalize_language;
use crate::DubError;

/// Static language tag to voice identifier table
const VOICES: &[(&str, &str)] = &[
    ("arabic", "ar-EG-SalmaNeural"),
    ("english", "en-US-JennyNeural"),
    ("hindi", "hi-IN-SwaraNeural"),
    ("japanese", "ja-JP-NanamiNeural"),
    ("korean", "ko-KR-SunHiNeural"),
    ("tamil", "ta-IN-PriyaNeural"),
];

/// Trait for turning text into speech
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and write the audio to `output_path`
    async fn synthesize(&self, text: &str, voice: &str, output_path: &Path) -> Result<(), DubError>;

    /// Get the name of this backend
    fn backend_name(&self) -> &'static str;
}

/// Behaviour when a target language has no entry in the voice map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePolicy {
    /// Reject the request with `UnsupportedLanguage`
    Strict,
    /// Fall back to the configured default voice
    Lenient,
}

impl std::str::FromStr for VoicePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(VoicePolicy::Strict),
            "lenient" => Ok(VoicePolicy::Lenient),
            other => anyhow::bail!("Invalid voice policy: {}. Expected: strict or lenient", other),
        }
    }
}

impl std::fmt::Display for VoicePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoicePolicy::Strict => write!(f, "strict"),
            VoicePolicy::Lenient => write!(f, "lenient"),
        }
    }
}

/// Read-only view over the voice table plus the fallback policy
#[derive(Debug, Clone)]
pub struct VoiceMap {
    policy: VoicePolicy,
    default_voice: String,
}

impl VoiceMap {
    pub fn new(policy: VoicePolicy, default_voice: impl Into<String>) -> Self {
        Self {
            policy,
            default_voice: default_voice.into(),
        }
    }

    /// Voice for an exact (case-insensitive) language match
    pub fn lookup(language: &str) -> Option<&'static str> {
        let language = normalize_language(language);
        VOICES
            .iter()
            .find(|(tag, _)| *tag == language)
            .map(|(_, voice)| *voice)
    }

    /// All supported languages with their voices
    pub fn entries() -> &'static [(&'static str, &'static str)] {
        VOICES
    }

    pub fn policy(&self) -> VoicePolicy {
        self.policy
    }

    /// Resolve the voice for `language` according to the policy
    pub fn resolve(&self, language: &str) -> Result<String, DubError> {
        if let Some(voice) = Self::lookup(language) {
            return Ok(voice.to_string());
        }

        match self.policy {
            VoicePolicy::Strict => Err(DubError::UnsupportedLanguage(normalize_language(language))),
            VoicePolicy::Lenient => {
                tracing::info!(
                    language = %language,
                    voice = %self.default_voice,
                    "No voice for language, using default voice"
                );
                Ok(self.default_voice.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(VoiceMap::lookup("English"), Some("en-US-JennyNeural"));
        assert_eq!(VoiceMap::lookup(" TAMIL "), Some("ta-IN-PriyaNeural"));
        assert_eq!(VoiceMap::lookup("klingon"), None);
    }

    #[test]
    fn test_strict_policy_rejects_unknown_language() {
        let voices = VoiceMap::new(VoicePolicy::Strict, "hi-IN-SwaraNeural");
        let err = voices.resolve("Klingon").unwrap_err();
        assert!(matches!(err, DubError::UnsupportedLanguage(ref lang) if lang == "klingon"));
    }

    #[test]
    fn test_lenient_policy_falls_back_to_default() {
        let voices = VoiceMap::new(VoicePolicy::Lenient, "en-GB-SoniaNeural");
        assert_eq!(voices.resolve("klingon").unwrap(), "en-GB-SoniaNeural");
        assert_eq!(voices.resolve("korean").unwrap(), "ko-KR-SunHiNeural");
    }

    #[test]
    fn test_voice_policy_parsing() {
        assert_eq!("Strict".parse::<VoicePolicy>().unwrap(), VoicePolicy::Strict);
        assert_eq!("lenient".parse::<VoicePolicy>().unwrap(), VoicePolicy::Lenient);
        assert!("loose".parse::<VoicePolicy>().is_err());
    }
}
