use async_trait::async_trait;

pub mod openai;

use crate::DubError;

/// Trait for text translation backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, DubError>;
}

/// System instruction sent with every translation request.
///
/// Emotion preservation is only requested from the model, there is no way to check it.
pub fn translation_instruction(target_language: &str) -> String {
    format!(
        "Translate the user's text to {}. \
         Keep ALL emotions exactly the same (happy/sad/excited/angry) \
         and preserve tone and intensity in your wording. \
         Reply with the translation only.",
        target_language
    )
}
