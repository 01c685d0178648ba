use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{translation_instruction, Translator};
use crate::config::OpenAiConfig;
use crate::DubError;

/// Translator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiTranslator {
    pub fn new(client: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.translation_model.clone(),
        }
    }
}

/// Build the chat request for one translation
fn build_request<'a>(model: &'a str, instruction: &'a str, text: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: instruction,
            },
            ChatMessage {
                role: "user",
                content: text,
            },
        ],
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, DubError> {
        if text.trim().is_empty() {
            return Err(DubError::Translation("source text is empty".to_string()));
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DubError::Translation("OPENAI_API_KEY is not set".to_string()))?;

        let instruction = translation_instruction(target_language);
        let request = build_request(&self.model, &instruction, text);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            model = %self.model,
            target_language = %target_language,
            chars = text.len(),
            "Sending translation request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DubError::Translation(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(DubError::Translation(format!(
                "status {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DubError::Translation(format!("invalid response body: {}", e)))?;

        let translated = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| DubError::Translation("model returned no translation".to_string()))?;

        tracing::info!(chars = translated.len(), "Translation completed");
        Ok(translated)
    }
}
