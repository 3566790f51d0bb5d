use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::ai::http::ProviderHttpClient;
use crate::ai::PromptDeriver;
use crate::models::{PromptMap, DEFAULT_PROMPT_MODEL};
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai";
const CHAT_COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

/// Derives per-slot image prompts from article text through OpenRouter.
pub struct OpenRouterPromptDeriver {
    http: ProviderHttpClient,
    default_model: String,
}

impl OpenRouterPromptDeriver {
    pub fn new(api_key: Option<String>, default_model: String) -> Self {
        Self::new_with_client(api_key, default_model, reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: Option<String>,
        default_model: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: ProviderHttpClient::new_with_client(
                "OpenRouter",
                api_key,
                DEFAULT_BASE_URL,
                Duration::from_secs(120),
                client,
            ),
            default_model,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl PromptDeriver for OpenRouterPromptDeriver {
    async fn derive_prompts(
        &self,
        article: &str,
        model: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<PromptMap> {
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.default_model.as_str());
        tracing::debug!(
            "Deriving image prompts with {} ({} chars of article)",
            model,
            article.len()
        );

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(prompts::IMAGE_PROMPTS_SYSTEM.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompts::render(
                        prompts::IMAGE_PROMPTS_USER,
                        &[("article", article)],
                    )),
                },
            ],
            temperature: 0.7,
            max_tokens: 4000,
        };

        let response: ChatCompletionResponse = self
            .http
            .post_with_key(CHAT_COMPLETIONS_PATH, &request, api_key)
            .await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::AiProvider("No response from OpenRouter chat API".to_string()))?;

        let prompts = parse_prompt_map(content)?;
        tracing::info!("Derived {} image prompt(s)", prompts.len());
        Ok(prompts)
    }
}

impl Default for OpenRouterPromptDeriver {
    fn default() -> Self {
        Self::new(None, DEFAULT_PROMPT_MODEL.to_string())
    }
}

/// Parse model output into a slot → prompt map.
///
/// Tolerates markdown code fences and prose around the JSON object. Values
/// that are not non-blank strings are skipped.
pub fn parse_prompt_map(content: &str) -> Result<PromptMap> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(Error::AiProvider(
                "Image prompt response contained no JSON object".to_string(),
            ))
        }
    };

    let raw: IndexMap<String, serde_json::Value> = serde_json::from_str(json).map_err(|e| {
        Error::AiProvider(format!("Failed to parse image prompt JSON: {}", e))
    })?;

    let mut prompts = PromptMap::new();
    for (slot, value) in raw {
        match value {
            serde_json::Value::String(prompt) if !prompt.trim().is_empty() => {
                prompts.insert(slot, prompt.trim().to_string());
            }
            _ => tracing::warn!("Ignoring image slot '{}' without a text prompt", slot),
        }
    }

    Ok(prompts)
}
