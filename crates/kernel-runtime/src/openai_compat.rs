//! OpenAI-compatible LLM Provider
//!
//! One client for every backend exposing `/chat/completions`: OpenAI,
//! OpenRouter and Gemini's OpenAI endpoint.

use std::time::Duration;

use async_trait::async_trait;
use kernel_core::{
    error::{KernelError, Result},
    provider::LlmProvider,
};
use serde::{Deserialize, Serialize};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider speaking the OpenAI chat completion API
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// An empty `model` is kept as-is; the named constructors fill in defaults.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    pub fn openai(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self::new(
            "openai",
            OPENAI_BASE_URL,
            api_key,
            model_or(model, OPENAI_DEFAULT_MODEL),
        )
    }

    pub fn openrouter(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self::new(
            "openrouter",
            OPENROUTER_BASE_URL,
            api_key,
            model_or(model, OPENROUTER_DEFAULT_MODEL),
        )
    }

    pub fn gemini(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self::new(
            "gemini",
            GEMINI_BASE_URL,
            api_key,
            model_or(model, GEMINI_DEFAULT_MODEL),
        )
    }

    /// Point the provider at another endpoint (proxies, self-hosted gateways)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }

    /// First choice's content, or an error naming this provider
    fn first_choice(&self, response: ChatResponse) -> Result<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                KernelError::Provider(format!("empty response received from {}", self.name))
            })
    }
}

fn model_or(model: Option<String>, default: &str) -> String {
    model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| KernelError::Provider(format!("{} generation failed: {e}", self.name)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, status = status.as_u16(), body = %body, "Provider returned error");
            return Err(KernelError::Provider(format!(
                "{} returned HTTP {}: {body}",
                self.name,
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            KernelError::Provider(format!("{} sent an unreadable response: {e}", self.name))
        })?;

        self.first_choice(parsed)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_named_constructors() {
        let openai = OpenAiCompatProvider::openai("sk-test", None);
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.model(), "gpt-4o");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        let router = OpenAiCompatProvider::openrouter("key", Some(String::new()));
        assert_eq!(router.model(), OPENROUTER_DEFAULT_MODEL);

        let gemini = OpenAiCompatProvider::gemini("key", Some("gemini-2.0-flash".into()));
        assert_eq!(gemini.name(), "gemini");
        assert_eq!(gemini.model(), "gemini-2.0-flash");
        assert!(gemini.endpoint().starts_with(GEMINI_BASE_URL));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::openai("k", None).with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body() {
        let provider = OpenAiCompatProvider::openai("k", Some("gpt-4o-mini".into()));
        let body = serde_json::to_value(provider.request("Analyze this scan target: a.com")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "Analyze this scan target: a.com"}]
            })
        );
    }

    #[test]
    fn test_first_choice() {
        let provider = OpenAiCompatProvider::openrouter("k", None);
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "gen-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hello"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .unwrap();
        assert_eq!(provider.first_choice(response).unwrap(), "hello");
    }

    #[test]
    fn test_empty_choices_is_provider_error() {
        let provider = OpenAiCompatProvider::openrouter("k", None);
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = provider.first_choice(response).unwrap_err();
        assert!(matches!(err, KernelError::Provider(ref msg) if msg.contains("openrouter")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_provider_error() {
        let provider = OpenAiCompatProvider::openai("k", None).with_base_url("http://127.0.0.1:9/v1");
        let err = provider.generate("hi").await.unwrap_err();
        assert!(matches!(err, KernelError::Provider(ref msg) if msg.starts_with("openai")));
    }
}
