//! Ollama LLM Provider
//!
//! Local-model `LlmProvider` backed by `ollama-rs`.

use async_trait::async_trait;
use kernel_core::{
    error::{KernelError, Result},
    provider::LlmProvider,
};
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, MessageRole, request::ChatMessageRequest},
};

pub const DEFAULT_MODEL: &str = "llama3.2";

/// Where the Ollama daemon listens and which model it serves
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used for every prompt
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: DEFAULT_MODEL.into(),
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration. The client is built once and reused.
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
            config,
        }
    }

    /// Default host, port and model
    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request(&self, prompt: &str) -> ChatMessageRequest {
        ChatMessageRequest::new(
            self.config.model.clone(),
            vec![ChatMessage::new(MessageRole::User, prompt.to_string())],
        )
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.config.model, "Sending chat request to Ollama");

        let response = self
            .client
            .send_chat_messages(self.request(prompt))
            .await
            .map_err(|e| KernelError::Provider(format!("ollama generation failed: {e}")))?;

        let content = response.message.content;
        if content.trim().is_empty() {
            return Err(KernelError::Provider("empty response received from ollama".into()));
        }
        Ok(content)
    }
}
