//! Conversation Loop
//!
//! Drives one request/response turn against an LLM provider:
//! input -> history -> prompt -> provider -> tool check -> history -> reply.
//!
//! A provider failure aborts the turn without recording an assistant message.
//! A tool failure only degrades the reply text; the turn still completes.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{KernelError, Result};
use crate::message::{BoundedHistory, Message};
use crate::protocol::InvocationProtocol;
use crate::provider::ProviderRegistry;
use crate::runtime::ExecutionRuntime;
use crate::tool::ToolSchema;

/// Conversation configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Identity section of the system prompt
    pub identity: String,

    /// Provider to ask; unknown names fall back to the registry default
    pub provider: String,

    /// Number of messages kept in memory
    pub history_size: usize,

    /// Whether to append tool descriptions to the system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.into(),
            provider: String::new(),
            history_size: DEFAULT_HISTORY_SIZE,
            inject_tool_descriptions: true,
        }
    }
}

pub const DEFAULT_HISTORY_SIZE: usize = 10;

const DEFAULT_IDENTITY: &str = "You are an AI DevSecOps assistant.
You help with security scanning, CI/CD monitoring, vulnerability detection, and DevSecOps automation.";

const TOOL_INSTRUCTIONS: &str = r#"How to Use Tools:
  When you need to use a tool, respond EXACTLY in this format:

  TOOL:<tool_name>|<json_params>

  Examples:
  - TOOL:echo|{"message":"Hello World"}
  - TOOL:scan|{"target":"example.com","ai_provider":"gemini"}

Rules:
  1. Use a tool ONLY when the user explicitly asks for an action
  2. Tool command must be on a single line and start the reply
  3. Parameters must be a valid JSON object
  4. If no tool is needed, respond conversationally
  5. Keep responses concise and professional"#;

/// One conversation session: owns its history, shares registries
pub struct ConversationLoop {
    providers: Arc<ProviderRegistry>,
    protocol: InvocationProtocol,
    runtime: ExecutionRuntime,
    history: BoundedHistory,
    config: AgentConfig,
}

impl ConversationLoop {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        runtime: ExecutionRuntime,
        config: AgentConfig,
    ) -> Result<Self> {
        Ok(Self {
            providers,
            protocol: InvocationProtocol::new(runtime.clone()),
            runtime,
            history: BoundedHistory::new(config.history_size)?,
            config,
        })
    }

    /// Handle one user turn
    pub async fn process_request(&mut self, input: &str) -> Result<String> {
        tracing::info!(input = %input, "Processing request");

        self.history.push(Message::user(input));
        let prompt = self.build_prompt();

        let raw = self.call_provider(&prompt).await.inspect_err(|e| {
            tracing::error!(error = %e, "LLM call failed");
        })?;

        let reply = self.protocol.resolve(&raw).await.into_reply();
        self.history.push(Message::assistant(reply.clone()));

        tracing::info!("Request processed successfully");
        Ok(reply)
    }

    /// Handle one user turn, abandoning it if `cancel` fires first.
    ///
    /// A cancelled turn records the user message but no reply.
    pub async fn process_request_with_cancel(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Request cancelled");
                Err(KernelError::Cancelled("conversation turn was cancelled".into()))
            }
            reply = self.process_request(input) => reply,
        }
    }

    async fn call_provider(&self, prompt: &str) -> Result<String> {
        let provider = self
            .providers
            .get(&self.config.provider)
            .ok_or_else(|| KernelError::ProviderNotFound(self.requested_provider().to_string()))?;

        tracing::debug!(
            provider = %provider.name(),
            message_count = self.history.len() + 1,
            "Calling LLM"
        );

        let reply = provider.generate(prompt).await?;
        tracing::debug!(length = reply.len(), "LLM response received");
        Ok(reply)
    }

    fn requested_provider(&self) -> &str {
        if self.config.provider.is_empty() {
            self.providers.default_name()
        } else {
            &self.config.provider
        }
    }

    /// System prompt: identity, tool catalogue and invocation grammar
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.identity.clone();

        if self.config.inject_tool_descriptions {
            prompt.push_str("\n\nAvailable Tools:\n");
            match self.runtime.registry() {
                Some(registry) => prompt.push_str(&registry.generate_prompt_section()),
                None => prompt.push_str("  No tools available\n"),
            }
            prompt.push('\n');
            prompt.push_str(TOOL_INSTRUCTIONS);
        }

        prompt
    }

    /// System message followed by the history, oldest first
    pub fn build_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(Message::system(self.build_system_prompt()));
        messages.extend(self.history.iter().cloned());
        messages
    }

    /// Full prompt text handed to the provider
    pub fn build_prompt(&self) -> String {
        render_prompt(&self.build_messages())
    }

    /// Clear the conversation history
    pub fn clear_memory(&mut self) {
        self.history.clear();
        tracing::info!("Conversation memory cleared");
    }

    /// Number of messages in memory
    pub fn memory_count(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.snapshot()
    }

    /// Names of all registered tools
    pub fn list_tools(&self) -> Vec<String> {
        self.runtime.registry().map(|r| r.names()).unwrap_or_default()
    }

    pub fn tool_schema(&self, name: &str) -> Result<ToolSchema> {
        self.runtime
            .registry()
            .and_then(|r| r.get(name))
            .map(|tool| tool.schema())
            .ok_or_else(|| KernelError::ToolNotFound(name.to_string()))
    }

    pub fn list_tool_schemas(&self) -> Vec<ToolSchema> {
        self.runtime.registry().map(|r| r.schemas()).unwrap_or_default()
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Render messages as role-labelled blocks ending with an assistant cue
pub fn render_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let _ = write!(prompt, "{}: {}\n\n", message.role, message.content);
    }
    prompt.push_str("assistant:");
    prompt
}

/// Builder for [`ConversationLoop`]
pub struct ConversationBuilder {
    providers: Option<Arc<ProviderRegistry>>,
    runtime: ExecutionRuntime,
    config: AgentConfig,
}

impl Default for ConversationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBuilder {
    pub fn new() -> Self {
        Self {
            providers: None,
            runtime: ExecutionRuntime::default(),
            config: AgentConfig::default(),
        }
    }

    pub fn providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn runtime(mut self, runtime: ExecutionRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into();
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.config.identity = identity.into();
        self
    }

    pub const fn history_size(mut self, size: usize) -> Self {
        self.config.history_size = size;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ConversationLoop> {
        let providers = self
            .providers
            .ok_or_else(|| KernelError::InvalidInput("provider registry is required".into()))?;

        ConversationLoop::new(providers, self.runtime, self.config)
    }
}
