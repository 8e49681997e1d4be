//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM backends (Ollama, OpenAI, Gemini,
//! OpenRouter, ...) and the registry that multiplexes between them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_core::provider::ProviderRegistry;
//!
//! let providers = ProviderRegistry::new("openai");
//! providers.register(Arc::new(OpenAiCompatProvider::openai(key, model)));
//!
//! // Unknown names degrade to the default provider
//! let provider = providers.get("use-whatever-is-configured");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::Result;

/// Strategy trait for LLM providers
///
/// Implementations keep their own client alive across calls; the kernel
/// never performs per-call setup or teardown.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key (e.g. "openai", "gemini")
    fn name(&self) -> &str;

    /// Generate text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Name used when a registry is built without a default
pub const FALLBACK_PROVIDER_NAME: &str = "default";

/// Concurrent name → provider map with a fallback default.
///
/// Registering an existing name replaces the previous provider.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    default_provider: String,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(FALLBACK_PROVIDER_NAME)
    }
}

impl ProviderRegistry {
    /// Create a registry that falls back to `default_provider`
    pub fn new(default_provider: impl Into<String>) -> Self {
        let mut default_provider = default_provider.into();
        if default_provider.trim().is_empty() {
            default_provider = FALLBACK_PROVIDER_NAME.into();
        }

        Self {
            providers: RwLock::new(HashMap::new()),
            default_provider,
        }
    }

    /// Register or replace a provider. A provider without a name is ignored.
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        if name.trim().is_empty() {
            tracing::warn!("Ignoring LLM provider without a name");
            return;
        }

        let replaced = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), provider)
            .is_some();

        tracing::debug!(provider = %name, replaced, "Registered LLM provider");
    }

    /// Register when present; `None` is a no-op
    pub fn register_optional(&self, provider: Option<Arc<dyn LlmProvider>>) {
        if let Some(provider) = provider {
            self.register(provider);
        }
    }

    /// Resolve by exact name, falling back to the default provider
    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(provider) = providers.get(name) {
            return Some(Arc::clone(provider));
        }

        let fallback = providers.get(&self.default_provider).cloned();
        if fallback.is_some() && !name.is_empty() {
            tracing::debug!(
                requested = %name,
                provider = %self.default_provider,
                "Provider not registered, using default"
            );
        }
        fallback
    }

    /// Resolve the default provider
    pub fn get_default(&self) -> Option<Arc<dyn LlmProvider>> {
        self.get(&self.default_provider)
    }

    /// Registered provider names (unordered)
    pub fn list(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    pub fn len(&self) -> usize {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
