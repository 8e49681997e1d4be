//! # kernel-runtime
//!
//! Concrete LLM providers for the task kernel.
//!
//! ## Providers
//!
//! - **Ollama** (default feature): local inference via ollama-rs
//! - **OpenAI-compatible**: OpenAI, OpenRouter and Gemini over `/chat/completions`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_runtime::OpenAiCompatProvider;
//!
//! let providers = ProviderRegistry::new("openai");
//! providers.register(Arc::new(OpenAiCompatProvider::openai(key, None)));
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;
pub mod openai_compat;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai_compat::OpenAiCompatProvider;

// Re-export core types for convenience
pub use kernel_core::{KernelError, LlmProvider, ProviderRegistry, Result};
