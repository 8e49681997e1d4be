//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded). Provider settings use
//! the `AGENT_LLM_<PROVIDER>_<FIELD>` naming.

use anyhow::{Context, bail};

use kernel_core::conversation::DEFAULT_HISTORY_SIZE;

/// Credentials for one hosted provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Local Ollama settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaSettings {
    pub host: String,
    pub port: u16,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub environment: String,
    pub log_level: String,
    pub default_provider: String,
    pub openai: Option<ProviderSettings>,
    pub openrouter: Option<ProviderSettings>,
    pub gemini: Option<ProviderSettings>,
    pub ollama: Option<OllamaSettings>,
    pub history_size: usize,
    pub task_topic: String,
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            log_level: "info".into(),
            default_provider: "openai".into(),
            openai: None,
            openrouter: None,
            gemini: None,
            ollama: None,
            history_size: DEFAULT_HISTORY_SIZE,
            task_topic: "tasks.inbound".into(),
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let history_size = match get("AGENT_HISTORY_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("AGENT_HISTORY_SIZE must be a number, got {raw:?}"))?,
            None => defaults.history_size,
        };
        if history_size == 0 {
            bail!("AGENT_HISTORY_SIZE must be at least 1");
        }

        let hosted = |provider: &str| {
            get(&format!("AGENT_LLM_{provider}_API_KEY")).map(|api_key| ProviderSettings {
                api_key,
                model: get(&format!("AGENT_LLM_{provider}_MODEL")),
                base_url: get(&format!("AGENT_LLM_{provider}_BASE_URL")),
            })
        };

        let ollama = match get("AGENT_LLM_OLLAMA_MODEL") {
            Some(model) => {
                let port = match get("OLLAMA_PORT") {
                    Some(raw) => raw
                        .trim()
                        .parse()
                        .with_context(|| format!("OLLAMA_PORT must be a port number, got {raw:?}"))?,
                    None => 11434,
                };
                Some(OllamaSettings {
                    host: get("OLLAMA_HOST").unwrap_or_else(|| "http://localhost".into()),
                    port,
                    model,
                })
            }
            None => None,
        };

        Ok(Self {
            environment: get("AGENT_ENV").unwrap_or(defaults.environment),
            log_level: get("AGENT_LOG_LEVEL").unwrap_or(defaults.log_level),
            default_provider: get("AGENT_DEFAULT_PROVIDER").unwrap_or(defaults.default_provider),
            openai: hosted("OPENAI"),
            openrouter: hosted("OPENROUTER"),
            gemini: hosted("GEMINI"),
            ollama,
            history_size,
            task_topic: get("AGENT_TASK_TOPIC").unwrap_or(defaults.task_topic),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
