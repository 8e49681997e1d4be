//! Application State

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use kernel_core::{
    AgentConfig, ConversationLoop, Dependencies, InMemoryBus, Kernel, MemoryStore,
    ProviderRegistry, Result,
};
use kernel_runtime::{OllamaConfig, OllamaProvider, OpenAiCompatProvider};

use crate::config::ServerConfig;

pub type Session = Arc<Mutex<ConversationLoop>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Kernel owning the tool registry, runtime and dispatcher
    pub kernel: Arc<Kernel>,

    /// Process-local bus the dispatcher listens on
    pub bus: Arc<InMemoryBus>,

    /// Conversation sessions by id
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,

    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire a kernel with the in-memory bus and store and the default tool set
    pub fn new(config: ServerConfig, providers: ProviderRegistry) -> Result<Self> {
        let bus = Arc::new(InMemoryBus::new());
        let kernel = Kernel::new(Dependencies {
            bus: Some(bus.clone()),
            store: Some(Arc::new(MemoryStore::new())),
            providers: Arc::new(providers),
        });
        kernel_tools::register_defaults(&kernel)?;

        Ok(Self {
            kernel: Arc::new(kernel),
            bus,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        })
    }

    /// Existing session, or a new one using `provider` (the default when `None`)
    pub fn session(&self, id: &str, provider: Option<&str>) -> Result<Session> {
        if let Some(session) = self.existing_session(id) {
            return Ok(session);
        }

        let config = AgentConfig {
            provider: provider.unwrap_or_default().to_string(),
            history_size: self.config.history_size,
            ..Default::default()
        };
        let created = Arc::new(Mutex::new(self.kernel.conversation(config)?));

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(sessions.entry(id.to_string()).or_insert(created)))
    }

    pub fn existing_session(&self, id: &str) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}

/// Register every provider whose credentials are configured
pub fn build_providers(config: &ServerConfig) -> ProviderRegistry {
    let providers = ProviderRegistry::new(config.default_provider.clone());

    if let Some(openai) = &config.openai {
        let mut provider = OpenAiCompatProvider::openai(openai.api_key.clone(), openai.model.clone());
        if let Some(base_url) = &openai.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        providers.register(Arc::new(provider));
    }

    if let Some(router) = &config.openrouter {
        providers.register(Arc::new(OpenAiCompatProvider::openrouter(
            router.api_key.clone(),
            router.model.clone(),
        )));
    }

    if let Some(gemini) = &config.gemini {
        providers.register(Arc::new(OpenAiCompatProvider::gemini(
            gemini.api_key.clone(),
            gemini.model.clone(),
        )));
    }

    if let Some(ollama) = &config.ollama {
        providers.register(Arc::new(OllamaProvider::from_config(OllamaConfig {
            host: ollama.host.clone(),
            port: ollama.port,
            model: ollama.model.clone(),
        })));
    }

    providers
}

#[cfg(test)]
mod tests {
    use kernel_core::LlmProvider;

    use super::*;
    use crate::config::{OllamaSettings, ProviderSettings};

    #[test]
    fn test_only_configured_providers_registered() {
        let config = ServerConfig {
            default_provider: "openrouter".into(),
            openrouter: Some(ProviderSettings {
                api_key: "key".into(),
                model: None,
                base_url: None,
            }),
            ollama: Some(OllamaSettings {
                host: "http://localhost".into(),
                port: 11434,
                model: "llama3.2".into(),
            }),
            ..Default::default()
        };

        let providers = build_providers(&config);
        let mut names = providers.list();
        names.sort();
        assert_eq!(names, vec!["ollama", "openrouter"]);
        assert_eq!(providers.get("openai").unwrap().name(), "openrouter");
    }

    #[test]
    fn test_no_providers() {
        let providers = build_providers(&ServerConfig::default());
        assert!(providers.is_empty());
        assert!(providers.get_default().is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_reused_and_removed() {
        let state = AppState::new(ServerConfig::default(), ProviderRegistry::default()).unwrap();

        let first = state.session("s1", None).unwrap();
        let again = state.session("s1", Some("gemini")).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.lock().await.config().history_size, 10);

        assert!(state.remove_session("s1"));
        assert!(!state.remove_session("s1"));
        assert!(state.existing_session("s1").is_none());
    }
}
