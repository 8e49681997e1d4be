//! Scripted Provider
//!
//! Deterministic `LlmProvider` for development and testing.
//! Replies are served in order; once the script runs out the default reply is used.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{KernelError, Result};
use crate::provider::LlmProvider;

/// Provider that replays a fixed script of replies or failures
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String>>>,
    default_reply: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.script.get_mut().push_back(Ok(text.into()));
        self
    }

    /// Queue a provider failure
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .push_back(Err(KernelError::Provider(message.into())));
        self
    }

    /// Reply used once the script is exhausted
    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = Some(text.into());
        self
    }

    /// Simulated generation latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(next) = self.script.lock().await.pop_front() {
            return next;
        }

        self.default_reply
            .clone()
            .ok_or_else(|| KernelError::Provider(format!("{}: script exhausted", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order() {
        let provider = ScriptedProvider::new("mock").reply("one").fail("down").reply("two");

        assert_eq!(provider.generate("a").await.unwrap(), "one");
        assert!(matches!(provider.generate("b").await, Err(KernelError::Provider(_))));
        assert_eq!(provider.generate("c").await.unwrap(), "two");
        assert!(provider.generate("d").await.is_err());
        assert_eq!(provider.prompts().await, vec!["a", "b", "c", "d"]);
    }
}
