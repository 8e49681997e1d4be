//! Scan Tool
//!
//! Records a scan target and asks an LLM provider to analyze it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use kernel_core::{
    KeyValueStore, ProviderRegistry, Task, TaskResult, ToolError, ToolSchema, TypedTool,
    tool::ParameterSchema,
};

/// Scan tool parameters
#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub target: String,

    /// Provider to route the analysis through; the registry default otherwise
    #[serde(default)]
    pub ai_provider: Option<String>,
}

/// Tool for scanning a target with provider-backed analysis
pub struct ScanTool {
    providers: Option<Arc<ProviderRegistry>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl ScanTool {
    pub fn new(
        providers: Option<Arc<ProviderRegistry>>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        Self { providers, store }
    }

    /// Key the target is remembered under
    pub fn memory_key(task_id: &str) -> String {
        format!("scan_target_{task_id}")
    }

    async fn remember(&self, task: &Task, target: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store
            .save(&Self::memory_key(&task.id), Value::String(target.to_string()))
            .await
        {
            tracing::warn!(task_id = %task.id, error = %e, "Failed to save scan target");
        }
    }

    /// Provider analysis, or `None` when no provider resolves or generation fails
    async fn analyze(&self, target: &str, requested: &str) -> Option<(String, String)> {
        let provider = self.providers.as_ref()?.get(requested)?;
        let name = provider.name().to_string();

        match provider
            .generate(&format!("Analyze this scan target: {target}"))
            .await
        {
            Ok(report) => Some((name, report)),
            Err(e) => {
                tracing::warn!(provider = %name, error = %e, "Scan analysis failed, using placeholder");
                None
            }
        }
    }
}

#[async_trait]
impl TypedTool for ScanTool {
    type Params = ScanParams;

    fn name(&self) -> &str {
        "scan"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "scan".into(),
            description: "Scans a target (domain, host or repository) and returns an AI analysis report".into(),
            parameters: vec![
                ParameterSchema::required("target", "string", "The target to scan (e.g., 'example.com')"),
                ParameterSchema::optional(
                    "ai_provider",
                    "string",
                    "LLM provider for the analysis (openai, openrouter, gemini, ollama)",
                ),
            ],
        }
    }

    fn validate(&self, params: &ScanParams) -> Result<(), ToolError> {
        if params.target.trim().is_empty() {
            return Err(ToolError::invalid_arguments("missing target argument"));
        }
        Ok(())
    }

    async fn run(&self, task: &Task, params: ScanParams) -> Result<TaskResult, ToolError> {
        let target = params.target.trim();
        self.remember(task, target).await;

        let requested = params.ai_provider.as_deref().unwrap_or_default();
        let mut result = TaskResult::success(&task.id, "scan completed successfully")
            .with_entry("target", target)
            .with_entry("scanned_at", Utc::now().to_rfc3339());

        result = match self.analyze(target, requested).await {
            Some((provider, report)) => result
                .with_entry("provider", provider)
                .with_entry("llm_report", report),
            None => result.with_entry("llm_report", placeholder_report(target)),
        };

        tracing::info!(task_id = %task.id, target = %target, "Scan completed");
        Ok(result)
    }
}

fn placeholder_report(target: &str) -> String {
    format!("Placeholder report for {target}: no analysis provider available")
}
