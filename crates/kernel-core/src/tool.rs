//! Tool System
//!
//! Extensible tool framework for kernel capabilities.
//! Tools are registered once at startup and invoked through the execution runtime.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result, ToolError};
use crate::task::{Task, TaskResult};

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// Type tag rendered into the prompt, e.g. `string` or `object`
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Tool definition schema, rendered into the prompt catalogue
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Rendered next to the name in the tool catalogue
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

/// Named unit of executable capability, resolved by [`ToolRegistry`]
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Self-description for the prompt catalogue
    fn schema(&self) -> ToolSchema;

    /// Execute the tool against a task
    async fn execute(&self, task: &Task) -> std::result::Result<TaskResult, ToolError>;
}

/// Typed layer over [`Tool`]: arguments are deserialized into `Params`
/// before `run` is called. Wrap in [`Typed`] to register.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Params: DeserializeOwned + Send;

    fn name(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    /// Post-deserialization checks
    fn validate(&self, _params: &Self::Params) -> std::result::Result<(), ToolError> {
        Ok(())
    }

    async fn run(&self, task: &Task, params: Self::Params) -> std::result::Result<TaskResult, ToolError>;
}

/// Adapter registering a [`TypedTool`] as a raw [`Tool`]
pub struct Typed<T>(pub T);

impl<T: TypedTool> Typed<T> {
    /// Convert raw task arguments into typed parameters
    pub fn parse_params(&self, task: &Task) -> std::result::Result<T::Params, ToolError> {
        let params = serde_json::from_value(Value::Object(task.args.clone()))
            .map_err(|e| ToolError::invalid_arguments(&e).with_source(e))?;
        self.0.validate(&params)?;
        Ok(params)
    }
}

#[async_trait]
impl<T: TypedTool> Tool for Typed<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn schema(&self) -> ToolSchema {
        self.0.schema()
    }

    async fn execute(&self, task: &Task) -> std::result::Result<TaskResult, ToolError> {
        let params = self
            .parse_params(task)
            .map_err(|e| {
                let partial = TaskResult::failure(&task.id, e.message.clone());
                e.with_partial(partial)
            })?;
        self.0.run(task, params).await
    }
}

/// Concurrent registry of available tools.
///
/// Registration rejects duplicates; lookups never fall back.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(KernelError::InvalidInput("cannot register a tool without a name".into()));
        }

        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.contains_key(&name) {
            return Err(KernelError::DuplicateName(name));
        }

        tracing::debug!(tool = %name, "Registered tool");
        tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Snapshot of all registered tools
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Get tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.list().iter().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the tool catalogue for the system prompt
    pub fn generate_prompt_section(&self) -> String {
        let schemas = self.schemas();
        if schemas.is_empty() {
            return "  No tools available\n".into();
        }

        let mut section = String::new();
        for schema in schemas {
            let _ = writeln!(section, "  - {}: {}", schema.name, schema.description);

            if !schema.parameters.is_empty() {
                section.push_str("    Parameters:\n");
                for param in &schema.parameters {
                    let marker = if param.required { "required" } else { "optional" };
                    let _ = writeln!(
                        section,
                        "      * {} ({}, {}): {}",
                        param.name, param.param_type, marker, param.description
                    );
                }
            }
        }
        section
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Echo tool parameters
#[derive(Debug, Deserialize)]
pub struct EchoParams {
    pub message: String,
}

/// Echoes its message back; used to check the tool path end to end
pub struct EchoTool;

#[async_trait]
impl TypedTool for EchoTool {
    type Params = EchoParams;

    fn name(&self) -> &str {
        "echo"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "Echoes back the input message".into(),
            parameters: vec![ParameterSchema::required(
                "message",
                "string",
                "The message to echo back",
            )],
        }
    }

    fn validate(&self, params: &EchoParams) -> std::result::Result<(), ToolError> {
        if params.message.is_empty() {
            return Err(ToolError::invalid_arguments("parameter 'message' cannot be empty"));
        }
        Ok(())
    }

    async fn run(&self, task: &Task, params: EchoParams) -> std::result::Result<TaskResult, ToolError> {
        Ok(TaskResult::success(&task.id, "echoed").with_entry("echo", format!("Echo: {}", params.message)))
    }
}
