//! Tasks and Results
//!
//! The unit of work handed to the kernel and its normalized outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument map carried by a task
pub type Arguments = Map<String, Value>;

/// A request to run one tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned identifier, echoed back on the result
    pub id: String,

    /// Name of the registered tool to run
    pub tool: String,

    /// Arguments as key-value pairs
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Arguments,
}

impl Task {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, args: Arguments) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            args,
        }
    }

    /// Task with a freshly generated identifier
    pub fn generated(tool: impl Into<String>, args: Arguments) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), tool, args)
    }

    /// Look up a string argument
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Outcome of executing a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Identifier of the originating task
    pub task_id: String,

    /// Short status text
    #[serde(default)]
    pub status: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: status.into(),
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: "failed".into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Add one entry to the data map
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Render the primary data as plain text.
    ///
    /// A single entry yields its value (strings unquoted), several entries
    /// yield compact JSON, and a result without data falls back to its status.
    pub fn primary_text(&self) -> String {
        match &self.data {
            Some(data) if data.len() == 1 => data.values().next().map(value_text).unwrap_or_default(),
            Some(data) if !data.is_empty() => Value::Object(data.clone()).to_string(),
            _ => self.status.clone(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
