//! Tool Invocation Protocol
//!
//! Recognizes a tool command embedded in a generated reply:
//!
//! ```text
//! TOOL:<tool-name>|<json-object>
//! ```
//!
//! A reply is a command only if it starts with the literal `TOOL:` prefix
//! (case-sensitive, no leading whitespace). Anything else is conversational
//! text and passes through untouched.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{KernelError, Result};
use crate::runtime::ExecutionRuntime;
use crate::task::{Arguments, Task};
use crate::tool::ToolRegistry;

/// Literal prefix marking a tool command
pub const TOOL_PREFIX: &str = "TOOL:";

const SEPARATOR: char = '|';

/// A decoded tool command
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub tool: String,
    pub arguments: Arguments,
}

impl Invocation {
    /// Convert into a task with a fresh identifier
    pub fn into_task(self) -> Task {
        Task::generated(self.tool, self.arguments)
    }
}

/// Whether a reply encodes a tool command
pub fn is_invocation(reply: &str) -> bool {
    reply.starts_with(TOOL_PREFIX)
}

/// Parse a `TOOL:name|{json}` command.
///
/// The split happens on the first `|`; any later `|` belongs to the payload.
pub fn parse_invocation(reply: &str) -> Result<Invocation> {
    let Some(body) = reply.strip_prefix(TOOL_PREFIX) else {
        return Err(KernelError::malformed(
            format!("expected '{TOOL_PREFIX}name|{{json}}'"),
            reply,
        ));
    };
    let body = body.trim();

    let Some((name, payload)) = body.split_once(SEPARATOR) else {
        return Err(KernelError::malformed(
            format!("expected '{TOOL_PREFIX}name|{{json}}', missing '{SEPARATOR}' separator"),
            body,
        ));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(KernelError::malformed("tool name cannot be empty", body));
    }

    let payload = payload.trim();
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| KernelError::malformed(format!("invalid JSON parameters: {e}"), payload))?;

    let Value::Object(arguments) = value else {
        return Err(KernelError::malformed(
            "parameters must be a JSON object",
            payload,
        ));
    };

    Ok(Invocation {
        tool: name.to_string(),
        arguments,
    })
}

/// What the protocol made of one reply
#[derive(Debug)]
pub enum Outcome {
    /// Conversational text, unchanged
    Passthrough(String),

    /// A tool ran; its output rendered as text
    ToolOutput { tool: String, output: String },

    /// The command could not be parsed, resolved or executed
    ToolFailed { tool: Option<String>, error: KernelError },
}

impl Outcome {
    /// Text to splice back into the conversation
    pub fn into_reply(self) -> String {
        match self {
            Self::Passthrough(text) => text,
            Self::ToolOutput { output, .. } => output,
            Self::ToolFailed { error, .. } => format!("Tool failed: {error}"),
        }
    }

    pub const fn is_tool_call(&self) -> bool {
        !matches!(self, Self::Passthrough(_))
    }
}

/// Turns tool commands in replies into executed tasks
#[derive(Clone)]
pub struct InvocationProtocol {
    runtime: ExecutionRuntime,
}

impl InvocationProtocol {
    pub const fn new(runtime: ExecutionRuntime) -> Self {
        Self { runtime }
    }

    fn registry(&self) -> Result<&Arc<ToolRegistry>> {
        self.runtime
            .registry()
            .ok_or_else(|| KernelError::Internal("tool registry is not configured".into()))
    }

    /// Handle a raw reply. Never fails: tool problems degrade into [`Outcome::ToolFailed`].
    pub async fn resolve(&self, reply: &str) -> Outcome {
        if !is_invocation(reply) {
            return Outcome::Passthrough(reply.to_string());
        }

        tracing::info!(command = %reply, "Tool requested");

        let invocation = match parse_invocation(reply) {
            Ok(invocation) => invocation,
            Err(error) => {
                tracing::warn!(error = %error, "Failed to parse tool command");
                return Outcome::ToolFailed { tool: None, error };
            }
        };

        let tool = invocation.tool.clone();
        match self.dispatch(invocation).await {
            Ok(output) => Outcome::ToolOutput { tool, output },
            Err(error) => {
                tracing::warn!(tool = %tool, error = %error, "Tool invocation failed");
                Outcome::ToolFailed {
                    tool: Some(tool),
                    error,
                }
            }
        }
    }

    /// Execute a decoded invocation and render its primary data
    pub async fn dispatch(&self, invocation: Invocation) -> Result<String> {
        if !self.registry()?.contains(&invocation.tool) {
            return Err(KernelError::ToolNotFound(invocation.tool));
        }

        let task = invocation.into_task();
        tracing::info!(task_id = %task.id, tool = %task.tool, "Executing tool");

        let result = self
            .runtime
            .execute(&task)
            .await
            .map_err(crate::error::ExecutionFailure::into_error)?;

        if !result.success {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| result.status.clone());
            return Err(KernelError::ToolExecutionFailed {
                tool: task.tool,
                source: crate::error::ToolError::new(format!("tool returned failure: {reason}"))
                    .with_partial(result),
            });
        }

        tracing::info!(task_id = %task.id, tool = %task.tool, "Tool executed successfully");
        Ok(result.primary_text())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::{ErrorKind, ToolError};
    use crate::task::TaskResult;
    use crate::tool::{EchoTool, Tool, ToolSchema, Typed};

    fn malformed_raw(reply: &str) -> String {
        match parse_invocation(reply) {
            Err(KernelError::MalformedCommand { raw, .. }) => raw,
            other => panic!("expected MalformedCommand for {reply:?}, got {other:?}"),
        }
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_round_trip() {
        let invocation = parse_invocation(r#"TOOL:echo|{"message":"hi"}"#).unwrap();
        assert_eq!(invocation.tool, "echo");
        assert_eq!(invocation.arguments.len(), 1);
        assert_eq!(invocation.arguments["message"], json!("hi"));
    }

    #[test]
    fn test_parse_trims_name_and_payload() {
        let invocation = parse_invocation("TOOL:  scan  |  {\"target\": \"a\"}  \n").unwrap();
        assert_eq!(invocation.tool, "scan");
        assert_eq!(invocation.arguments["target"], json!("a"));
    }

    #[test]
    fn test_empty_object_is_valid() {
        let invocation = parse_invocation("TOOL:echo|{}").unwrap();
        assert!(invocation.arguments.is_empty());
    }

    #[test]
    fn test_pipe_inside_payload_belongs_to_payload() {
        let invocation = parse_invocation(r#"TOOL:echo|{"message":"a|b"}"#).unwrap();
        assert_eq!(invocation.arguments["message"], json!("a|b"));
    }

    #[test]
    fn test_nested_arguments() {
        let invocation =
            parse_invocation(r#"TOOL:scan|{"target":"x","opts":{"depth":2,"tags":["a"]}}"#).unwrap();
        assert_eq!(invocation.arguments["opts"]["depth"], json!(2));
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(malformed_raw("TOOL:echo"), "echo");
        assert!(parse_invocation("TOOL:echo {\"message\":\"hi\"}")
            .unwrap_err()
            .to_string()
            .contains("separator"));
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(malformed_raw("TOOL:|{}"), "|{}");
        assert_eq!(malformed_raw("TOOL:   |{}"), "|{}");
    }

    #[test]
    fn test_invalid_json_payload() {
        let err = parse_invocation("TOOL:echo|not-json").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("not-json"));
        assert!(text.contains("invalid JSON parameters"));
        assert_eq!(malformed_raw("TOOL:echo|not-json"), "not-json");
    }

    #[test]
    fn test_trailing_text_after_json() {
        assert_eq!(
            malformed_raw(r#"TOOL:echo|{"message":"hi"} and then some"#),
            r#"{"message":"hi"} and then some"#
        );
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(malformed_raw("TOOL:echo|"), "");
    }

    #[test]
    fn test_non_object_json_rejected() {
        for payload in [r#"["a","b"]"#, "42", r#""text""#, "null", "true"] {
            let raw = malformed_raw(&format!("TOOL:echo|{payload}"));
            assert_eq!(raw, payload);
        }
    }

    #[test]
    fn test_prefix_detection() {
        assert!(is_invocation("TOOL:echo|{}"));
        assert!(!is_invocation(" TOOL:echo|{}"));
        assert!(!is_invocation("tool:echo|{}"));
        assert!(!is_invocation("Sure! TOOL:echo|{}"));
        assert!(!is_invocation(""));
    }

    #[test]
    fn test_parse_without_prefix() {
        assert!(matches!(
            parse_invocation("echo|{}"),
            Err(KernelError::MalformedCommand { .. })
        ));
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    struct Refusing;

    #[async_trait]
    impl Tool for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "refusing".into(),
                description: "Reports failure without erroring".into(),
                parameters: Vec::new(),
            }
        }

        async fn execute(&self, task: &Task) -> std::result::Result<TaskResult, ToolError> {
            Ok(TaskResult::failure(&task.id, "target unreachable"))
        }
    }

    fn protocol() -> InvocationProtocol {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Typed(EchoTool)).unwrap();
        registry.register(Refusing).unwrap();
        InvocationProtocol::new(ExecutionRuntime::new(registry))
    }

    #[tokio::test]
    async fn test_passthrough() {
        let outcome = protocol().resolve("Hello there, how can I help?").await;
        assert!(!outcome.is_tool_call());
        assert_eq!(outcome.into_reply(), "Hello there, how can I help?");
    }

    #[tokio::test]
    async fn test_executes_echo() {
        let outcome = protocol().resolve(r#"TOOL:echo|{"message":"hi"}"#).await;
        assert!(matches!(outcome, Outcome::ToolOutput { ref tool, .. } if tool == "echo"));
        assert_eq!(outcome.into_reply(), "Echo: hi");
    }

    #[tokio::test]
    async fn test_unknown_tool_degrades() {
        let outcome = protocol().resolve("TOOL:ghost|{}").await;
        let Outcome::ToolFailed { tool, error } = &outcome else {
            panic!("expected ToolFailed");
        };
        assert_eq!(tool.as_deref(), Some("ghost"));
        assert_eq!(error.kind(), ErrorKind::ToolNotFound);
        assert!(outcome.into_reply().starts_with("Tool failed: "));
    }

    #[tokio::test]
    async fn test_malformed_degrades() {
        let reply = protocol().resolve("TOOL:echo|not-json").await.into_reply();
        assert!(reply.starts_with("Tool failed: "));
        assert!(reply.contains("not-json"));
    }

    #[tokio::test]
    async fn test_tool_argument_rejection_degrades() {
        let reply = protocol().resolve("TOOL:echo|{}").await.into_reply();
        assert!(reply.starts_with("Tool failed: "));
        assert!(reply.contains("message"));
    }

    #[tokio::test]
    async fn test_unsuccessful_result_degrades() {
        let outcome = protocol().resolve("TOOL:refusing|{}").await;
        let Outcome::ToolFailed { error, .. } = &outcome else {
            panic!("expected ToolFailed");
        };
        assert_eq!(error.kind(), ErrorKind::ToolExecutionFailed);
        assert!(outcome.into_reply().contains("target unreachable"));
    }

    #[tokio::test]
    async fn test_unconfigured_registry() {
        let protocol = InvocationProtocol::new(ExecutionRuntime::default());
        let outcome = protocol.resolve("TOOL:echo|{}").await;
        assert!(matches!(
            outcome,
            Outcome::ToolFailed { ref error, .. } if error.kind() == ErrorKind::Internal
        ));
    }
}
