//! Execution Runtime
//!
//! The only component that invokes tools. Every call produces exactly one
//! `TaskResult` carrying the originating task's id, whether the tool ran,
//! was missing, or failed.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{ExecutionFailure, KernelError, ToolError};
use crate::task::{Task, TaskResult};
use crate::tool::ToolRegistry;

/// Outcome of [`ExecutionRuntime::execute`]
pub type Execution = std::result::Result<TaskResult, ExecutionFailure>;

/// Resolves tasks against a [`ToolRegistry`] and runs them
#[derive(Clone, Default)]
pub struct ExecutionRuntime {
    registry: Option<Arc<ToolRegistry>>,
}

impl ExecutionRuntime {
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub const fn registry(&self) -> Option<&Arc<ToolRegistry>> {
        self.registry.as_ref()
    }

    /// Run a task to completion
    pub async fn execute(&self, task: &Task) -> Execution {
        let Some(registry) = &self.registry else {
            return Err(failure(
                task,
                KernelError::Internal("runtime registry is not initialized".into()),
            ));
        };

        let Some(tool) = registry.get(&task.tool) else {
            tracing::warn!(task_id = %task.id, tool = %task.tool, "Tool not found");
            return Err(failure(task, KernelError::ToolNotFound(task.tool.clone())));
        };

        tracing::debug!(task_id = %task.id, tool = %task.tool, "Executing tool");

        let started = Instant::now();
        let outcome = tool.execute(task).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(mut result) => {
                if result.task_id != task.id {
                    tracing::warn!(
                        task_id = %task.id,
                        reported = %result.task_id,
                        tool = %task.tool,
                        "Tool reported a foreign task id, correcting"
                    );
                    result.task_id.clone_from(&task.id);
                }
                tracing::debug!(
                    task_id = %task.id,
                    tool = %task.tool,
                    success = result.success,
                    elapsed_ms,
                    "Tool finished"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(
                    task_id = %task.id,
                    tool = %task.tool,
                    error = %err,
                    elapsed_ms,
                    "Tool execution failed"
                );
                Err(tool_failure(task, err))
            }
        }
    }

    /// Run a task, giving up as soon as `cancel` fires
    pub async fn execute_with_cancel(&self, task: &Task, cancel: &CancellationToken) -> Execution {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(task_id = %task.id, tool = %task.tool, "Task cancelled");
                Err(failure(
                    task,
                    KernelError::Cancelled(format!("task {} was cancelled", task.id)),
                ))
            }
            outcome = self.execute(task) => outcome,
        }
    }
}

fn failure(task: &Task, error: KernelError) -> ExecutionFailure {
    ExecutionFailure {
        result: TaskResult::failure(&task.id, error.to_string()),
        error,
    }
}

fn tool_failure(task: &Task, mut err: ToolError) -> ExecutionFailure {
    let result = match err.partial.take() {
        Some(mut partial) => {
            partial.task_id.clone_from(&task.id);
            partial.success = false;
            if partial.error.is_none() {
                partial.error = Some(err.message.clone());
            }
            partial
        }
        None => TaskResult::failure(&task.id, err.message.clone()),
    };

    ExecutionFailure {
        result,
        error: KernelError::ToolExecutionFailed {
            tool: task.tool.clone(),
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::task::Arguments;
    use crate::tool::{EchoTool, Tool, ToolSchema, Typed};

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "failing".into(),
                description: "Always fails after partial work".into(),
                parameters: Vec::new(),
            }
        }

        async fn execute(&self, _task: &Task) -> std::result::Result<TaskResult, ToolError> {
            let partial = TaskResult::failure("someone-else", "half done").with_entry("written", 3);
            Err(ToolError::new("disk full")
                .with_partial(partial)
                .with_source(std::io::Error::other("ENOSPC")))
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "slow".into(),
                description: "Sleeps".into(),
                parameters: Vec::new(),
            }
        }

        async fn execute(&self, task: &Task) -> std::result::Result<TaskResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TaskResult::success(&task.id, "woke"))
        }
    }

    fn runtime() -> ExecutionRuntime {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Typed(EchoTool)).unwrap();
        registry.register(Failing).unwrap();
        registry.register(Slow).unwrap();
        ExecutionRuntime::new(registry)
    }

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_success_passes_result_through() {
        let task = Task::new("1", "echo", args(json!({"message": "hi"})));
        let result = runtime().execute(&task).await.unwrap();

        assert!(result.success);
        assert_eq!(result.task_id, "1");
        assert_eq!(result.primary_text(), "Echo: hi");
    }

    #[tokio::test]
    async fn test_missing_tool_preserves_task_id() {
        let task = Task::new("42", "ghost", Arguments::new());
        let failure = runtime().execute(&task).await.unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::ToolNotFound);
        assert_eq!(failure.result.task_id, "42");
        assert!(!failure.result.success);
        assert_eq!(failure.result.error.as_deref(), Some(failure.error.to_string().as_str()));
        assert!(failure.result.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_unconfigured_runtime() {
        let task = Task::new("9", "echo", Arguments::new());
        let failure = ExecutionRuntime::default().execute(&task).await.unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Internal);
        assert_eq!(failure.result.task_id, "9");
        assert!(!failure.result.success);
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_partial_and_cause() {
        let task = Task::new("7", "failing", Arguments::new());
        let failure = runtime().execute(&task).await.unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::ToolExecutionFailed);
        assert_eq!(failure.result.task_id, "7");
        assert_eq!(failure.result.data.as_ref().unwrap()["written"], json!(3));
        assert_eq!(failure.result.error.as_deref(), Some("half done"));

        let KernelError::ToolExecutionFailed { tool, source } = failure.error else {
            panic!("expected ToolExecutionFailed");
        };
        assert_eq!(tool, "failing");
        assert_eq!(source.message, "disk full");
        assert_eq!(std::error::Error::source(&source).unwrap().to_string(), "ENOSPC");
    }

    #[tokio::test]
    async fn test_invalid_arguments_surface_as_tool_failure() {
        let task = Task::new("5", "echo", Arguments::new());
        let failure = runtime().execute(&task).await.unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::ToolExecutionFailed);
        assert_eq!(failure.result.task_id, "5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_promptly() {
        let runtime = runtime();
        let cancel = CancellationToken::new();
        let task = Task::new("c1", "slow", Arguments::new());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let failure = runtime.execute_with_cancel(&task, &cancel).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Cancelled);
        assert_eq!(failure.result.task_id, "c1");
    }

    #[tokio::test]
    async fn test_concurrent_executes() {
        let runtime = runtime();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    let task = Task::new(i.to_string(), "echo", args(json!({"message": format!("m{i}")})));
                    runtime.execute(&task).await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.task_id, i.to_string());
        }
    }

    #[tokio::test]
    async fn test_tool_duration_logged() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runtime = runtime();
        let ok = Task::new("7", "echo", args(json!({"message": "hi"})));
        runtime.execute(&ok).await.unwrap();
        let failed = Task::new("8", "failing", Arguments::new());
        runtime.execute(&failed).await.unwrap_err();

        let text = logs.text();
        let finished = text.lines().find(|l| l.contains("Tool finished")).unwrap();
        assert!(finished.contains("elapsed_ms="));
        let failure = text.lines().find(|l| l.contains("Tool execution failed")).unwrap();
        assert!(failure.contains("elapsed_ms="));
    }
}
