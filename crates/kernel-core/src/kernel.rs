//! Kernel
//!
//! Execution authority wiring the tool registry, runtime and dispatcher
//! together with the injected collaborators. The kernel is the only component
//! through which tools are registered and executed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bus::MessageBus;
use crate::conversation::{AgentConfig, ConversationLoop};
use crate::dispatcher::TaskDispatcher;
use crate::error::Result;
use crate::provider::ProviderRegistry;
use crate::runtime::{Execution, ExecutionRuntime};
use crate::store::KeyValueStore;
use crate::task::Task;
use crate::tool::{Tool, ToolRegistry};

/// External collaborators handed to the kernel
#[derive(Clone, Default)]
pub struct Dependencies {
    pub bus: Option<Arc<dyn MessageBus>>,
    pub store: Option<Arc<dyn KeyValueStore>>,
    pub providers: Arc<ProviderRegistry>,
}

pub struct Kernel {
    registry: Arc<ToolRegistry>,
    runtime: ExecutionRuntime,
    dispatcher: TaskDispatcher,
    deps: Dependencies,
}

impl Kernel {
    pub fn new(deps: Dependencies) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        let runtime = ExecutionRuntime::new(Arc::clone(&registry));
        let dispatcher = TaskDispatcher::new(runtime.clone(), deps.bus.clone());

        Self {
            registry,
            runtime,
            dispatcher,
            deps,
        }
    }

    /// Add a tool to the kernel's registry
    pub fn register_tool<T: Tool + 'static>(&self, tool: T) -> Result<()> {
        self.registry.register(tool)
    }

    pub fn register_tool_arc(&self, tool: Arc<dyn Tool>) -> Result<()> {
        self.registry.register_arc(tool)
    }

    /// Execute a task directly
    pub async fn execute(&self, task: &Task) -> Execution {
        self.runtime.execute(task).await
    }

    pub async fn execute_with_cancel(&self, task: &Task, cancel: &CancellationToken) -> Execution {
        self.runtime.execute_with_cancel(task, cancel).await
    }

    /// Start listening for tasks on the bus
    pub async fn start_dispatcher(&self, topic: &str) -> Result<()> {
        self.dispatcher.start(topic).await
    }

    /// Open a new conversation session over this kernel's tools and providers
    pub fn conversation(&self, config: AgentConfig) -> Result<ConversationLoop> {
        ConversationLoop::new(Arc::clone(&self.deps.providers), self.runtime.clone(), config)
    }

    pub const fn tools(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub const fn runtime(&self) -> &ExecutionRuntime {
        &self.runtime
    }

    pub const fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.deps.providers
    }

    pub const fn bus(&self) -> Option<&Arc<dyn MessageBus>> {
        self.deps.bus.as_ref()
    }

    pub const fn store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        self.deps.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::{ErrorKind, KernelError};
    use crate::mock::ScriptedProvider;
    use crate::task::Arguments;
    use crate::tool::{EchoTool, Typed};

    #[tokio::test]
    async fn test_kernels_are_isolated() {
        let first = Kernel::new(Dependencies::default());
        let second = Kernel::new(Dependencies::default());
        first.register_tool(Typed(EchoTool)).unwrap();

        let task = Task::new("1", "echo", json!({"message": "hi"}).as_object().cloned().unwrap());
        assert!(first.execute(&task).await.is_ok());

        let failure = second.execute(&task).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn test_dispatcher_requires_bus() {
        let kernel = Kernel::new(Dependencies::default());
        assert!(matches!(
            kernel.start_dispatcher("tasks.inbound").await,
            Err(KernelError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_conversation_uses_kernel_tools() {
        let providers = Arc::new(ProviderRegistry::new("mock"));
        providers.register(Arc::new(
            ScriptedProvider::new("mock").reply(r#"TOOL:echo|{"message":"from kernel"}"#),
        ));
        let kernel = Kernel::new(Dependencies {
            providers,
            ..Default::default()
        });
        kernel.register_tool(Typed(EchoTool)).unwrap();

        let mut conversation = kernel.conversation(AgentConfig::default()).unwrap();
        let reply = conversation.process_request("echo").await.unwrap();
        assert_eq!(reply, "Echo: from kernel");
        assert_eq!(conversation.memory_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_keep_task_id() {
        let kernel = Kernel::new(Dependencies::default());
        kernel.register_tool(Typed(EchoTool)).unwrap();

        let failure = kernel
            .execute(&Task::new("x", "echo", Arguments::new()))
            .await
            .unwrap_err();
        assert_eq!(failure.result.task_id, "x");
        assert_eq!(failure.kind(), ErrorKind::ToolExecutionFailed);
    }
}
