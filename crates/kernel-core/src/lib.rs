//! # kernel-core
//!
//! Task execution kernel for LLM agents: tool registry, provider registry,
//! execution runtime, bus dispatcher and the conversation loop that turns
//! `TOOL:name|{json}` replies into tool executions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Kernel                                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │ Conversation │  │  Invocation  │  │   ExecutionRuntime     │  │
//! │  │    Loop      │──│   Protocol   │──│   (ToolRegistry)       │  │
//! │  └──────┬───────┘  └──────────────┘  └───────────▲────────────┘  │
//! │         │                                        │               │
//! │  ┌──────▼───────┐                      ┌─────────┴────────────┐  │
//! │  │ LlmProvider  │                      │   TaskDispatcher     │  │
//! │  │  Registry    │                      │   (MessageBus)       │  │
//! │  └──────────────┘                      └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Providers, the bus and the key/value store are injected through
//! [`Dependencies`]; the kernel never constructs them itself.

pub mod bus;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod kernel;
pub mod message;
pub mod mock;
pub mod protocol;
pub mod provider;
pub mod runtime;
pub mod store;
pub mod task;
pub mod tool;

pub use bus::{InMemoryBus, MessageBus, RESULTS_TOPIC, TaskHandler};
pub use conversation::{AgentConfig, ConversationBuilder, ConversationLoop};
pub use dispatcher::TaskDispatcher;
pub use error::{ErrorKind, ExecutionFailure, KernelError, Result, ToolError};
pub use kernel::{Dependencies, Kernel};
pub use message::{BoundedHistory, Message, Role};
pub use protocol::{Invocation, InvocationProtocol, Outcome, TOOL_PREFIX};
pub use provider::{LlmProvider, ProviderRegistry};
pub use runtime::{Execution, ExecutionRuntime};
pub use store::{KeyValueStore, MemoryStore};
pub use task::{Arguments, Task, TaskResult};
pub use tool::{EchoTool, ParameterSchema, Tool, ToolRegistry, ToolSchema, Typed, TypedTool};
