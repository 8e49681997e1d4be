//! Task Dispatcher
//!
//! Bridges a [`MessageBus`] to the [`ExecutionRuntime`]: every inbound task is
//! executed and its result, failed or not, is published on [`RESULTS_TOPIC`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;

use crate::bus::{MessageBus, RESULTS_TOPIC, TaskHandler, publish_json};
use crate::error::{KernelError, Result};
use crate::runtime::ExecutionRuntime;
use crate::task::Task;

/// Listens for tasks on the bus
#[derive(Clone)]
pub struct TaskDispatcher {
    runtime: ExecutionRuntime,
    bus: Option<Arc<dyn MessageBus>>,
    started: Arc<Mutex<HashSet<String>>>,
}

impl TaskDispatcher {
    pub fn new(runtime: ExecutionRuntime, bus: Option<Arc<dyn MessageBus>>) -> Self {
        Self {
            runtime,
            bus,
            started: Arc::default(),
        }
    }

    /// Subscribe to `topic`. Per-task failures are logged, never fatal to the subscription.
    ///
    /// Each topic can be started once; a repeat start is rejected as invalid input.
    pub async fn start(&self, topic: &str) -> Result<()> {
        let Some(bus) = self.bus.clone() else {
            return Err(KernelError::Internal(
                "message bus is not configured for dispatcher".into(),
            ));
        };

        if !self.started_topics().insert(topic.to_string()) {
            return Err(KernelError::InvalidInput(format!(
                "dispatcher already started on topic {topic}"
            )));
        }

        let runtime = self.runtime.clone();
        let publisher = Arc::clone(&bus);
        let handler: TaskHandler = Arc::new(move |task: Task| {
            let runtime = runtime.clone();
            let bus = Arc::clone(&publisher);
            async move { handle_task(&runtime, bus.as_ref(), task).await }.boxed()
        });

        if let Err(e) = bus.subscribe(topic, handler).await {
            self.started_topics().remove(topic);
            return Err(KernelError::Internal(format!(
                "failed to subscribe to topic {topic}: {e}"
            )));
        }

        tracing::info!(topic = %topic, results = RESULTS_TOPIC, "Dispatcher started");
        Ok(())
    }

    fn started_topics(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn handle_task(runtime: &ExecutionRuntime, bus: &dyn MessageBus, task: Task) {
    let result = match runtime.execute(&task).await {
        Ok(result) => result,
        Err(failure) => {
            tracing::error!(
                task_id = %task.id,
                tool = %task.tool,
                code = failure.kind().code(),
                error = %failure.error,
                "Task execution failed"
            );
            failure.result
        }
    };

    if let Err(e) = publish_json(bus, RESULTS_TOPIC, &result).await {
        tracing::error!(task_id = %task.id, error = %e, "Failed to publish task result");
    }
}
