//! task-kernel HTTP Server
//!
//! Axum-based server exposing direct task execution, bus dispatch and
//! session-keyed conversations over the kernel.

mod config;
mod handlers;
mod state;

use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kernel_core::{RESULTS_TOPIC, TaskResult, bus::Envelope};

use crate::config::ServerConfig;
use crate::state::{AppState, build_providers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("{},tower_http=debug", config.log_level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize LLM providers
    let providers = build_providers(&config);
    if providers.is_empty() {
        tracing::warn!("⚠ No LLM provider configured - conversations will fail");
        tracing::warn!("  Set AGENT_LLM_<PROVIDER>_API_KEY or AGENT_LLM_OLLAMA_MODEL in .env");
    } else {
        tracing::info!(default = %providers.default_name(), "Registered {} providers:", providers.len());
        for name in providers.list() {
            tracing::info!("  • {}", name);
        }
    }

    // Kernel, tools and bus
    let state = AppState::new(config, providers)?;

    tracing::info!("Registered {} tools:", state.kernel.tools().len());
    for name in state.kernel.tools().names() {
        tracing::info!("  • {}", name);
    }

    tokio::spawn(log_results(state.bus.watch()));
    state.kernel.start_dispatcher(&state.config.task_topic).await?;

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr = state.config.bind_addr.clone();
    let app = handlers::routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 task-kernel server running on http://{} ({})", addr, state.config.environment);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                     - Health check");
    tracing::info!("  GET    /api/providers              - Registered LLM providers");
    tracing::info!("  GET    /api/tools                  - Tool catalogue");
    tracing::info!("  POST   /api/tasks                  - Execute a task");
    tracing::info!("  POST   /api/bus/tasks              - Queue a task on {}", state.config.task_topic);
    tracing::info!("  POST   /api/chat                   - Conversation turn");
    tracing::info!("  GET    /api/chat/{{id}}/history      - Session history");
    tracing::info!("  DELETE /api/chat/{{id}}              - End session");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every result the dispatcher publishes
async fn log_results(mut events: broadcast::Receiver<Envelope>) {
    loop {
        match events.recv().await {
            Ok(envelope) if envelope.topic == RESULTS_TOPIC => {
                match serde_json::from_value::<TaskResult>(envelope.message) {
                    Ok(result) if result.success => {
                        tracing::info!(task_id = %result.task_id, status = %result.status, "Task completed");
                    }
                    Ok(result) => {
                        tracing::warn!(
                            task_id = %result.task_id,
                            error = result.error.as_deref().unwrap_or_default(),
                            "Task failed"
                        );
                    }
                    Err(e) => tracing::warn!(error = %e, "Unreadable task result"),
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Result logger fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
