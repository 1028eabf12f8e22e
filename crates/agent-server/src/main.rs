//! Agent Router HTTP Server
//!
//! Axum server in front of the orchestrator. Every turn is classified and
//! handed to either the tool agent (horse facts, dice) or the search agent.

mod config;
mod frontend;
mod handlers;
mod protocol;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{MemorySessionStore, Session, SessionId, SessionStore};
use agent_router::{AgentRegistry, CUSTOM_LABEL, Orchestrator, RoutingConfig, SEARCH_LABEL};
use agent_runtime::ProviderKind;
use demo_agents::{custom_tools_agent, search_agent};

use crate::config::ServerConfig;
use crate::handlers::{health_check, invoke, list_models};
use crate::state::AppState;

/// All routes, with CORS and request tracing
pub fn app(state: AppState) -> Router {
    let cors = state.config.cors_layer();
    let frontend = frontend::routes(&state.config.frontend_dir);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Agent API
        .route("/invoke", post(invoke))
        // Static files (web UI)
        .merge(frontend)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    // Initialize LLM provider
    let kind = ProviderKind::from_env()?;
    let provider = agent_runtime::provider_for(kind)?;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| kind.default_model().to_string());

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", kind);
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not available - agents will fail until it is", kind);
        }
    }

    // Sessions, shared by both agents
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    sessions.save(&Session::new(
        SessionId::from_string(config.session_id.clone()),
        config.user_id.as_str(),
    ))?;
    tracing::info!(user = %config.user_id, session = %config.session_id, "Session created");

    // Agents
    let custom = custom_tools_agent(provider.clone(), sessions.clone(), &model)?;
    let search = search_agent(provider.clone(), sessions, &model)?;
    tracing::info!(tools = ?custom.tools().names(), %model, "Agents ready");

    // Routing
    let routing = match &config.router_config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading routing rules");
            RoutingConfig::from_file(path)?
        }
        None => RoutingConfig::default(),
    };
    let registry = AgentRegistry::new()
        .with(CUSTOM_LABEL, Arc::new(custom))
        .with(SEARCH_LABEL, Arc::new(search));
    let orchestrator = Orchestrator::new(routing.build_classifier()?, registry);
    orchestrator.validate()?;
    tracing::info!(registry = ?orchestrator.registry(), "Router validated");

    // Build application state
    let addr = config.bind_addr.clone();
    let state = AppState {
        orchestrator,
        provider,
        config: Arc::new(config),
    };
    let app = app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 agent router running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health      - Health check");
    tracing::info!("  GET  /api/models  - List available models");
    tracing::info!("  POST /invoke      - Ask the agents (chat stream or query)");
    tracing::info!("  GET  /app         - Web UI");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
