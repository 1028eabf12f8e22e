//! Application State

use std::sync::Arc;

use agent_core::LlmProvider;
use agent_router::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Routes each turn to the tool agent or the search agent
    pub orchestrator: Orchestrator,

    /// LLM provider (Ollama or Gemini), used for health and model listing
    pub provider: Arc<dyn LlmProvider>,

    pub config: Arc<ServerConfig>,
}
