//! # agent-runtime
//!
//! LLM providers for the agent router.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference through `ollama-rs`
//! - **Gemini**: Google's Generative Language API, with `google_search`
//!   grounding when an agent asks for web search
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::provider_from_env;
//!
//! // LLM_PROVIDER=gemini GEMINI_API_KEY=...
//! let provider = provider_from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(provider)
//!     .build()?;
//! ```

use std::str::FromStr;
use std::sync::Arc;

pub mod gemini;
pub mod ollama;
mod transport;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, Result};

/// Which backend `provider_from_env` builds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Ollama,
    Gemini,
}

impl ProviderKind {
    /// Model used when `AGENT_MODEL` is unset
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Read `LLM_PROVIDER`, defaulting to Ollama
    pub fn from_env() -> Result<Self> {
        std::env::var("LLM_PROVIDER").map_or(Ok(Self::default()), |v| v.parse())
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(AgentError::Config(format!(
                "Unknown LLM_PROVIDER '{}', expected 'ollama' or 'gemini'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Build the provider of the given kind from its environment variables
pub fn provider_for(kind: ProviderKind) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_env()?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_env()?),
    };
    tracing::info!(provider = %kind, "LLM provider configured");
    Ok(provider)
}

/// Build the provider selected by `LLM_PROVIDER`
pub fn provider_from_env() -> Result<Arc<dyn LlmProvider>> {
    provider_for(ProviderKind::from_env()?)
}
