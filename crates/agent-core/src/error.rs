//! Error Types
//!
//! One enum for everything an agent run can fail with. Provider variants
//! carry the upstream detail; `user_message` decides what a client sees.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    // -- provider --------------------------------------------------------
    /// The provider answered with an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Could not reach the provider, or it reported a server-side failure
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider returned something we could not decode
    #[error("Parse error: {0}")]
    Parse(String),

    // -- tools -----------------------------------------------------------
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    // -- turn ------------------------------------------------------------
    /// Nothing in the turn could be read as text
    #[error("Turn for session '{session}' carries no text")]
    EmptyTurn { session: String },

    /// The model kept asking for tools
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// The event stream ended without a final reply
    #[error("Agent '{agent}' finished without a reply")]
    NoReply { agent: String },

    // -- infrastructure --------------------------------------------------
    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_) | AgentError::RateLimited(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::RateLimited(_) => {
                "You've made too many requests. Please wait a moment.".into()
            }
            AgentError::Auth(_) => "The AI service rejected our credentials.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::EmptyTurn { .. } => "Your message was empty.".into(),
            AgentError::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            AgentError::NoReply { .. } => "The agent did not produce an answer.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
