//! Error Types

use agent_core::AgentError;
use thiserror::Error;

use crate::classifier::RoutingLabel;

/// Result type alias for routing operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Routing error types
#[derive(Error, Debug)]
pub enum RouterError {
    /// The classifier produced a label nobody registered an agent for
    #[error("Configuration error: no agent registered for label '{label}'")]
    Configuration { label: RoutingLabel },

    /// The selected agent failed while its events were being relayed
    #[error("Agent '{agent}' (label '{label}') failed: {source}")]
    UpstreamAgent {
        label: RoutingLabel,
        agent: String,
        #[source]
        source: AgentError,
    },

    /// No text could be derived from the turn
    #[error("Malformed turn: {0}")]
    MalformedTurn(String),

    /// Routing rules could not be loaded
    #[error("Invalid routing config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_carries_agent_error() {
        let err = RouterError::UpstreamAgent {
            label: RoutingLabel::new("search"),
            agent: "AgentSearch".into(),
            source: AgentError::RateLimited("quota".into()),
        };
        let text = err.to_string();
        assert!(text.contains("label 'search'"));
        assert!(text.ends_with("Rate limited: quota"));
    }
}
