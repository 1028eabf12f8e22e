//! Agent Definitions
//!
//! The two agents the router dispatches to. Both share the provider and
//! the session store handed in by the server.

use std::sync::Arc;

use agent_core::{Agent, AgentBuilder, LlmProvider, Result, SessionStore};

use crate::svckit::{DiceRollTool, HorseFactTool};

pub const CUSTOM_AGENT_NAME: &str = "pro_search_agent";

pub const CUSTOM_AGENT_DESCRIPTION: &str = "An agent that can answer questions.";

pub const CUSTOM_AGENT_INSTRUCTION: &str = "You are a helpful research assistant that knows horse trivia. \
For any user prompt mentioning a horse, use create_horse_fact tool. \
For all other queries, use the roll_a_dice tool. ";

pub const SEARCH_AGENT_NAME: &str = "AgentSearch";

pub const SEARCH_AGENT_DESCRIPTION: &str = "Agent that answers using Google search only.";

pub const SEARCH_AGENT_INSTRUCTION: &str = "Answer any general query using the google_search tool.";

/// Tool-backed agent: horse facts and dice rolls
pub fn custom_tools_agent(
    provider: Arc<dyn LlmProvider>,
    sessions: Arc<dyn SessionStore>,
    model: &str,
) -> Result<Agent> {
    AgentBuilder::new()
        .name(CUSTOM_AGENT_NAME)
        .description(CUSTOM_AGENT_DESCRIPTION)
        .system_prompt(CUSTOM_AGENT_INSTRUCTION)
        .provider(provider)
        .sessions(sessions)
        .model(model)
        .tool(HorseFactTool)
        .tool(DiceRollTool)
        .build()
}

/// Search-grounded agent, deterministic sampling
pub fn search_agent(
    provider: Arc<dyn LlmProvider>,
    sessions: Arc<dyn SessionStore>,
    model: &str,
) -> Result<Agent> {
    AgentBuilder::new()
        .name(SEARCH_AGENT_NAME)
        .description(SEARCH_AGENT_DESCRIPTION)
        .system_prompt(SEARCH_AGENT_INSTRUCTION)
        .provider(provider)
        .sessions(sessions)
        .model(model)
        .temperature(0.0)
        .web_search(true)
        .build()
}
