//! # demo-agents
//!
//! The two agents behind the router:
//!
//! ```text
//! "tell me a horse fact" ─► custom  ─► pro_search_agent ─► create_horse_fact
//! "roll a dice"          ─► custom  ─► pro_search_agent ─► roll_a_dice
//! anything else          ─► search  ─► AgentSearch      ─► provider web search
//! ```

pub mod agents;
pub mod svckit;

pub use agents::{custom_tools_agent, search_agent};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{DiceRollTool, HorseFactTool};
}
