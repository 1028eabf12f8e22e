//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool` for the custom agent.

mod dice_roll;
mod horse_fact;

pub use dice_roll::DiceRollTool;
pub use horse_fact::{HorseFactTool, HORSE_FACTS};
