//! Dice Roll Tool

use std::ops::RangeInclusive;

use async_trait::async_trait;
use rand::Rng;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

const FACES: RangeInclusive<u8> = 1..=6;

/// Rolls a six-sided die
pub struct DiceRollTool;

impl DiceRollTool {
    pub fn roll() -> u8 {
        rand::thread_rng().gen_range(FACES)
    }
}

#[async_trait]
impl Tool for DiceRollTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "roll_a_dice".into(),
            description: "Rolls a six-sided die and returns the result (1-6).".into(),
            parameters: vec![],
            has_side_effects: false,
        }
    }

    async fn execute(&self, _call: &ToolCall) -> CoreResult<ToolResult> {
        let value = Self::roll();
        tracing::debug!(value, "Die rolled");

        Ok(ToolResult::success("roll_a_dice", value.to_string())
            .with_data(serde_json::json!({ "value": value })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    #[test]
    fn test_roll_in_range() {
        for _ in 0..1000 {
            assert!(FACES.contains(&DiceRollTool::roll()));
        }
    }

    #[tokio::test]
    async fn test_execute_reports_value() {
        let call = ToolCall {
            name: "roll_a_dice".into(),
            arguments: HashMap::new(),
            id: Some("call-1".into()),
        };

        let result = DiceRollTool.execute(&call).await.unwrap();
        let value: u8 = result.output.parse().unwrap();
        assert!(FACES.contains(&value));
        assert_eq!(result.data.unwrap()["value"], u64::from(value));
    }
}
