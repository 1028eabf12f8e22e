//! Horse Fact Tool

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

/// Facts the tool knows about
pub const HORSE_FACTS: [&str; 3] = [
    "Horses cannot sleep.",
    "Horses have a unique way of communicating with each other through body language.",
    "The fastest recorded speed of a horse is 55 mph (88.5 km/h).",
];

/// Returns a horse fact. Always the first one, so replies stay reproducible.
pub struct HorseFactTool;

#[async_trait]
impl Tool for HorseFactTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_horse_fact".into(),
            description: "Returns a fact about horses.".into(),
            parameters: vec![],
            has_side_effects: false,
        }
    }

    async fn execute(&self, _call: &ToolCall) -> CoreResult<ToolResult> {
        let fact = HORSE_FACTS[0];
        tracing::debug!(fact, "Horse fact selected");

        Ok(ToolResult::success("create_horse_fact", fact)
            .with_data(serde_json::json!({ "fact": fact })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    #[tokio::test]
    async fn test_returns_first_fact() {
        let call = ToolCall {
            name: "create_horse_fact".into(),
            arguments: HashMap::new(),
            id: None,
        };

        let result = HorseFactTool.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Horses cannot sleep.");
    }

    #[test]
    fn test_takes_no_parameters() {
        let schema = HorseFactTool.schema();
        assert_eq!(schema.name, "create_horse_fact");
        assert!(schema.parameters.is_empty());
    }
}
