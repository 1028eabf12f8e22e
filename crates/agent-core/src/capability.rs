//! Agent Capabilities
//!
//! The seam between whatever dispatches a conversational turn and whatever
//! answers it. A capability consumes a [`Turn`] and yields a lazy stream of
//! [`ResponseEvent`]s; the consumer pulls events as they arrive.
//!
//! ```text
//!   Turn ──▶ AgentCapability::run ──▶ EventStream
//!                                       │ Partial  "Hor"
//!                                       │ Partial  "ses"
//!                                       │ ToolCall create_horse_fact
//!                                       │ ToolResult ...
//!                                       ▼ Final    "Horses cannot sleep."
//! ```

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tool::{ToolCall, ToolResult};

/// One piece of a structured turn
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// The recognised shapes a turn's content can take
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPayload {
    /// Structured content made of parts
    Parts(Vec<Part>),

    /// A single free-text field
    Text(String),

    /// Anything else the caller handed over
    Other(serde_json::Value),
}

/// Where the text of a turn was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextSource {
    /// The first part of a structured turn
    FirstPart,
    /// The single free-text field
    TextField,
    /// Neither shape matched; the whole turn was stringified
    Stringified,
}

impl std::fmt::Display for TextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextSource::FirstPart => write!(f, "first_part"),
            TextSource::TextField => write!(f, "text_field"),
            TextSource::Stringified => write!(f, "stringified"),
        }
    }
}

/// Text pulled out of a turn, with its provenance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
}

/// One user-originated unit of conversational input
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Opaque user identifier, passed through to the agent
    pub user_id: String,

    /// Opaque session identifier, passed through to the agent
    pub session_id: String,

    /// The content of the turn
    pub payload: TurnPayload,
}

impl Turn {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        payload: TurnPayload,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            payload,
        }
    }

    /// A turn carrying a single user message as one text part
    pub fn user_message(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(user_id, session_id, TurnPayload::Parts(vec![Part::text(text)]))
    }

    /// Pull the text out of the turn
    ///
    /// Shapes are tried in order: the first part of a parts list, then the
    /// single text field, then the stringified turn. `None` only when the
    /// turn cannot be stringified at all.
    pub fn extract_text(&self) -> Option<ExtractedText> {
        if let TurnPayload::Parts(parts) = &self.payload {
            if let Some(text) = parts.first().and_then(|p| p.text.clone()) {
                return Some(ExtractedText {
                    text,
                    source: TextSource::FirstPart,
                });
            }
        }

        if let TurnPayload::Text(text) = &self.payload {
            return Some(ExtractedText {
                text: text.clone(),
                source: TextSource::TextField,
            });
        }

        let mut text = String::new();
        std::fmt::write(&mut text, format_args!("{}", self)).ok()?;
        Some(ExtractedText {
            text,
            source: TextSource::Stringified,
        })
    }
}

/// The turn as compact JSON, identifiers included
impl std::fmt::Display for Turn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

/// A unit of output produced by an agent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    /// Incremental text from the model
    Partial { author: String, delta: String },

    /// The model asked for a tool
    ToolCall { author: String, call: ToolCall },

    /// A tool finished
    ToolResult { author: String, result: ToolResult },

    /// The complete reply; at most one per run
    Final { author: String, content: String },
}

impl ResponseEvent {
    pub fn author(&self) -> &str {
        match self {
            ResponseEvent::Partial { author, .. }
            | ResponseEvent::ToolCall { author, .. }
            | ResponseEvent::ToolResult { author, .. }
            | ResponseEvent::Final { author, .. } => author,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ResponseEvent::Final { .. })
    }

    /// Accumulated reply text, if this is the final event
    pub fn final_content(&self) -> Option<&str> {
        match self {
            ResponseEvent::Final { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Lazy stream of agent events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send>>;

/// Something that can answer a conversational turn
///
/// `run` must not do any work up front: everything happens as the returned
/// stream is polled, and dropping the stream stops the work.
pub trait AgentCapability: Send + Sync {
    /// Agent name, used as the author of its events
    fn name(&self) -> &str;

    /// One-line description for logs and health output
    fn description(&self) -> &str;

    /// Start answering `turn`
    fn run(&self, turn: Turn) -> EventStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_turn() {
        let turn = Turn::user_message("u", "s", "roll a dice");
        assert_eq!(turn.user_id, "u");
        assert_eq!(turn.session_id, "s");
        assert_eq!(
            turn.payload,
            TurnPayload::Parts(vec![Part::text("roll a dice")])
        );
    }

    #[test]
    fn test_extract_text_priority() {
        let parts = Turn::new(
            "u",
            "s",
            TurnPayload::Parts(vec![Part::text("first"), Part::text("second")]),
        );
        let extracted = parts.extract_text().unwrap();
        assert_eq!(extracted.text, "first");
        assert_eq!(extracted.source, TextSource::FirstPart);

        let text = Turn::new("u", "s", TurnPayload::Text("Roll a DICE".into()));
        let extracted = text.extract_text().unwrap();
        assert_eq!(extracted.text, "Roll a DICE");
        assert_eq!(extracted.source, TextSource::TextField);

        let other = Turn::new("u", "s", TurnPayload::Other(serde_json::json!({"horse": true})));
        let extracted = other.extract_text().unwrap();
        assert_eq!(
            extracted.text,
            r#"{"user_id":"u","session_id":"s","payload":{"other":{"horse":true}}}"#
        );
        assert_eq!(extracted.source, TextSource::Stringified);
    }

    #[test]
    fn test_extract_text_falls_back_when_parts_have_no_text() {
        let empty = Turn::new("u", "s", TurnPayload::Parts(vec![]));
        let extracted = empty.extract_text().unwrap();
        assert_eq!(extracted.source, TextSource::Stringified);
        assert_eq!(extracted.text, empty.to_string());
        assert!(extracted.text.contains(r#""session_id":"s""#));

        let textless = Turn::new("u", "s", TurnPayload::Parts(vec![Part::default()]));
        assert_eq!(
            textless.extract_text().unwrap().source,
            TextSource::Stringified
        );
    }

    #[test]
    fn test_turn_display_covers_whole_turn() {
        let turn = Turn::new("alice", "s1", TurnPayload::Text("hi".into()));
        assert_eq!(
            turn.to_string(),
            r#"{"user_id":"alice","session_id":"s1","payload":{"text":"hi"}}"#
        );
    }

    #[test]
    fn test_final_detection() {
        let partial = ResponseEvent::Partial {
            author: "a".into(),
            delta: "x".into(),
        };
        let done = ResponseEvent::Final {
            author: "a".into(),
            content: "xyz".into(),
        };
        assert!(!partial.is_final());
        assert!(done.is_final());
        assert_eq!(done.final_content(), Some("xyz"));
        assert_eq!(partial.author(), "a");
    }
}
