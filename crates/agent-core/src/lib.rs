//! # agent-core
//!
//! Provider-agnostic agent building blocks: messages, the LLM provider
//! strategy, tools, sessions, and the capability contract every routable
//! agent satisfies.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 AgentCapability (Turn → Events)             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider       │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                    SessionStore (history per session)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use capability::{
    AgentCapability, EventStream, ExtractedText, Part, ResponseEvent, TextSource, Turn,
    TurnPayload,
};
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::{MemorySessionStore, Session, SessionId, SessionStore};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
