//! # agent-router
//!
//! Keyword-driven dispatch of conversational turns to agents.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │  Classifier  │───▶│   Registry   │───▶│  AgentCapability │
//! │ (rules→label)│    │ (label→agent)│    │  (turn→events)   │
//! └──────────────┘    └──────────────┘    └──────────────────┘
//!          ▲                                       │
//!          └──────────── Orchestrator ◀────────────┘
//!                      (extract, route, relay)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_router::{AgentRegistry, Orchestrator, RoutingConfig};
//!
//! let classifier = RoutingConfig::default().build_classifier()?;
//! let registry = AgentRegistry::new()
//!     .with("custom", custom_tools_agent)
//!     .with("search", search_agent);
//!
//! let orchestrator = Orchestrator::new(classifier, registry);
//! orchestrator.validate()?;
//!
//! let mut events = orchestrator.dispatch(turn)?;
//! while let Some(event) = events.next().await { /* ... */ }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;

pub use classifier::{Classification, Classifier, RoutingLabel, Rule, classify};
pub use config::{CUSTOM_LABEL, RoutingConfig, RuleConfig, SEARCH_LABEL};
pub use error::{Result, RouterError};
pub use orchestrator::{Orchestrator, RelayStream, Route};
pub use registry::AgentRegistry;
