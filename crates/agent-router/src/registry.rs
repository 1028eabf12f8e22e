//! Agent Registry
//!
//! Label → capability map. Filled once at start-up, shared read-only after.

use std::collections::HashMap;
use std::sync::Arc;

use agent_core::AgentCapability;

use crate::classifier::RoutingLabel;
use crate::error::{Result, RouterError};

#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<RoutingLabel, Arc<dyn AgentCapability>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` under `label`, replacing any earlier entry
    pub fn register(&mut self, label: impl Into<RoutingLabel>, capability: Arc<dyn AgentCapability>) {
        let label = label.into();
        tracing::debug!(%label, agent = capability.name(), "Registering agent");

        if let Some(previous) = self.agents.insert(label.clone(), capability) {
            tracing::warn!(%label, replaced = previous.name(), "Label registered twice");
        }
    }

    /// Builder-style [`AgentRegistry::register`]
    pub fn with(mut self, label: impl Into<RoutingLabel>, capability: Arc<dyn AgentCapability>) -> Self {
        self.register(label, capability);
        self
    }

    /// Look up the agent for a label
    pub fn resolve(&self, label: &RoutingLabel) -> Result<Arc<dyn AgentCapability>> {
        self.agents
            .get(label)
            .cloned()
            .ok_or_else(|| RouterError::Configuration {
                label: label.clone(),
            })
    }

    /// Fail on the first of `labels` without an agent
    pub fn ensure_covers<'a>(&self, labels: impl IntoIterator<Item = &'a RoutingLabel>) -> Result<()> {
        for label in labels {
            self.resolve(label)?;
        }
        Ok(())
    }

    /// Registered labels, sorted
    pub fn labels(&self) -> Vec<&RoutingLabel> {
        let mut labels: Vec<_> = self.agents.keys().collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for label in self.labels() {
            if let Some(agent) = self.agents.get(label) {
                map.entry(&label.as_str(), &agent.name());
            }
        }
        map.finish()
    }
}
