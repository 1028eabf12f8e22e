//! Dispatching Orchestrator
//!
//! Routes a turn to one agent and relays that agent's events back unchanged.
//!
//! ```text
//!  Turn ─▶ extract text ─▶ classify ─▶ resolve ─▶ agent.run(turn) ─▶ relay ─▶ caller
//!                                        │                            │
//!                                        ▼                            ▼
//!                               RouterError::Configuration   RouterError::UpstreamAgent
//! ```
//!
//! Each dispatch is independent; the orchestrator holds no per-call state.
//! The relay pulls one event at a time from the agent, so dropping the relay
//! drops the agent's stream and stops its work.

use std::pin::Pin;
use std::sync::Arc;

use agent_core::{AgentCapability, EventStream, ResponseEvent, TextSource, Turn};
use futures::{Stream, StreamExt};

use crate::classifier::{Classifier, RoutingLabel};
use crate::error::{Result, RouterError};
use crate::registry::AgentRegistry;

/// Events relayed from the selected agent
pub type RelayStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send>>;

/// The routing decision for one turn
#[derive(Clone)]
pub struct Route {
    pub label: RoutingLabel,

    /// Rule that fired, `None` when the default label was used
    pub matched_rule: Option<String>,

    /// Where the classified text came from, `None` if none could be derived
    pub text_source: Option<TextSource>,

    pub agent: Arc<dyn AgentCapability>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("label", &self.label)
            .field("matched_rule", &self.matched_rule)
            .field("text_source", &self.text_source)
            .field("agent", &self.agent.name())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Orchestrator {
    classifier: Arc<Classifier>,
    registry: Arc<AgentRegistry>,
}

impl Orchestrator {
    pub fn new(classifier: Classifier, registry: AgentRegistry) -> Self {
        Self {
            classifier: Arc::new(classifier),
            registry: Arc::new(registry),
        }
    }

    /// Check that every label the classifier can emit has an agent
    pub fn validate(&self) -> Result<()> {
        self.registry.ensure_covers(&self.classifier.labels())
    }

    /// Decide which agent handles `turn`
    pub fn route(&self, turn: &Turn) -> Result<Route> {
        let (text, text_source) = match extract(turn) {
            Ok(extracted) => (extracted.text, Some(extracted.source)),
            Err(e) => {
                tracing::warn!(error = %e, "Classifying empty text");
                (String::new(), None)
            }
        };

        let classification = self.classifier.explain(&text);
        let agent = self.registry.resolve(&classification.label)?;

        tracing::debug!(
            label = %classification.label,
            rule = classification.matched_rule.as_deref().unwrap_or("default"),
            source = text_source.map_or_else(|| "none".to_string(), |s| s.to_string()),
            agent = agent.name(),
            "Routed turn"
        );

        Ok(Route {
            label: classification.label,
            matched_rule: classification.matched_rule,
            text_source,
            agent,
        })
    }

    /// Route `turn` and relay the selected agent's events
    ///
    /// Configuration errors surface here, before any event. Agent failures
    /// arrive as the last item of the stream, after whatever the agent
    /// produced first.
    pub fn dispatch(&self, turn: Turn) -> Result<RelayStream> {
        let route = self.route(&turn)?;
        let agent_name = route.agent.name().to_string();
        let events = route.agent.run(turn);

        Ok(relay(route.label, agent_name, events))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}

fn extract(turn: &Turn) -> Result<agent_core::ExtractedText> {
    turn.extract_text().ok_or_else(|| {
        RouterError::MalformedTurn(format!(
            "no text in turn for session '{}'",
            turn.session_id
        ))
    })
}

struct Relay {
    label: RoutingLabel,
    agent: String,
    inner: Option<EventStream>,
    relayed: usize,
}

/// Forward events one by one; an agent error ends the relay
fn relay(label: RoutingLabel, agent: String, inner: EventStream) -> RelayStream {
    let state = Relay {
        label,
        agent,
        inner: Some(inner),
        relayed: 0,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        let inner = state.inner.as_mut()?;

        match inner.next().await {
            Some(Ok(event)) => {
                state.relayed += 1;
                if event.is_final() {
                    tracing::debug!(label = %state.label, agent = %state.agent, "Final event relayed");
                }
                Some((Ok(event), state))
            }
            Some(Err(source)) => {
                tracing::error!(
                    label = %state.label,
                    agent = %state.agent,
                    relayed = state.relayed,
                    error = %source,
                    "Agent failed mid-stream"
                );
                state.inner = None;
                let err = RouterError::UpstreamAgent {
                    label: state.label.clone(),
                    agent: state.agent.clone(),
                    source,
                };
                Some((Err(err), state))
            }
            None => {
                tracing::debug!(label = %state.label, relayed = state.relayed, "Relay finished");
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agent_core::{AgentError, Part, TurnPayload};

    use crate::classifier::Rule;

    /// Emits fixed events, optionally followed by an error
    struct Scripted {
        name: &'static str,
        events: Vec<ResponseEvent>,
        fail_with: Option<&'static str>,
        seen: Mutex<Vec<Turn>>,
    }

    impl Scripted {
        fn new(name: &'static str, events: Vec<ResponseEvent>) -> Arc<Self> {
            Arc::new(Self {
                name,
                events,
                fail_with: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str, events: Vec<ResponseEvent>, error: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                events,
                fail_with: Some(error),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl AgentCapability for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "scripted"
        }

        fn run(&self, turn: Turn) -> EventStream {
            self.seen.lock().unwrap().push(turn);
            let mut items: Vec<agent_core::Result<ResponseEvent>> =
                self.events.iter().cloned().map(Ok).collect();
            if let Some(message) = self.fail_with {
                items.push(Err(AgentError::Provider(message.into())));
                items.push(Ok(partial(self.name, "after error")));
            }
            Box::pin(futures::stream::iter(items))
        }
    }

    /// Never ends; counts how often it is polled for an event
    struct Endless {
        pulls: Arc<AtomicUsize>,
    }

    impl AgentCapability for Endless {
        fn name(&self) -> &str {
            "endless"
        }

        fn description(&self) -> &str {
            "endless"
        }

        fn run(&self, _turn: Turn) -> EventStream {
            let pulls = self.pulls.clone();
            Box::pin(futures::stream::repeat_with(move || {
                pulls.fetch_add(1, Ordering::SeqCst);
                Ok(partial("endless", "tick"))
            }))
        }
    }

    fn partial(author: &str, delta: &str) -> ResponseEvent {
        ResponseEvent::Partial {
            author: author.into(),
            delta: delta.into(),
        }
    }

    fn final_event(author: &str, content: &str) -> ResponseEvent {
        ResponseEvent::Final {
            author: author.into(),
            content: content.into(),
        }
    }

    fn classifier() -> Classifier {
        Classifier::new("search").with_rule(Rule::keywords("custom", ["horse", "dice"]))
    }

    fn turn(text: &str) -> Turn {
        Turn::user_message("user", "sess", text)
    }

    async fn drain(stream: RelayStream) -> Vec<Result<ResponseEvent>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_horse_goes_to_tool_agent_unchanged() {
        let tool_events = vec![
            partial("tools", "Horses "),
            partial("tools", "cannot sleep."),
            final_event("tools", "Horses cannot sleep."),
        ];
        let tools = Scripted::new("tools", tool_events.clone());
        let search = Scripted::new("search", vec![final_event("search", "S")]);
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new()
                .with("custom", tools.clone())
                .with("search", search.clone()),
        );

        let sent = turn("Tell me about a horse");
        let events: Vec<_> = drain(orchestrator.dispatch(sent.clone()).unwrap())
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(events, tool_events);
        assert_eq!(*tools.seen.lock().unwrap(), vec![sent]);
        assert!(search.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_text_goes_to_search() {
        let tools = Scripted::new("tools", vec![final_event("tools", "C")]);
        let search = Scripted::new("search", vec![final_event("search", "Paris")]);
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new().with("custom", tools).with("search", search),
        );

        let route = orchestrator.route(&turn("What is the capital of France?")).unwrap();
        assert_eq!(route.label.as_str(), "search");
        assert_eq!(route.matched_rule, None);
        assert_eq!(route.text_source, Some(TextSource::FirstPart));

        let dice = orchestrator.route(&turn("Please roll a DICE")).unwrap();
        assert_eq!(dice.label.as_str(), "custom");
        assert_eq!(dice.agent.name(), "tools");

        let empty = orchestrator.route(&turn("")).unwrap();
        assert_eq!(empty.label.as_str(), "search");
    }

    #[tokio::test]
    async fn test_text_field_and_stringified_turns_are_classified() {
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new()
                .with("custom", Scripted::new("tools", vec![]))
                .with("search", Scripted::new("search", vec![])),
        );

        let text = Turn::new("u", "s", TurnPayload::Text("HORSE facts".into()));
        let route = orchestrator.route(&text).unwrap();
        assert_eq!(route.label.as_str(), "custom");
        assert_eq!(route.text_source, Some(TextSource::TextField));

        let other = Turn::new("u", "s", TurnPayload::Other(serde_json::json!({"want": "dice"})));
        let route = orchestrator.route(&other).unwrap();
        assert_eq!(route.label.as_str(), "custom");
        assert_eq!(route.text_source, Some(TextSource::Stringified));

        let textless = Turn::new("u", "s", TurnPayload::Parts(vec![Part::default()]));
        assert_eq!(orchestrator.route(&textless).unwrap().label.as_str(), "search");
    }

    #[tokio::test]
    async fn test_missing_agent_is_configuration_error() {
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new().with("custom", Scripted::new("tools", vec![])),
        );

        assert!(orchestrator.validate().is_err());

        let err = orchestrator.dispatch(turn("weather tomorrow?")).err().unwrap();
        assert!(matches!(err, RouterError::Configuration { ref label } if label.as_str() == "search"));

        // matching input still routes
        assert!(orchestrator.dispatch(turn("dice")).is_ok());
    }

    #[tokio::test]
    async fn test_partial_results_then_error() {
        let events = vec![partial("search", "one"), partial("search", "two")];
        let search = Scripted::failing("search", events.clone(), "quota exceeded");
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new()
                .with("custom", Scripted::new("tools", vec![]))
                .with("search", search),
        );

        let relayed = drain(orchestrator.dispatch(turn("news")).unwrap()).await;

        assert_eq!(relayed.len(), 3);
        assert_eq!(relayed[0].as_ref().unwrap(), &events[0]);
        assert_eq!(relayed[1].as_ref().unwrap(), &events[1]);
        match &relayed[2] {
            Err(RouterError::UpstreamAgent { label, agent, source }) => {
                assert_eq!(label.as_str(), "search");
                assert_eq!(agent, "search");
                assert!(source.to_string().contains("quota exceeded"));
            }
            other => panic!("expected upstream error, got {:?}", other.as_ref().map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_dropping_relay_stops_pulling() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new()
                .with("custom", Scripted::new("tools", vec![]))
                .with("search", Arc::new(Endless { pulls: pulls.clone() })),
        );

        let relay = orchestrator.dispatch(turn("anything")).unwrap();
        let taken: Vec<_> = relay.take(3).collect().await;

        assert_eq!(taken.len(), 3);
        assert_eq!(pulls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_every_classifiable_label_resolves() {
        let orchestrator = Orchestrator::new(
            classifier(),
            AgentRegistry::new()
                .with("custom", Scripted::new("tools", vec![]))
                .with("search", Scripted::new("search", vec![])),
        );
        orchestrator.validate().unwrap();

        for text in ["", "horse", "DICE!", "capital of France", "h o r s e", "🐎"] {
            assert!(orchestrator.route(&turn(text)).is_ok(), "failed for {:?}", text);
        }
    }
}
