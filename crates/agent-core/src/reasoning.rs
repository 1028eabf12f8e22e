//! Reasoning Loop
//!
//! ReAct (Reason + Act) agent exposed as an [`AgentCapability`]. Each run is a
//! small state machine driven by the consumer polling its event stream:
//!
//! ```text
//! Start ──▶ Request ──▶ Streaming ──┬──▶ (tool call) ──▶ Request
//!                                   └──▶ (answer)    ──▶ Done
//! ```
//!
//! Provider deltas surface as `Partial` events, tool round-trips as
//! `ToolCall`/`ToolResult`, and the answer as a single `Final` event.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;

use crate::capability::{AgentCapability, EventStream, ResponseEvent, Turn};
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{CompletionStream, GenerationOptions, LlmProvider};
use crate::session::{SessionId, SessionStore};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Agent name, used as event author
    pub name: String,

    pub description: String,

    /// Instruction placed in front of every conversation
    pub system_prompt: String,

    /// Maximum model calls per turn before giving up
    pub max_iterations: usize,

    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to the system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "assistant".into(),
            description: "A helpful assistant.".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// A tool-using conversational agent
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    sessions: Option<Arc<dyn SessionStore>>,
    config: Arc<AgentConfig>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            sessions: None,
            config: Arc::new(config),
        }
    }

    /// Keep conversation history in `store`, keyed by the turn's session id
    pub fn with_sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run a turn to completion and return only the final reply
    pub async fn ask(&self, turn: Turn) -> Result<String> {
        let mut events = self.run(turn);
        let mut reply = None;

        while let Some(event) = events.next().await {
            if let ResponseEvent::Final { content, .. } = event? {
                reply = Some(content);
            }
        }

        reply.ok_or_else(|| AgentError::NoReply {
            agent: self.config.name.clone(),
        })
    }

    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(mut result) => {
                result.id = call.id.clone();
                result
            }
            Err(e) => ToolResult {
                name: call.name.clone(),
                id: call.id.clone(),
                success: false,
                output: format!("Error: {}", e),
                data: None,
            },
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

impl AgentCapability for Agent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn run(&self, turn: Turn) -> EventStream {
        let run = Run::new(self.clone(), turn);
        Box::pin(futures::stream::unfold(run, |mut run| async move {
            run.next_event().await.map(|event| (event, run))
        }))
    }
}

enum Phase {
    Start,
    Request,
    Streaming {
        stream: CompletionStream,
        buffer: String,
    },
    Done,
}

/// State of one turn being answered
struct Run {
    agent: Agent,
    turn: Turn,
    user_text: String,
    conversation: Conversation,
    iterations: usize,
    phase: Phase,
    pending: VecDeque<ResponseEvent>,
}

impl Run {
    fn new(agent: Agent, turn: Turn) -> Self {
        Self {
            agent,
            turn,
            user_text: String::new(),
            conversation: Conversation::new(),
            iterations: 0,
            phase: Phase::Start,
            pending: VecDeque::new(),
        }
    }

    fn author(&self) -> String {
        self.agent.config.name.clone()
    }

    /// Advance until there is an event to hand out. Errors end the run.
    async fn next_event(&mut self) -> Option<Result<ResponseEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Start => {
                    if let Err(e) = self.prepare() {
                        return Some(Err(e));
                    }
                    self.phase = Phase::Request;
                }
                Phase::Request => match self.request().await {
                    Ok(stream) => {
                        self.phase = Phase::Streaming {
                            stream,
                            buffer: String::new(),
                        };
                    }
                    Err(e) => return Some(Err(e)),
                },
                Phase::Streaming { mut stream, mut buffer } => match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&chunk.delta);
                        self.phase = Phase::Streaming { stream, buffer };
                        if !chunk.delta.is_empty() {
                            return Some(Ok(ResponseEvent::Partial {
                                author: self.author(),
                                delta: chunk.delta,
                            }));
                        }
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        if let Err(e) = self.complete_step(buffer).await {
                            return Some(Err(e));
                        }
                    }
                },
                Phase::Done => return None,
            }
        }
    }

    /// Assemble instructions, session history and the new user message
    fn prepare(&mut self) -> Result<()> {
        let extracted = self
            .turn
            .extract_text()
            .ok_or_else(|| AgentError::EmptyTurn {
                session: self.turn.session_id.clone(),
            })?;
        self.user_text = extracted.text;

        let mut conversation = Conversation::with_system_prompt(self.agent.build_system_prompt());
        if let Some(store) = &self.agent.sessions {
            let id = SessionId::from_string(self.turn.session_id.clone());
            if let Some(session) = store.load(&id)? {
                for message in session.conversation.history() {
                    conversation.push(message.clone());
                }
            }
        }
        conversation.push(Message::user(self.user_text.clone()));
        conversation.truncate_to_fit();

        self.conversation = conversation;
        Ok(())
    }

    async fn request(&mut self) -> Result<CompletionStream> {
        self.iterations += 1;
        if self.iterations > self.agent.config.max_iterations {
            return Err(AgentError::MaxIterations(self.agent.config.max_iterations));
        }

        self.agent
            .provider
            .complete_stream(self.conversation.messages(), &self.agent.config.generation)
            .await
    }

    /// The model finished one response: run a tool or finish the turn
    async fn complete_step(&mut self, content: String) -> Result<()> {
        self.conversation
            .push(Message::assistant(content.clone()).with_name(self.author()));

        if let Some(call) = parse_tool_call(&content) {
            tracing::debug!(agent = %self.agent.config.name, tool = %call.name, "Executing tool");

            let result = self.agent.execute_tool(&call).await;
            self.conversation
                .push(Message::tool(format_tool_result(&result), call.id.clone()));

            self.pending.push_back(ResponseEvent::ToolCall {
                author: self.author(),
                call,
            });
            self.pending.push_back(ResponseEvent::ToolResult {
                author: self.author(),
                result,
            });
            self.phase = Phase::Request;
            return Ok(());
        }

        self.persist(&content)?;
        self.pending.push_back(ResponseEvent::Final {
            author: self.author(),
            content,
        });
        self.phase = Phase::Done;
        Ok(())
    }

    fn persist(&self, reply: &str) -> Result<()> {
        let Some(store) = &self.agent.sessions else {
            return Ok(());
        };

        let id = SessionId::from_string(self.turn.session_id.clone());
        store.append_exchange(
            &id,
            &self.turn.user_id,
            Message::user(self.user_text.clone()),
            Message::assistant(reply).with_name(self.author()),
        )
    }
}

/// Parse a tool call from an LLM response
fn parse_tool_call(content: &str) -> Option<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";

    if let Some(start_idx) = content.find(TOOL_START) {
        let after_marker = &content[start_idx + TOOL_START.len()..];
        if let Some(end_idx) = after_marker.find(TOOL_END) {
            let json_str = after_marker[..end_idx].trim();
            if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
                return Some(with_call_id(call));
            }
        }
    }

    parse_inline_tool_call(content).map(with_call_id)
}

/// Raw JSON object with a "tool" key somewhere in the text
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}

fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    sessions: Option<Arc<dyn SessionStore>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            sessions: None,
            config: AgentConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.config.generation.web_search = enabled;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        let agent = Agent::new(provider, Arc::new(self.tools), self.config);
        Ok(match self.sessions {
            Some(store) => agent.with_sessions(store),
            None => agent,
        })
    }
}
