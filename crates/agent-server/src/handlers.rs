//! HTTP Handlers

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use agent_core::{Part, ResponseEvent, Turn, TurnPayload};
use agent_router::RouterError;

use crate::protocol::{self, FINISH_LINE};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of `POST /invoke`
///
/// `messages` selects the streaming chat mode, otherwise `query` is answered
/// with a single JSON document.
#[derive(Debug, Default, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,

    #[serde(default)]
    pub query: Option<String>,
}

/// One chat message from the web UI
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,

    /// A string, or a list of `{ "text": ... }` parts
    #[serde(default)]
    pub content: serde_json::Value,
}

impl ChatMessage {
    /// Nothing to answer: null, blank text or an empty part list
    fn is_blank(&self) -> bool {
        match &self.content {
            serde_json::Value::Null => true,
            serde_json::Value::String(text) => text.trim().is_empty(),
            serde_json::Value::Array(parts) => parts.is_empty(),
            _ => false,
        }
    }

    fn into_payload(self) -> TurnPayload {
        match self.content {
            serde_json::Value::String(text) => TurnPayload::Text(text),
            value @ serde_json::Value::Array(_) => match Vec::<Part>::deserialize(&value) {
                Ok(parts) => TurnPayload::Parts(parts),
                Err(_) => TurnPayload::Other(value),
            },
            other => TurnPayload::Other(other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider_connected: bool,
    pub labels: Vec<String>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider_connected,
        labels: state
            .orchestrator
            .registry()
            .labels()
            .into_iter()
            .map(ToString::to_string)
            .collect(),
    })
}

/// Models the configured provider offers
pub async fn list_models(State(state): State<AppState>) -> Response {
    match state.provider.list_models().await {
        Ok(models) => Json(models).into_response(),
        Err(e) => {
            tracing::warn!("Failed to list models: {}", e);
            error(StatusCode::BAD_GATEWAY, e.user_message())
        }
    }
}

/// `POST /invoke` in either of its two modes
pub async fn invoke(State(state): State<AppState>, Json(request): Json<InvokeRequest>) -> Response {
    match request.messages {
        Some(messages) => invoke_stream(&state, messages),
        None => invoke_query(&state, request.query).await,
    }
}

fn turn(state: &AppState, payload: TurnPayload) -> Turn {
    Turn::new(
        state.config.user_id.as_str(),
        state.config.session_id.as_str(),
        payload,
    )
}

fn invoke_stream(state: &AppState, messages: Vec<ChatMessage>) -> Response {
    let latest = messages
        .into_iter()
        .rev()
        .find(|m| m.role == "user")
        .filter(|m| !m.is_blank());

    let body = match latest {
        None => {
            tracing::warn!("Chat request without a user message");
            let lines = vec![protocol::text_part("No user message found in request")];
            data_stream(futures::stream::iter(lines).boxed())
        }
        Some(message) => {
            let turn = turn(state, message.into_payload());
            match state.orchestrator.dispatch(turn) {
                Ok(events) => data_stream(event_lines(events).boxed()),
                Err(e) => data_stream(futures::stream::iter(vec![failure_line(&e)]).boxed()),
            }
        }
    };

    (protocol::stream_headers(), body).into_response()
}

/// Text parts for the final reply; other events are not forwarded
fn event_lines(
    events: agent_router::RelayStream,
) -> impl Stream<Item = String> + Send + 'static {
    events.flat_map(|event| {
        let lines: Vec<String> = match event {
            Ok(ResponseEvent::Final { content, .. }) => protocol::word_parts(&content).collect(),
            Ok(_) => Vec::new(),
            Err(e) => vec![failure_line(&e)],
        };
        futures::stream::iter(lines)
    })
}

fn failure_line(e: &RouterError) -> String {
    tracing::error!("Agent invocation failed: {}", e);
    protocol::text_part(&format!(
        "Sorry, I encountered an error while processing your request: {}",
        e
    ))
}

/// Append the finish line and wrap as a response body
fn data_stream(lines: futures::stream::BoxStream<'static, String>) -> Body {
    let lines = lines
        .chain(futures::stream::once(async { FINISH_LINE.to_string() }))
        .map(Ok::<_, Infallible>);
    Body::from_stream(lines)
}

async fn invoke_query(state: &AppState, query: Option<String>) -> Response {
    let Some(query) = query.filter(|q| !q.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "No query provided");
    };

    match answer(state, turn(state, TurnPayload::Text(query))).await {
        Ok(response) => Json(QueryResponse { response }).into_response(),
        Err(e) => {
            tracing::error!("Agent invocation failed: {}", e);
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Agent invocation failed: {}", e),
            )
        }
    }
}

/// Dispatch and keep only the final reply
async fn answer(state: &AppState, turn: Turn) -> Result<String, RouterError> {
    let mut events = state.orchestrator.dispatch(turn)?;
    let mut reply = String::new();

    while let Some(event) = events.next().await {
        if let ResponseEvent::Final { content, .. } = event? {
            reply = content;
        }
    }

    Ok(reply)
}
