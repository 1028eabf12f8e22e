//! Gemini LLM Provider
//!
//! `LlmProvider` over the Generative Language REST API. When
//! `GenerationOptions::web_search` is set the request carries the
//! `google_search` tool, so answers are grounded by Google itself.
//!
//! ```text
//! Message(System)*   ──► systemInstruction.parts[]
//! Message(User|Tool) ──► contents[{role: "user"}]
//! Message(Assistant) ──► contents[{role: "model"}]
//! ```

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        ProviderInfo, StreamChunk, TokenUsage,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::transport::{check, lines};

const PROVIDER: &str = "Gemini";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,

    /// API root, without trailing slash
    pub base_url: String,

    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 120,
        }
    }

    /// Read `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("GEMINI_API_KEY or GOOGLE_API_KEY must be set".into()))?;

        Ok(Self::new(api_key))
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Serialize, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<RemoteModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u32>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        let reason = self.candidates.first()?.finish_reason.as_deref()?;
        Some(match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        })
    }

    fn usage(&self) -> Option<TokenUsage> {
        self.usage_metadata
            .as_ref()
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
    }
}

impl GeminiProvider {
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Consecutive turns with the same role are merged into one content
    fn build_request(messages: &[Message], options: &GenerationOptions) -> GenerateRequest {
        let mut system = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::System => {
                    system.push(TextPart {
                        text: message.content.clone(),
                    });
                    continue;
                }
                Role::User | Role::Tool => "user",
                Role::Assistant => "model",
            };

            let part = TextPart {
                text: message.content.clone(),
            };
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
                _ => contents.push(Content {
                    role: Some(role.into()),
                    parts: vec![part],
                }),
            }
        }

        let tools = if options.web_search {
            vec![serde_json::json!({ "google_search": {} })]
        } else {
            Vec::new()
        };

        GenerateRequest {
            system_instruction: (!system.is_empty()).then_some(Content {
                role: None,
                parts: system,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop_sequences.clone(),
            },
            tools,
        }
    }

    async fn post(&self, path: String, request: &GenerateRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(&path))
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        check(PROVIDER, response).await
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: PROVIDER.into(),
            models,
            supports_streaming: true,
            supports_web_search: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = Self::build_request(messages, options);
        let response: GenerateResponse = self
            .post(format!("/models/{}:generateContent", options.model), &request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        if response.candidates.is_empty() {
            return Err(AgentError::Provider("Gemini returned no candidates".into()));
        }

        Ok(Completion {
            content: response.text(),
            model: options.model.clone(),
            usage: response.usage(),
            finish_reason: response.finish_reason(),
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = Self::build_request(messages, options);
        let response = self
            .post(
                format!("/models/{}:streamGenerateContent?alt=sse", options.model),
                &request,
            )
            .await?;

        let chunks = lines(response.bytes_stream()).filter_map(|line| async move {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let data = line.strip_prefix("data:")?.trim();

            let event: GenerateResponse = match serde_json::from_str(data) {
                Ok(event) => event,
                Err(e) => return Some(Err(AgentError::Parse(e.to_string()))),
            };

            Some(Ok(StreamChunk {
                delta: event.text(),
                done: event.finish_reason().is_some(),
                usage: event.usage(),
            }))
        });

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("/models"))
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let list: ModelList = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(list
            .models
            .into_iter()
            .map(|m| {
                let id = m.name.trim_start_matches("models/").to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                    context_length: m.input_token_limit,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::from_config(GeminiConfig {
            base_url: server.uri(),
            ..GeminiConfig::new("test-key")
        })
        .unwrap()
    }

    fn flash() -> GenerationOptions {
        GenerationOptions {
            model: "gemini-2.0-flash".into(),
            temperature: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![
            Message::system("Answer any general query using the google_search tool."),
            Message::user("What's new?"),
            Message::assistant("Let me check."),
            Message::tool("result", None),
            Message::user("and?"),
        ];
        let options = GenerationOptions {
            web_search: true,
            ..flash()
        };

        let body = serde_json::to_value(GeminiProvider::build_request(&messages, &options)).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "Answer any general query using the google_search tool."
        );
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(body["tools"], json!([{"google_search": {}}]));
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_no_tools_without_web_search() {
        let body =
            serde_json::to_value(GeminiProvider::build_request(&[Message::user("hi")], &flash())).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn test_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({"tools": [{"google_search": {}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "It is "}, {"text": "sunny."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
            })))
            .mount(&server)
            .await;

        let options = GenerationOptions {
            web_search: true,
            ..flash()
        };
        let completion = provider(&server)
            .complete(&[Message::user("weather?")], &options)
            .await
            .unwrap();

        assert_eq!(completion.content, "It is sunny.");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage, Some(TokenUsage::new(12, 4)));
    }

    #[tokio::test]
    async fn test_complete_stream_sse() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hi \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"there\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let chunks: Vec<_> = provider(&server)
            .complete_stream(&[Message::user("hi")], &flash())
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta, "Hi ");
        assert!(!chunks[0].done);
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn test_bad_key_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&[Message::user("hi")], &flash())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_models_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{
                    "name": "models/gemini-2.0-flash",
                    "displayName": "Gemini 2.0 Flash",
                    "inputTokenLimit": 1_048_576
                }]
            })))
            .mount(&server)
            .await;

        let models = provider(&server).list_models().await.unwrap();
        assert_eq!(models[0].id, "gemini-2.0-flash");
        assert_eq!(models[0].name, "Gemini 2.0 Flash");
        assert_eq!(models[0].context_length, Some(1_048_576));
    }
}
