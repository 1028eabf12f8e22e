//! Ollama LLM Provider
//!
//! `LlmProvider` for local Ollama inference, on top of `ollama-rs`.

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
use ollama_rs::{
    Ollama,
    generation::{
        chat::{
            ChatMessage, ChatMessageFinalResponseData, ChatMessageResponse, MessageRole,
            request::ChatMessageRequest,
        },
    },
    models::ModelOptions as OllamaOptions,
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST` and `OLLAMA_PORT`
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);

        Self { host, port }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
}

impl OllamaProvider {
    /// Rejects a host that is not a URL instead of failing on first request
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        reqwest::Url::parse(&config.host).map_err(|e| {
            AgentError::Config(format!("Invalid OLLAMA_HOST '{}': {}", config.host, e))
        })?;

        Ok(Self {
            client: Ollama::new(&config.host, config.port),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Tool output goes back to the model as user context
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User | Role::Tool => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    fn build_request(messages: &[Message], options: &GenerationOptions) -> ChatMessageRequest {
        if options.web_search {
            tracing::debug!("Ollama has no search grounding; ignoring web_search");
        }

        let mut ollama_options = OllamaOptions::default()
            .temperature(options.temperature)
            .top_p(options.top_p)
            .num_predict(options.max_tokens as i32);
        if !options.stop_sequences.is_empty() {
            ollama_options = ollama_options.stop(options.stop_sequences.clone());
        }

        ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(ollama_options)
    }

    fn usage(data: &ChatMessageFinalResponseData) -> TokenUsage {
        TokenUsage::new(
            data.prompt_eval_count as u32,
            data.eval_count as u32,
        )
    }

    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            usage: response.final_data.as_ref().map(Self::usage),
            content: response.message.content,
            model: model.to_string(),
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Ollama".into(),
            models,
            supports_streaming: true,
            supports_web_search: false,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = Self::build_request(messages, options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = Self::build_request(messages, options);

        let stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        // The final chunk is the one carrying timing and token counts
        let mapped = stream.map(|result| {
            result
                .map(|chunk| StreamChunk {
                    done: chunk.final_data.is_some(),
                    usage: chunk.final_data.as_ref().map(Self::usage),
                    delta: chunk.message.content,
                })
                .map_err(|e| AgentError::Provider(format!("Ollama stream failed: {:?}", e)))
        });

        Ok(Box::pin(mapped))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OllamaProvider {
        OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1".into(),
            port: server.address().port(),
        })
        .unwrap()
    }

    fn reply(content: &str) -> serde_json::Value {
        json!({
            "model": "llama3.2",
            "created_at": "2026-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": content},
            "done": true,
            "done_reason": "stop",
            "total_duration": 1000,
            "load_duration": 10,
            "prompt_eval_count": 10,
            "prompt_eval_duration": 100,
            "eval_count": 3,
            "eval_duration": 200
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let result = OllamaProvider::from_config(OllamaConfig {
            host: "not a url".into(),
            port: 11434,
        });
        assert!(matches!(result, Err(AgentError::Config(ref m)) if m.contains("OLLAMA_HOST")));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::tool("6", None),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[2].content, "6");
    }

    #[tokio::test]
    async fn test_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "llama3.2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hello there")))
            .mount(&server)
            .await;

        let completion = provider(&server)
            .complete(&[Message::user("hi")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.usage, Some(TokenUsage::new(10, 3)));
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_complete_stream_ends_on_final_chunk() {
        let server = MockServer::start().await;
        let body = format!("{}\n", reply("Hello"));
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let chunks: Vec<_> = provider(&server)
            .complete_stream(&[Message::user("hi")], &GenerationOptions::default())
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        let text: String = chunks.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(text, "Hello");
        assert!(chunks.last().unwrap().done);
    }

    #[tokio::test]
    async fn test_model_not_found_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&[Message::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_list_models_and_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {"name": "llama3.2:latest", "modified_at": "2026-01-01T00:00:00Z", "size": 2019393189u64},
                    {"name": "qwen2.5:7b", "modified_at": "2026-01-01T00:00:00Z", "size": 4683087332u64}
                ]
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let models = provider.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "llama3.2:latest");
        assert!(provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let provider = OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1".into(),
            port: 1,
        })
        .unwrap();
        assert!(!provider.health_check().await.unwrap());
    }
}
