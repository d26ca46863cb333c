//! Token source backed by an OpenAI-compatible streaming endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, trace};

use deepchat_core::{Error, GenerationEvent, GenerationRequest, Role, TokenSource, TokenStream};

/// Streams completions from a local inference server (llama.cpp, ollama,
/// vllm) speaking the OpenAI chat-completions protocol. Reasoning models
/// served this way emit their `<think>` sentinels inline in the content
/// deltas, which is exactly what the hydrator consumes.
pub struct SseTokenSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: Option<String>,
}

impl SseTokenSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: None,
            default_model: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn build_payload(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone().or_else(|| self.default_model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        }
    }
}

#[async_trait]
impl TokenSource for SseTokenSource {
    fn name(&self) -> &str {
        "sse"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream, Error> {
        let payload = self.build_payload(&request);

        debug!(
            model = ?payload.model,
            message_count = payload.messages.len(),
            "chat completions stream request"
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let es = EventSource::new(builder).map_err(|e| Error::network(e.to_string()))?;
        let cancel = request.cancel.clone();

        let (tx, rx) = mpsc::channel::<Result<GenerationEvent, Error>>(100);

        tokio::spawn(async move {
            let mut es = es;
            loop {
                let event = tokio::select! {
                    // Cancellation ends the stream without a Done event; the
                    // driver reports that as an interruption.
                    _ = cancel.cancelled() => {
                        debug!("generation cancelled, closing event source");
                        es.close();
                        return;
                    }
                    event = es.next() => event,
                };

                match event {
                    None => return,
                    Some(Ok(Event::Open)) => {
                        debug!("SSE connection opened");
                    }
                    Some(Ok(Event::Message(msg))) => {
                        trace!(data = %msg.data, "SSE event");

                        if msg.data == "[DONE]" {
                            let _ = tx.send(Ok(GenerationEvent::Done)).await;
                            es.close();
                            return;
                        }

                        match serde_json::from_str::<StreamResponse>(&msg.data) {
                            Ok(response) => {
                                for choice in response.choices {
                                    if let Some(text) = choice.delta.content {
                                        if !text.is_empty() {
                                            let _ = tx
                                                .send(Ok(GenerationEvent::Token { text }))
                                                .await;
                                        }
                                    }
                                    if choice.finish_reason.is_some() {
                                        let _ = tx.send(Ok(GenerationEvent::Done)).await;
                                        es.close();
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                error!(error = %e, data = %msg.data, "failed to parse SSE message");
                            }
                        }
                    }
                    Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                        return;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "SSE transport error");
                        let _ = tx
                            .send(Ok(GenerationEvent::Failed {
                                message: e.to_string(),
                            }))
                            .await;
                        es.close();
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepchat_core::Message;

    #[test]
    fn test_payload_shape() {
        let source = SseTokenSource::new("http://localhost:8080/v1")
            .with_default_model("deepseek-r1-distill-qwen-1.5b");
        let request = GenerationRequest::new(vec![
            Message::user("hello"),
            Message::assistant("hi there"),
        ])
        .with_max_tokens(256);

        let payload = source.build_payload(&request);
        assert_eq!(
            payload.model.as_deref(),
            Some("deepseek-r1-distill-qwen-1.5b")
        );
        assert!(payload.stream);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi there");
        assert_eq!(json["max_tokens"], 256);
        // Unset knobs are omitted entirely.
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_request_model_overrides_default() {
        let source = SseTokenSource::new("http://localhost:8080/v1")
            .with_default_model("default-model");
        let request =
            GenerationRequest::new(vec![Message::user("q")]).with_model("override-model");
        let payload = source.build_payload(&request);
        assert_eq!(payload.model.as_deref(), Some("override-model"));
    }

    #[test]
    fn test_parse_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"<think>hm"},"finish_reason":null}]}"#;
        let response: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            response.choices[0].delta.content.as_deref(),
            Some("<think>hm")
        );
        assert!(response.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_parse_finish_reason() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let response: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(response.choices[0].delta.content.is_none());
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
