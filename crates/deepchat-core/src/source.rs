use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::message::Message;

/// Lifecycle events emitted by a token source during one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// One fragment of generated text. Size and boundaries are
    /// non-deterministic; a sentinel marker may span several fragments.
    Token { text: String },
    /// The generation finished normally.
    Done,
    /// The generation failed upstream.
    Failed { message: String },
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<GenerationEvent, Error>> + Send>>;

/// One request for a streamed generation.
///
/// The cancellation token is scoped to this generation; cancelling it makes
/// the stream end before `Done`, which the driver reports as an interruption.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub cancel: CancellationToken,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            max_tokens: None,
            temperature: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A producer of token fragments: the model worker, an HTTP endpoint, or a
/// scripted double in tests.
///
/// Fragments must be delivered in production order; the stream is consumed by
/// exactly one generation driver and is not shared.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new(vec![Message::user("hi")])
            .with_model("deepseek-r1")
            .with_max_tokens(8192)
            .with_temperature(0.2);

        assert_eq!(request.model.as_deref(), Some("deepseek-r1"));
        assert_eq!(request.max_tokens, Some(8192));
        assert_eq!(request.temperature, Some(0.2));
        assert!(!request.cancel.is_cancelled());
    }
}
