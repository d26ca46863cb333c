//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::source::{GenerationEvent, GenerationRequest, TokenSource, TokenStream};

/// A token source that replays a pre-scripted event sequence.
pub struct ScriptedSource {
    script: Mutex<Vec<Result<GenerationEvent, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<GenerationEvent, Error>>) -> Self {
        Self {
            script: Mutex::new(script),
            captured_requests: Mutex::new(Vec::new()),
        }
    }

    /// A script that streams the given fragments and then completes.
    pub fn fragments(fragments: &[&str]) -> Self {
        let mut script: Vec<Result<GenerationEvent, Error>> = fragments
            .iter()
            .map(|f| {
                Ok(GenerationEvent::Token {
                    text: (*f).to_string(),
                })
            })
            .collect();
        script.push(Ok(GenerationEvent::Done));
        Self::new(script)
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream, Error> {
        self.captured_requests.lock().unwrap().push(request);
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::pin(tokio_stream::iter(script)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use crate::message::Message;

    #[tokio::test]
    async fn test_fragments_script_ends_with_done() {
        let source = ScriptedSource::fragments(&["a", "b"]);
        let mut stream = source
            .generate(GenerationRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events.last().unwrap(), &GenerationEvent::Done);
        assert_eq!(source.request_count(), 1);
    }
}
