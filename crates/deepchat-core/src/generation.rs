//! Per-generation driver: owns the hydrator for one in-flight response and
//! bridges the token source to the renderer.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Error;
use crate::hydrator::MessageHydrator;
use crate::source::{GenerationEvent, TokenStream};

/// Whole-value snapshot of both output channels, published after every
/// fragment. The renderer replaces its view with these values; it never
/// receives diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydratedUpdate {
    pub thinking: String,
    pub response: String,
}

/// Terminal state of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The source signalled completion. `response` is the value to archive
    /// as the assistant's message; `thinking` is display-only.
    Complete { response: String, thinking: String },
    /// The source reported a failure. Partial content has been discarded.
    Failed { message: String },
    /// The stream ended before completion (user cancelled). Partial content
    /// has been discarded.
    Interrupted,
}

/// Drives exactly one generation.
///
/// Each generation owns its hydrator for its entire lifetime; a new
/// generation gets a new `Generation`. Fragments are consumed in production
/// order from the stream, appended to the hydrator, and every append
/// publishes an update to the renderer channel.
#[derive(Default)]
pub struct Generation {
    hydrator: MessageHydrator,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the stream to its terminal state.
    ///
    /// Update sends are best-effort: a renderer that has gone away does not
    /// abort the generation, since the final response is still archived.
    pub async fn run(
        mut self,
        mut stream: TokenStream,
        updates: mpsc::Sender<HydratedUpdate>,
    ) -> Result<GenerationOutcome, Error> {
        while let Some(event) = stream.next().await {
            match event {
                Ok(GenerationEvent::Token { text }) => {
                    self.hydrator.append(&text);
                    let _ = updates
                        .send(HydratedUpdate {
                            thinking: self.hydrator.thinking().to_string(),
                            response: self.hydrator.response().to_string(),
                        })
                        .await;
                }
                Ok(GenerationEvent::Done) => {
                    debug!(
                        raw_len = self.hydrator.raw_buffer().len(),
                        thinking_len = self.hydrator.thinking().len(),
                        response_len = self.hydrator.response().len(),
                        "generation complete"
                    );
                    return Ok(GenerationOutcome::Complete {
                        response: self.hydrator.response().to_string(),
                        thinking: self.hydrator.thinking().to_string(),
                    });
                }
                Ok(GenerationEvent::Failed { message }) => {
                    debug!(error = %message, "generation failed upstream");
                    self.discard(&updates).await;
                    return Ok(GenerationOutcome::Failed { message });
                }
                Err(e) => {
                    debug!(error = %e, "token stream error");
                    self.discard(&updates).await;
                    return Err(e);
                }
            }
        }

        // Stream ended without a terminal event: interrupted mid-generation.
        debug!(
            raw_len = self.hydrator.raw_buffer().len(),
            "generation interrupted"
        );
        self.discard(&updates).await;
        Ok(GenerationOutcome::Interrupted)
    }

    /// Clear partial state and tell the renderer to do the same, rather than
    /// leaving the two channels inconsistent.
    async fn discard(&mut self, updates: &mpsc::Sender<HydratedUpdate>) {
        self.hydrator.reset();
        let _ = updates.send(HydratedUpdate::default()).await;
    }
}
