//! Generation dispatcher — "generate or fall back"
//!
//! The dispatcher is the only component that talks to the generation
//! backend. Backend failures never leave this module: every call produces
//! either genuine model output or one of two deterministic canned
//! responses, with `was_generated` telling the caller which it got.

use crate::backend::{BackendError, TextBackend};
use aether_core::GenParams;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Fixed answer for identity questions when the backend is unavailable.
pub const IDENTITY_FALLBACK: &str = "I am AETHER (Advanced Engine for Thought, Heuristic Emotion and Reasoning), \
built by AlgoRythm Tech. I was created to make AI personal and adaptive - AI that \
adapts to you, not the other way around. I'm currently running in lightweight mode, \
but I'm still here to help!";

/// Fixed generic answer when the backend is unavailable.
pub const GENERIC_FALLBACK: &str = "I'm AETHER, your AI assistant created by AlgoRythm Tech. I'm currently in \
lightweight mode, but I'm still here to help! I combine reasoning, emotion, and \
adaptability to provide you with personalized assistance. How can I help you today?";

/// Outcome of a dispatch: the text plus whether the backend produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct GenOutcome {
    pub text: String,
    pub was_generated: bool,
}

/// One item of a streamed turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseChunk {
    /// A word-level fragment. `is_final` marks the last token of the turn.
    Token { text: String, is_final: bool },
    /// Aggregate metadata, always the last item of a completed turn.
    Final { was_generated: bool },
}

pub type ResponseStream = Pin<Box<dyn Stream<Item = ResponseChunk> + Send>>;

pub struct Dispatcher {
    backend: Arc<dyn TextBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Batch generation. Infallible: backend errors are absorbed into the
    /// content-aware fallback.
    pub async fn generate(&self, input: &str, prompt: &str, params: &GenParams) -> GenOutcome {
        match self.backend.batch_generate(prompt, params).await {
            Ok(text) => GenOutcome {
                text,
                was_generated: true,
            },
            Err(e) => {
                warn!(backend = self.backend.name(), "generation failed, falling back: {}", e);
                GenOutcome {
                    text: fallback_for(input).to_string(),
                    was_generated: false,
                }
            }
        }
    }

    /// Streaming generation: word-level `Token` chunks in order, then one
    /// `Final` chunk. The fallback path streams the same way. A cancelled
    /// turn ends the stream without a `Final` chunk.
    ///
    /// Lazy: the backend is not contacted until the stream is polled.
    pub fn generate_stream(
        &self,
        input: &str,
        prompt: &str,
        params: &GenParams,
        cancel: CancellationToken,
    ) -> ResponseStream {
        let backend = self.backend.clone();
        let input = input.to_string();
        let prompt = prompt.to_string();
        let params = params.clone();

        let stream = async_stream::stream! {
            let Some(outcome) =
                collect_stream(&backend, &input, &prompt, &params, &cancel).await
            else {
                // Cancelled mid-generation; nothing more to deliver.
                return;
            };

            let words: Vec<&str> = outcome.text.split_whitespace().collect();
            let last = words.len().saturating_sub(1);
            for (i, word) in words.iter().enumerate() {
                if cancel.is_cancelled() {
                    return;
                }
                yield ResponseChunk::Token {
                    text: format!("{} ", word),
                    is_final: i == last,
                };
            }

            if cancel.is_cancelled() {
                return;
            }
            yield ResponseChunk::Final {
                was_generated: outcome.was_generated,
            };
        };
        Box::pin(stream)
    }

}

/// Drain the backend stream into a full response, falling back on any
/// failure. `None` means the turn was cancelled.
async fn collect_stream(
    backend: &Arc<dyn TextBackend>,
    input: &str,
    prompt: &str,
    params: &GenParams,
    cancel: &CancellationToken,
) -> Option<GenOutcome> {
    let mut stream = match backend
        .stream_generate(prompt, params, Some(cancel.clone()))
        .await
    {
        Ok(s) => s,
        Err(BackendError::Cancelled) => return None,
        Err(e) => {
            warn!(backend = backend.name(), "stream failed, falling back: {}", e);
            return Some(GenOutcome {
                text: fallback_for(input).to_string(),
                was_generated: false,
            });
        }
    };

    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(f) => text.push_str(&f),
            Err(BackendError::Cancelled) => return None,
            Err(e) => {
                warn!(backend = backend.name(), "stream broke mid-turn, falling back: {}", e);
                return Some(GenOutcome {
                    text: fallback_for(input).to_string(),
                    was_generated: false,
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return None;
    }
    Some(GenOutcome {
        text: text.trim().to_string(),
        was_generated: true,
    })
}

/// Pick the canned response for an input the backend could not answer.
pub fn fallback_for(input: &str) -> &'static str {
    if is_identity_question(input) {
        IDENTITY_FALLBACK
    } else {
        GENERIC_FALLBACK
    }
}

fn is_identity_question(input: &str) -> bool {
    let lower = input.to_lowercase();
    ["who built", "who created", "who made"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_pattern_matches() {
        assert!(is_identity_question("Who built you?"));
        assert!(is_identity_question("tell me who created you"));
        assert!(is_identity_question("WHO MADE this thing"));
        assert!(!is_identity_question("what is the weather"));
    }

    #[test]
    fn fallback_selection() {
        assert_eq!(fallback_for("Who built you?"), IDENTITY_FALLBACK);
        assert_eq!(fallback_for("hello"), GENERIC_FALLBACK);
    }
}
