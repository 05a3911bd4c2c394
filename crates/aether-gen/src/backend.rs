//! Text generation backend trait

use aether_core::GenParams;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Generation backend error types
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation timed out: {0}")]
    Timeout(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Stream of raw text fragments from the backend
pub type TextStream = Pin<Box<dyn Stream<Item = BackendResult<String>> + Send>>;

/// The single external capability the engine consumes: generate text given
/// a prompt and sampling parameters. Implemented by the model-serving
/// component, which is otherwise opaque to this crate.
#[async_trait::async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Generate the full completion in one call.
    async fn batch_generate(&self, prompt: &str, params: &GenParams) -> BackendResult<String>;

    /// Stream the completion as text fragments. If `cancel` is provided and
    /// triggered, the underlying connection is dropped and the stream yields
    /// `BackendError::Cancelled`.
    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenParams,
        cancel: Option<CancellationToken>,
    ) -> BackendResult<TextStream>;
}
