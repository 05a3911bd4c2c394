//! HTTP generation backend with SSE streaming
//!
//! Talks to an OpenAI-style completion server (llama.cpp, vLLM, TGI, ...).
//! The engine never sees this type directly; it goes through `TextBackend`.

use crate::backend::{BackendError, BackendResult, TextBackend, TextStream};
use aether_core::GenParams;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/completions", self.base_url.trim_end_matches('/'))
    }

    fn body(&self, prompt: &str, params: &GenParams, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens: params.max_new_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            repetition_penalty: params.repetition_penalty,
            stream,
        }
    }

    fn map_request_error(e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else if e.is_connect() {
            BackendError::Unavailable(e.to_string())
        } else {
            BackendError::Network(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        error!("backend error {}: {}", status, error_text);
        match status.as_u16() {
            502 | 503 | 529 => Err(BackendError::Unavailable(format!(
                "{}: {}",
                status, error_text
            ))),
            504 | 408 => Err(BackendError::Timeout(format!("{}: {}", status, error_text))),
            _ => Err(BackendError::InvalidResponse(format!(
                "{}: {}",
                status, error_text
            ))),
        }
    }
}

#[async_trait::async_trait]
impl TextBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn batch_generate(&self, prompt: &str, params: &GenParams) -> BackendResult<String> {
        debug!("batch request: model={}", self.model);

        let response = self
            .client
            .post(self.completions_url())
            .json(&self.body(prompt, params, false))
            .send()
            .await
            .map_err(Self::map_request_error)?;
        let response = Self::check_status(response).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| BackendError::InvalidResponse("empty choices".to_string()))
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenParams,
        cancel: Option<CancellationToken>,
    ) -> BackendResult<TextStream> {
        debug!("stream request: model={}", self.model);

        let response = self
            .client
            .post(self.completions_url())
            .json(&self.body(prompt, params, true))
            .send()
            .await
            .map_err(Self::map_request_error)?;
        let response = Self::check_status(response).await?;

        let stream = parse_sse_stream(response.bytes_stream(), cancel);
        Ok(Box::pin(stream))
    }
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: Option<CancellationToken>,
) -> impl futures::Stream<Item = BackendResult<String>> + Send {
    async_stream::stream! {
        let cancel = cancel.unwrap_or_default();
        let mut buffer = String::new();

        tokio::pin!(bytes_stream);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    yield Err(BackendError::Cancelled);
                    break;
                }
                chunk = bytes_stream.next() => match chunk {
                    Some(Ok(c)) => c,
                    Some(Err(e)) => {
                        yield Err(BackendError::Stream(e.to_string()));
                        continue;
                    }
                    None => break,
                },
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(event_end) = buffer.find("\n\n") {
                let event_str = buffer[..event_end].to_string();
                buffer = buffer[event_end + 2..].to_string();

                for line in event_str.lines() {
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<CompletionChunk>(data) {
                        Ok(chunk) => {
                            if let Some(choice) = chunk.choices.into_iter().next() {
                                if !choice.text.is_empty() {
                                    yield Ok(choice.text);
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(BackendError::Stream(format!("bad sse frame: {}", e)));
                        }
                    }
                }
            }
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repetition_penalty: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct CompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    text: String,
}
