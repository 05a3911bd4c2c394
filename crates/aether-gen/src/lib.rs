//! AETHER Gen - Generation backend adapters and the fallback dispatcher

pub mod backend;
pub mod dispatcher;
pub mod http;

pub use backend::{BackendError, BackendResult, TextBackend, TextStream};
pub use dispatcher::{
    Dispatcher, GenOutcome, ResponseChunk, ResponseStream, GENERIC_FALLBACK, IDENTITY_FALLBACK,
};
pub use http::HttpBackend;
pub use tokio_util::sync::CancellationToken;
