//! Error types for the AETHER engine

use thiserror::Error;

/// Errors the orchestrator surfaces to its callers.
///
/// Generation backend failures are deliberately absent: the dispatcher
/// absorbs them into fallback responses and they never propagate this far.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("user profile not found: {0}")]
    ProfileNotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound(id.into())
    }

    pub fn profile_not_found(id: impl Into<String>) -> Self {
        Self::ProfileNotFound(id.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn snapshot_corrupt(reason: impl Into<String>) -> Self {
        Self::SnapshotCorrupt(reason.into())
    }
}
