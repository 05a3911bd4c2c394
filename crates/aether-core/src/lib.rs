//! AETHER Core - Types, errors, and engine configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, GenParams};
pub use error::{EngineError, Result};
pub use types::*;
