//! AETHER Engine - Conversation orchestration: thought pipeline, prompt
//! assembly, sessions, user profiles, and generation dispatch

pub mod orchestrator;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod session;
pub mod snapshot;

pub use orchestrator::{Engine, EngineStats, ResponseEnvelope, StreamEvent};
pub use pipeline::{
    Analysis, EmotionalAssessment, Intent, Perception, ResponseTone, Sentiment, Synthesis,
    ThoughtPipeline, ThoughtRecord, UserEmotion,
};
pub use profile::{Interaction, ProfilePatch, ProfileStore, UserProfile};
pub use prompt::PromptAssembler;
pub use session::{Session, SessionRegistry};
pub use snapshot::{FileStore, Snapshot, StateStore};
