//! Conversation orchestrator — the top-level coordinator
//!
//! Owns the session registry, the profile store, and the engine-wide
//! recent-turn log, and drives each message through pipeline → assembler →
//! dispatcher. Side effects stay confined to the maps it owns; the
//! generation backend is reached only through the dispatcher.

use crate::pipeline::{ThoughtPipeline, ThoughtRecord};
use crate::profile::{ProfilePatch, ProfileStore, UserProfile};
use crate::prompt::PromptAssembler;
use crate::session::SessionRegistry;
use aether_core::{
    ChatMessage, EngineConfig, EngineError, EngineInfo, EngineStatus, Feedback, HistoryTurn,
    Result, SessionKey,
};
use aether_gen::{Dispatcher, ResponseChunk, TextBackend};
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Returned to the caller when the pipeline does not supply a confidence.
pub const DEFAULT_CONFIDENCE: f32 = 0.85;

/// What a caller gets back from one completed turn.
#[derive(Clone, Debug, Serialize)]
pub struct ResponseEnvelope {
    pub response: String,
    pub session_id: String,
    pub thought: ThoughtRecord,
    pub confidence: f32,
    pub was_generated: bool,
    pub metadata: EngineInfo,
    pub timestamp: DateTime<Utc>,
}

/// One item of a streamed turn, in delivery order. `Final` is always last
/// for a completed turn; a cancelled turn simply ends without it.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Token { text: String, is_final: bool },
    Final {
        session_id: String,
        confidence: f32,
        was_generated: bool,
        metadata: EngineInfo,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineStats {
    pub total_sessions: usize,
    pub total_messages: usize,
    pub total_users: usize,
    pub active_sessions: usize,
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pipeline: ThoughtPipeline,
    assembler: PromptAssembler,
    dispatcher: Dispatcher,
    pub(crate) sessions: SessionRegistry,
    pub(crate) profiles: ProfileStore,
    /// Engine-wide recent turns, bounded to the snapshot window.
    pub(crate) recent: Mutex<VecDeque<HistoryTurn>>,
    degraded: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Arc<dyn TextBackend>) -> Self {
        info!(
            model = %config.model_name,
            backend = backend.name(),
            "initializing AETHER engine"
        );
        let assembler = PromptAssembler::new(
            config.system_prompt.clone(),
            config.assistant_name.clone(),
            config.history_turns,
        );
        let profiles = ProfileStore::new(config.interaction_log_cap);
        Self {
            config,
            pipeline: ThoughtPipeline::new(),
            assembler,
            dispatcher: Dispatcher::new(backend),
            sessions: SessionRegistry::new(),
            profiles,
            recent: Mutex::new(VecDeque::new()),
            degraded: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------

    /// Reuse a known session id, or mint (and register) a fresh one when
    /// none is supplied or the id is unknown.
    pub fn start_or_reuse_session(&self, session_id: Option<&str>) -> SessionKey {
        if let Some(id) = session_id {
            let key = SessionKey::from(id);
            if self.sessions.get(&key).is_some() {
                return key;
            }
        }
        let key = SessionKey::generate();
        self.sessions.get_or_create(&key);
        debug!(session = %key, "started new session");
        key
    }

    /// Remove a session and all its messages.
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        let key = SessionKey::from(session_id);
        self.sessions
            .remove(&key)
            .map(|_| info!(session = %key, "session cleared"))
            .ok_or_else(|| EngineError::session_not_found(session_id))
    }

    /// Attach a 1-5 rating (plus optional text) to a session.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        rating: u8,
        text: Option<String>,
    ) -> Result<()> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        let session = self
            .sessions
            .get(&SessionKey::from(session_id))
            .ok_or_else(|| EngineError::session_not_found(session_id))?;
        session.set_feedback(rating, text).await;
        Ok(())
    }

    pub async fn session_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let session = self
            .sessions
            .get(&SessionKey::from(session_id))
            .ok_or_else(|| EngineError::session_not_found(session_id))?;
        Ok(session.messages().await)
    }

    pub async fn session_feedback(&self, session_id: &str) -> Result<Option<Feedback>> {
        let session = self
            .sessions
            .get(&SessionKey::from(session_id))
            .ok_or_else(|| EngineError::session_not_found(session_id))?;
        Ok(session.feedback().await)
    }

    // -----------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------

    pub fn create_profile(&self, user_id: &str, patch: &ProfilePatch) -> UserProfile {
        self.profiles.create(user_id, patch)
    }

    pub fn customize_profile(&self, user_id: &str, patch: &ProfilePatch) -> UserProfile {
        self.profiles.customize(user_id, patch)
    }

    pub fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.profiles
            .get(user_id)
            .ok_or_else(|| EngineError::profile_not_found(user_id))
    }

    // -----------------------------------------------------------------
    // Conversing
    // -----------------------------------------------------------------

    /// One full batch turn: append the user message, think, assemble,
    /// dispatch, append the assistant message, update bookkeeping.
    pub async fn converse(
        &self,
        session_id: &str,
        message: &str,
        user_id: Option<&str>,
    ) -> ResponseEnvelope {
        let key = SessionKey::from(session_id);
        let session = self.sessions.get_or_create(&key);

        session.add_user_message(message).await;
        if let Some(uid) = user_id {
            session.link_user(uid).await;
        }

        let profile = user_id.and_then(|uid| self.profiles.get(uid));
        let thought = self.pipeline.process(message, profile.as_ref());
        let history = session.turns().await;
        let prompt = self.assembler.build(message, profile.as_ref(), &history);

        let outcome = self
            .dispatcher
            .generate(message, &prompt, &self.config.gen)
            .await;
        self.degraded.store(!outcome.was_generated, Ordering::Relaxed);

        let confidence = effective_confidence(&thought);
        session
            .add_assistant_message(&outcome.text, confidence)
            .await;
        self.record_turn(message, &outcome.text, user_id);
        if let Some(uid) = user_id {
            self.profiles.record_interaction(uid, message, &outcome.text);
        }

        debug!(
            session = %key,
            generated = outcome.was_generated,
            confidence,
            "turn complete"
        );

        ResponseEnvelope {
            response: outcome.text,
            session_id: key.to_string(),
            thought,
            confidence,
            was_generated: outcome.was_generated,
            metadata: self.info(),
            timestamp: Utc::now(),
        }
    }

    /// Streaming variant of [`converse`]: word-level tokens in generation
    /// order, then one `Final` event. Dropping the stream or triggering
    /// `cancel` abandons the turn — already-delivered tokens stand, but no
    /// assistant message is appended to the session.
    ///
    /// [`converse`]: Engine::converse
    pub async fn converse_stream<'a>(
        &'a self,
        session_id: &str,
        message: &str,
        user_id: Option<&str>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = StreamEvent> + Send + 'a {
        let key = SessionKey::from(session_id);
        let session = self.sessions.get_or_create(&key);

        session.add_user_message(message).await;
        if let Some(uid) = user_id {
            session.link_user(uid).await;
        }

        let profile = user_id.and_then(|uid| self.profiles.get(uid));
        let thought = self.pipeline.process(message, profile.as_ref());
        let history = session.turns().await;
        let prompt = self.assembler.build(message, profile.as_ref(), &history);

        let confidence = effective_confidence(&thought);
        let message = message.to_string();
        let user_id = user_id.map(String::from);
        let mut chunks =
            self.dispatcher
                .generate_stream(&message, &prompt, &self.config.gen, cancel);

        async_stream::stream! {
            let mut response = String::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    ResponseChunk::Token { text, is_final } => {
                        response.push_str(&text);
                        yield StreamEvent::Token { text, is_final };
                    }
                    ResponseChunk::Final { was_generated } => {
                        // Bookkeeping happens only for a turn that ran to
                        // completion; a cancelled stream never gets here.
                        let response = response.trim_end().to_string();
                        self.degraded.store(!was_generated, Ordering::Relaxed);
                        session.add_assistant_message(&response, confidence).await;
                        self.record_turn(&message, &response, user_id.as_deref());
                        if let Some(uid) = user_id.as_deref() {
                            self.profiles.record_interaction(uid, &message, &response);
                        }
                        yield StreamEvent::Final {
                            session_id: key.to_string(),
                            confidence,
                            was_generated,
                            metadata: self.info(),
                        };
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    pub fn info(&self) -> EngineInfo {
        let degraded = self.degraded.load(Ordering::Relaxed);
        EngineInfo {
            name: "AETHER".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model: self.config.model_name.clone(),
            capabilities: vec![
                "multi-layered thinking".to_string(),
                "emotional intelligence".to_string(),
                "user customization".to_string(),
                "streaming responses".to_string(),
            ],
            status: if degraded {
                EngineStatus::Fallback
            } else {
                EngineStatus::Active
            },
        }
    }

    pub async fn stats(&self) -> EngineStats {
        let mut total_messages = 0;
        let mut active_sessions = 0;
        let hour_ago = Utc::now() - Duration::hours(1);
        for key in self.sessions.list() {
            if let Some(session) = self.sessions.get(&key) {
                total_messages += session.message_count().await;
                if session.created_at > hour_ago {
                    active_sessions += 1;
                }
            }
        }
        EngineStats {
            total_sessions: self.sessions.len(),
            total_messages,
            total_users: self.profiles.len(),
            active_sessions,
        }
    }

    fn record_turn(&self, user: &str, assistant: &str, user_id: Option<&str>) {
        let mut recent = self.recent.lock().expect("recent log poisoned");
        recent.push_back(HistoryTurn {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp: Utc::now(),
            user_id: user_id.map(String::from),
        });
        while recent.len() > self.config.snapshot_turns {
            recent.pop_front();
        }
    }
}

/// The pipeline always supplies a confidence, but anything outside [0, 1]
/// (or not a number at all) falls back to the documented default.
fn effective_confidence(thought: &ThoughtRecord) -> f32 {
    if thought.confidence.is_finite() {
        thought.confidence.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}
