//! Tests for aether-engine: pipeline, prompt assembly, profiles, sessions,
//! orchestration, streaming, and snapshots

use aether_core::{EngineConfig, EngineError, HistoryTurn, Role};
use aether_engine::*;
use aether_gen::{BackendError, BackendResult, CancellationToken, TextBackend, TextStream};
use futures::StreamExt;
use std::sync::Arc;

// ===========================================================================
// Test backends
// ===========================================================================

struct CannedBackend {
    text: String,
}

impl CannedBackend {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TextBackend for CannedBackend {
    fn name(&self) -> &str {
        "canned"
    }

    async fn batch_generate(
        &self,
        _prompt: &str,
        _params: &aether_core::GenParams,
    ) -> BackendResult<String> {
        Ok(self.text.clone())
    }

    async fn stream_generate(
        &self,
        _prompt: &str,
        _params: &aether_core::GenParams,
        _cancel: Option<CancellationToken>,
    ) -> BackendResult<TextStream> {
        let text = self.text.clone();
        Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
    }
}

struct DownBackend;

#[async_trait::async_trait]
impl TextBackend for DownBackend {
    fn name(&self) -> &str {
        "down"
    }

    async fn batch_generate(
        &self,
        _prompt: &str,
        _params: &aether_core::GenParams,
    ) -> BackendResult<String> {
        Err(BackendError::Unavailable("connection refused".into()))
    }

    async fn stream_generate(
        &self,
        _prompt: &str,
        _params: &aether_core::GenParams,
        _cancel: Option<CancellationToken>,
    ) -> BackendResult<TextStream> {
        Err(BackendError::Unavailable("connection refused".into()))
    }
}

fn engine_with(text: &str) -> Engine {
    Engine::new(EngineConfig::default(), CannedBackend::new(text))
}

fn engine_down() -> Engine {
    Engine::new(EngineConfig::default(), Arc::new(DownBackend))
}

fn turn(user: &str, assistant: &str) -> HistoryTurn {
    HistoryTurn {
        user: user.to_string(),
        assistant: assistant.to_string(),
        timestamp: chrono::Utc::now(),
        user_id: None,
    }
}

// ===========================================================================
// Thought pipeline
// ===========================================================================

#[test]
fn pipeline_is_total_over_arbitrary_text() {
    let pipeline = ThoughtPipeline::new();
    for input in ["", "   ", "hello", "Why does Rust use lifetimes?", "😀 ∞"] {
        let thought = pipeline.process(input, None);
        assert!((0.0..=1.0).contains(&thought.confidence), "input {:?}", input);
        assert!((0.0..=1.0).contains(&thought.emotion.empathy));
    }
}

#[test]
fn empty_input_is_neutral_conversation() {
    let thought = ThoughtPipeline::new().process("", None);
    assert_eq!(thought.perception.intent, Intent::Conversation);
    assert_eq!(thought.perception.sentiment, Sentiment::Neutral);
    assert!(thought.perception.entities.is_empty());
}

#[test]
fn intent_priority_question_first() {
    let pipeline = ThoughtPipeline::new();
    assert_eq!(
        pipeline.process("create a story?", None).perception.intent,
        Intent::Question
    );
    assert_eq!(
        pipeline.process("create a story", None).perception.intent,
        Intent::Creative
    );
    assert_eq!(
        pipeline.process("explain lifetimes", None).perception.intent,
        Intent::Analysis
    );
    assert_eq!(
        pipeline.process("hi there", None).perception.intent,
        Intent::Conversation
    );
}

#[test]
fn emotion_stage_is_deterministic() {
    let pipeline = ThoughtPipeline::new();
    let a = pipeline.process("I hate this terrible bug", None);
    let b = pipeline.process("I hate this terrible bug", None);
    assert_eq!(a.emotion.user_emotion, b.emotion.user_emotion);
    assert_eq!(a.emotion.tone, b.emotion.tone);
    assert_eq!(a.emotion.empathy, b.emotion.empathy);
    assert_eq!(a.emotion.tone, ResponseTone::Supportive);
}

#[test]
fn profile_expertise_seeds_knowledge_domains() {
    let store = ProfileStore::new(100);
    let profile = store.create(
        "u1",
        &ProfilePatch::default().expertise_areas(["rust", "databases"]),
    );
    let thought = ThoughtPipeline::new().process("tell me things", Some(&profile));
    assert!(thought
        .analysis
        .knowledge_domains
        .iter()
        .any(|d| d == "rust"));
}

// ===========================================================================
// Prompt assembler
// ===========================================================================

#[test]
fn prompt_includes_last_three_turns_and_custom_instructions() {
    let assembler = PromptAssembler::new("SYSTEM", "AETHER", 3);
    let store = ProfileStore::new(100);
    let profile = store.create(
        "u1",
        &ProfilePatch::default().custom_instructions("always use metric units"),
    );
    let history: Vec<_> = (1..=5).map(|i| turn(&format!("q{i}"), &format!("a{i}"))).collect();

    let prompt = assembler.build("next question", Some(&profile), &history);

    assert!(prompt.contains("always use metric units"));
    for kept in ["q3", "a3", "q4", "a4", "q5", "a5"] {
        assert!(prompt.contains(kept), "missing {kept}");
    }
    for dropped in ["q1", "a1", "q2", "a2"] {
        assert!(!prompt.contains(dropped), "should not contain {dropped}");
    }
    assert!(prompt.ends_with("User: next question\nAETHER:"));
}

#[test]
fn prompt_without_profile_omits_block_entirely() {
    let assembler = PromptAssembler::new("SYSTEM", "AETHER", 3);
    let history = vec![turn("q1", "a1")];

    let with_none = assembler.build("hello", None, &history);
    assert!(!with_none.contains("User Preferences"));
    assert!(!with_none.contains("Custom Instructions"));

    let store = ProfileStore::new(100);
    let profile = store.create("u1", &ProfilePatch::default());
    let with_profile = assembler.build("hello", Some(&profile), &history);
    assert!(with_profile.contains("User Preferences:"));
    // Empty custom instructions stay out rather than emitting an empty header.
    assert!(!with_profile.contains("Custom Instructions"));
}

#[test]
fn prompt_blocks_keep_fixed_order() {
    let assembler = PromptAssembler::new("SYSTEM", "AETHER", 3);
    let store = ProfileStore::new(100);
    let profile = store.create("u1", &ProfilePatch::default().personality("friendly"));
    let prompt = assembler.build("input", Some(&profile), &[turn("q", "a")]);

    let sys = prompt.find("SYSTEM").unwrap();
    let prefs = prompt.find("User Preferences:").unwrap();
    let recent = prompt.find("Recent conversation:").unwrap();
    let current = prompt.rfind("User: input").unwrap();
    assert!(sys < prefs && prefs < recent && recent < current);
}

// ===========================================================================
// Profile store
// ===========================================================================

#[test]
fn customize_merges_and_bumps_last_updated() {
    let store = ProfileStore::new(100);
    let first = store.customize("u1", &ProfilePatch::default().personality("friendly"));
    let second = store.customize("u1", &ProfilePatch::default().response_style("concise"));

    assert_eq!(second.personality, "friendly");
    assert_eq!(second.response_style, "concise");
    assert!(second.last_updated > first.last_updated);
    assert_eq!(second.created_at, first.created_at);
}

#[test]
fn unknown_customization_field_is_rejected() {
    let err = ProfilePatch::from_value(serde_json::json!({
        "personality": "friendly",
        "favourite_colour": "green"
    }))
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Recognized fields alone parse fine.
    let patch = ProfilePatch::from_value(serde_json::json!({
        "personality": "friendly"
    }))
    .unwrap();
    assert_eq!(patch.personality.as_deref(), Some("friendly"));
}

#[test]
fn interaction_log_is_capped() {
    let store = ProfileStore::new(5);
    store.create("u1", &ProfilePatch::default());
    for i in 0..10 {
        store.record_interaction("u1", &format!("in{i}"), "out");
    }
    let profile = store.get("u1").unwrap();
    assert_eq!(profile.interaction_history.len(), 5);
    assert_eq!(profile.interaction_history[0].input, "in5");
}

#[test]
fn recording_for_unknown_user_creates_nothing() {
    let store = ProfileStore::new(100);
    store.record_interaction("ghost", "hi", "hello");
    assert!(store.get("ghost").is_none());
}

// ===========================================================================
// Orchestrator: converse + session lifecycle
// ===========================================================================

#[tokio::test]
async fn converse_appends_both_messages() {
    let engine = engine_with("I can help with that.");
    let envelope = engine.converse("s1", "hello there", None).await;

    assert_eq!(envelope.response, "I can help with that.");
    assert_eq!(envelope.session_id, "s1");
    assert!(envelope.was_generated);
    assert!((0.0..=1.0).contains(&envelope.confidence));

    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].confidence, Some(envelope.confidence));
}

#[tokio::test]
async fn converse_with_down_backend_returns_fallback_envelope() {
    let engine = engine_down();
    let envelope = engine.converse("s1", "Who built you?", None).await;
    assert!(!envelope.was_generated);
    assert_eq!(envelope.response, aether_gen::IDENTITY_FALLBACK);
    // Dispatcher failures never surface as errors, only as fallback text.
    assert_eq!(engine.session_messages("s1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn clear_session_unknown_id_is_not_found() {
    let engine = engine_with("ok");
    let err = engine.clear_session("nope").unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn cleared_session_leaves_no_messages_behind() {
    let engine = engine_with("ok");
    engine.converse("s1", "first life", None).await;
    engine.clear_session("s1").unwrap();

    let envelope = engine.converse("s1", "second life", None).await;
    assert_eq!(envelope.session_id, "s1");
    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "second life");
}

#[tokio::test]
async fn start_or_reuse_session() {
    let engine = engine_with("ok");
    let fresh = engine.start_or_reuse_session(None);
    let reused = engine.start_or_reuse_session(Some(fresh.as_str()));
    assert_eq!(fresh, reused);

    // Unknown id: a new token is minted, not the supplied one adopted.
    let other = engine.start_or_reuse_session(Some("unknown-id"));
    assert_ne!(other.as_str(), "unknown-id");
}

#[tokio::test]
async fn converse_updates_profile_interaction_log() {
    let engine = engine_with("noted");
    engine.create_profile("alice", &ProfilePatch::default().personality("friendly"));
    engine.converse("s1", "remember this", Some("alice")).await;

    let profile = engine.profile("alice").unwrap();
    assert_eq!(profile.interaction_history.len(), 1);
    assert_eq!(profile.interaction_history[0].input, "remember this");
    assert_eq!(profile.interaction_history[0].response, "noted");
}

#[tokio::test]
async fn history_flows_into_later_prompts() {
    let engine = engine_with("reply");
    engine.converse("s1", "alpha", None).await;
    engine.converse("s1", "beta", None).await;
    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 4);
    // Append-only ordering.
    assert_eq!(messages[0].content, "alpha");
    assert_eq!(messages[2].content, "beta");
}

// ===========================================================================
// Feedback
// ===========================================================================

#[tokio::test]
async fn feedback_rating_out_of_range_is_validation_error() {
    let engine = engine_with("ok");
    engine.converse("s1", "hi", None).await;
    let err = engine
        .record_feedback("s1", 6, Some("great".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn feedback_unknown_session_is_not_found() {
    let engine = engine_with("ok");
    let err = engine.record_feedback("nope", 5, None).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn feedback_is_retrievable() {
    let engine = engine_with("ok");
    engine.converse("s1", "hi", None).await;
    engine
        .record_feedback("s1", 5, Some("great".into()))
        .await
        .unwrap();
    let feedback = engine.session_feedback("s1").await.unwrap().unwrap();
    assert_eq!(feedback.rating, 5);
    assert_eq!(feedback.text.as_deref(), Some("great"));
}

// ===========================================================================
// Streaming turns
// ===========================================================================

#[tokio::test]
async fn streamed_turn_orders_tokens_and_final_last() {
    let engine = engine_with("hello world");
    let stream = engine
        .converse_stream("s1", "hi", None, CancellationToken::new())
        .await;
    futures::pin_mut!(stream);

    let mut events = Vec::new();
    while let Some(e) = stream.next().await {
        events.push(e);
    }

    assert_eq!(events.len(), 3);
    match &events[0] {
        StreamEvent::Token { text, is_final } => {
            assert_eq!(text, "hello ");
            assert!(!*is_final);
        }
        other => panic!("expected Token, got {:?}", other),
    }
    match &events[1] {
        StreamEvent::Token { text, is_final } => {
            assert_eq!(text, "world ");
            assert!(*is_final);
        }
        other => panic!("expected Token, got {:?}", other),
    }
    match &events[2] {
        StreamEvent::Final {
            session_id,
            was_generated,
            ..
        } => {
            assert_eq!(session_id, "s1");
            assert!(*was_generated);
        }
        other => panic!("expected Final, got {:?}", other),
    }

    // Completed turn is recorded with the full response text.
    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "hello world");
}

#[tokio::test]
async fn abandoned_stream_appends_no_assistant_message() {
    let engine = engine_with("hello world");
    {
        let stream = engine
            .converse_stream("s1", "hi", None, CancellationToken::new())
            .await;
        futures::pin_mut!(stream);
        // Consume one token, then drop the stream (client disconnect).
        let first = stream.next().await;
        assert!(matches!(first, Some(StreamEvent::Token { .. })));
    }

    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn cancelled_stream_appends_no_assistant_message() {
    let engine = engine_with("hello world");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let stream = engine.converse_stream("s1", "hi", None, cancel).await;
    futures::pin_mut!(stream);
    while stream.next().await.is_some() {}

    let messages = engine.session_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn streamed_fallback_still_ends_with_final() {
    let engine = engine_down();
    let stream = engine
        .converse_stream("s1", "anything", None, CancellationToken::new())
        .await;
    futures::pin_mut!(stream);

    let mut events = Vec::new();
    while let Some(e) = stream.next().await {
        events.push(e);
    }
    match events.last().unwrap() {
        StreamEvent::Final { was_generated, .. } => assert!(!*was_generated),
        other => panic!("expected Final, got {:?}", other),
    }
}

// ===========================================================================
// Stats and info
// ===========================================================================

#[tokio::test]
async fn stats_count_sessions_messages_users() {
    let engine = engine_with("ok");
    engine.create_profile("alice", &ProfilePatch::default());
    engine.converse("s1", "one", None).await;
    engine.converse("s2", "two", Some("alice")).await;

    let stats = engine.stats().await;
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_messages, 4);
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.active_sessions, 2);
}

#[tokio::test]
async fn info_reports_fallback_status_after_failed_turn() {
    let engine = engine_down();
    assert_eq!(engine.info().status, aether_core::EngineStatus::Active);
    engine.converse("s1", "hi", None).await;
    assert_eq!(engine.info().status, aether_core::EngineStatus::Fallback);
}

// ===========================================================================
// Snapshots
// ===========================================================================

struct MemStore(std::sync::Mutex<Option<Vec<u8>>>);

impl MemStore {
    fn new() -> Self {
        Self(std::sync::Mutex::new(None))
    }
}

impl StateStore for MemStore {
    fn save(&self, blob: &[u8]) -> std::io::Result<()> {
        *self.0.lock().unwrap() = Some(blob.to_vec());
        Ok(())
    }

    fn load(&self) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn snapshot_round_trips_profiles_and_history() {
    let store = MemStore::new();

    let engine = engine_with("reply");
    engine.create_profile(
        "alice",
        &ProfilePatch::default()
            .personality("friendly")
            .custom_instructions("always use metric units"),
    );
    engine.converse("s1", "hello", Some("alice")).await;
    engine.save_state(&store).unwrap();

    let restored = engine_with("reply");
    restored.load_state(&store).unwrap();

    let profile = restored.profile("alice").unwrap();
    assert_eq!(profile.personality, "friendly");
    assert_eq!(profile.custom_instructions, "always use metric units");

    let snapshot = restored.snapshot();
    assert_eq!(snapshot.conversation_history.len(), 1);
    assert_eq!(snapshot.conversation_history[0].user, "hello");
    assert_eq!(snapshot.conversation_history[0].user_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn corrupt_snapshot_loads_empty_state() {
    let store = MemStore::new();
    store.save(b"{ not json").unwrap();

    let engine = engine_with("ok");
    engine.load_state(&store).unwrap();
    assert!(matches!(
        engine.profile("anyone").unwrap_err(),
        EngineError::ProfileNotFound(_)
    ));
    assert!(engine.snapshot().conversation_history.is_empty());
}

#[test]
fn snapshot_blob_parse_reports_corruption() {
    let err = Snapshot::from_blob(b"garbage").unwrap_err();
    assert!(matches!(err, EngineError::SnapshotCorrupt(_)));
}

#[tokio::test]
async fn history_window_is_bounded_to_snapshot_turns() {
    let mut config = EngineConfig::default();
    config.snapshot_turns = 3;
    let engine = Engine::new(config, CannedBackend::new("r"));
    for i in 0..6 {
        engine.converse("s1", &format!("m{i}"), None).await;
    }
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.conversation_history.len(), 3);
    assert_eq!(snapshot.conversation_history[0].user, "m3");
}
