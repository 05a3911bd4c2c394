//! Tests for aether-core: keys, messages, errors, and configuration

use aether_core::*;

// ===========================================================================
// SessionKey
// ===========================================================================

#[test]
fn session_key_basics() {
    let key = SessionKey::new("test-session");
    assert_eq!(key.as_str(), "test-session");
    assert_eq!(format!("{}", key), "test-session");
}

#[test]
fn session_key_generate_is_unique() {
    let a = SessionKey::generate();
    let b = SessionKey::generate();
    assert_ne!(a, b);
    assert!(!a.as_str().is_empty());
}

#[test]
fn session_key_from_str_and_string() {
    let a: SessionKey = "s1".into();
    let b: SessionKey = String::from("s1").into();
    assert_eq!(a, b);
}

// ===========================================================================
// ChatMessage
// ===========================================================================

#[test]
fn user_message_has_no_confidence() {
    let m = ChatMessage::user("hello");
    assert_eq!(m.role, Role::User);
    assert_eq!(m.content, "hello");
    assert!(m.confidence.is_none());
}

#[test]
fn assistant_message_carries_confidence() {
    let m = ChatMessage::assistant("hi", 0.9);
    assert_eq!(m.role, Role::Assistant);
    assert_eq!(m.confidence, Some(0.9));
}

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(
        serde_json::to_string(&Role::Assistant).unwrap(),
        r#""assistant""#
    );
}

#[test]
fn history_turn_omits_absent_user_id() {
    let turn = HistoryTurn {
        user: "hi".into(),
        assistant: "hello".into(),
        timestamp: chrono::Utc::now(),
        user_id: None,
    };
    let json = serde_json::to_string(&turn).unwrap();
    assert!(!json.contains("user_id"));
}

// ===========================================================================
// EngineError
// ===========================================================================

#[test]
fn error_display() {
    let e = EngineError::session_not_found("abc");
    assert_eq!(e.to_string(), "session not found: abc");

    let e = EngineError::validation("rating must be between 1 and 5, got 6");
    assert!(e.to_string().starts_with("validation failed"));

    let e = EngineError::snapshot_corrupt("truncated");
    assert_eq!(e.to_string(), "snapshot corrupt: truncated");
}

// ===========================================================================
// EngineConfig / GenParams
// ===========================================================================

#[test]
fn gen_params_defaults() {
    let p = GenParams::default();
    assert_eq!(p.max_new_tokens, 512);
    assert_eq!(p.top_k, 50);
    assert!((p.top_p - 0.9).abs() < f32::EPSILON);
    assert!((p.repetition_penalty - 1.1).abs() < f32::EPSILON);
}

#[test]
fn engine_config_defaults() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.assistant_name, "AETHER");
    assert_eq!(cfg.history_turns, 3);
    assert_eq!(cfg.snapshot_turns, 50);
    assert!(cfg.system_prompt.contains("AETHER"));
}
