//! Session management
//!
//! A session owns an append-only message log for one conversation thread.
//! Sessions are destroyed only by an explicit clear from their owner; idle
//! reaping, if wanted, is an external policy that calls the same path.

use aether_core::{ChatMessage, Feedback, HistoryTurn, Role, SessionKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, key: &SessionKey) -> Arc<Session> {
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Session::new(key.clone())))
            .clone()
    }

    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn remove(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

pub struct Session {
    pub key: SessionKey,
    pub created_at: DateTime<Utc>,
    messages: RwLock<Vec<ChatMessage>>,
    user_id: RwLock<Option<String>>,
    feedback: RwLock<Option<Feedback>>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            messages: RwLock::new(Vec::new()),
            user_id: RwLock::new(None),
            feedback: RwLock::new(None),
        }
    }

    pub async fn add_user_message(&self, content: &str) {
        self.messages.write().await.push(ChatMessage::user(content));
    }

    pub async fn add_assistant_message(&self, content: &str, confidence: f32) {
        self.messages
            .write()
            .await
            .push(ChatMessage::assistant(content, confidence));
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Completed user/assistant exchanges, oldest first. An unanswered
    /// trailing user message is not a turn yet.
    pub async fn turns(&self) -> Vec<HistoryTurn> {
        let messages = self.messages.read().await;
        let user_id = self.user_id.read().await.clone();
        let mut turns = Vec::new();
        let mut pending: Option<&ChatMessage> = None;
        for msg in messages.iter() {
            match msg.role {
                Role::User => pending = Some(msg),
                Role::Assistant => {
                    if let Some(user_msg) = pending.take() {
                        turns.push(HistoryTurn {
                            user: user_msg.content.clone(),
                            assistant: msg.content.clone(),
                            timestamp: msg.timestamp,
                            user_id: user_id.clone(),
                        });
                    }
                }
            }
        }
        turns
    }

    pub async fn link_user(&self, user_id: &str) {
        *self.user_id.write().await = Some(user_id.to_string());
    }

    pub async fn user_id(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }

    pub async fn set_feedback(&self, rating: u8, text: Option<String>) {
        *self.feedback.write().await = Some(Feedback {
            rating,
            text,
            timestamp: Utc::now(),
        });
    }

    pub async fn feedback(&self) -> Option<Feedback> {
        self.feedback.read().await.clone()
    }
}
