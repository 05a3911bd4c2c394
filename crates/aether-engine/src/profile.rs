//! User customization profiles
//!
//! The store serializes all mutation per user id through the dashmap entry
//! API, so concurrent customizations of the same user merge atomically
//! while different users proceed in parallel.

use aether_core::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub personality: String,
    pub response_style: String,
    pub expertise_areas: Vec<String>,
    pub language_preference: String,
    pub custom_instructions: String,
    pub interaction_history: Vec<Interaction>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            personality: "balanced".to_string(),
            response_style: "comprehensive".to_string(),
            expertise_areas: Vec::new(),
            language_preference: "accessible".to_string(),
            custom_instructions: String::new(),
            interaction_history: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(p) = &patch.personality {
            self.personality = p.clone();
        }
        if let Some(rs) = &patch.response_style {
            self.response_style = rs.clone();
        }
        if let Some(ea) = &patch.expertise_areas {
            self.expertise_areas = ea.clone();
        }
        if let Some(lp) = &patch.language_preference {
            self.language_preference = lp.clone();
        }
        if let Some(ci) = &patch.custom_instructions {
            self.custom_instructions = ci.clone();
        }
    }

    /// `last_updated` must strictly increase on every mutation, even when
    /// two mutations land inside one clock tick.
    fn bump(&mut self) {
        let now = Utc::now();
        self.last_updated = if now > self.last_updated {
            now
        } else {
            self.last_updated + Duration::microseconds(1)
        };
    }
}

/// One past exchange remembered on the profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interaction {
    pub input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Partial customization. Unknown keys are a validation error, not silently
/// stored — the whole point is preventing schema drift.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    pub personality: Option<String>,
    pub response_style: Option<String>,
    pub expertise_areas: Option<Vec<String>>,
    pub language_preference: Option<String>,
    pub custom_instructions: Option<String>,
}

impl ProfilePatch {
    /// Parse a patch from untyped JSON (the shape transports hand us).
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| EngineError::validation(format!("bad customization: {}", e)))
    }

    pub fn personality(mut self, v: impl Into<String>) -> Self {
        self.personality = Some(v.into());
        self
    }

    pub fn response_style(mut self, v: impl Into<String>) -> Self {
        self.response_style = Some(v.into());
        self
    }

    pub fn expertise_areas<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise_areas = Some(v.into_iter().map(Into::into).collect());
        self
    }

    pub fn language_preference(mut self, v: impl Into<String>) -> Self {
        self.language_preference = Some(v.into());
        self
    }

    pub fn custom_instructions(mut self, v: impl Into<String>) -> Self {
        self.custom_instructions = Some(v.into());
        self
    }
}

pub struct ProfileStore {
    profiles: DashMap<String, UserProfile>,
    interaction_cap: usize,
}

impl ProfileStore {
    pub fn new(interaction_cap: usize) -> Self {
        Self {
            profiles: DashMap::new(),
            interaction_cap,
        }
    }

    /// Create a profile, or treat re-creation of an existing id as a full
    /// customize. Idempotent per id.
    pub fn create(&self, user_id: &str, patch: &ProfilePatch) -> UserProfile {
        self.customize(user_id, patch)
    }

    /// Create-if-absent, then merge recognized fields and bump
    /// `last_updated`. Returns the resulting profile.
    pub fn customize(&self, user_id: &str, patch: &ProfilePatch) -> UserProfile {
        let mut entry = self
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));
        entry.apply(patch);
        entry.bump();
        entry.clone()
    }

    pub fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.get(user_id).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Append an exchange to the profile's interaction log. No-op for
    /// unknown users: conversing never implicitly creates a profile.
    pub fn record_interaction(&self, user_id: &str, input: &str, response: &str) {
        if let Some(mut entry) = self.profiles.get_mut(user_id) {
            entry.interaction_history.push(Interaction {
                input: input.to_string(),
                response: response.to_string(),
                timestamp: Utc::now(),
            });
            let cap = self.interaction_cap;
            if entry.interaction_history.len() > cap {
                let excess = entry.interaction_history.len() - cap;
                entry.interaction_history.drain(..excess);
            }
            entry.bump();
        }
    }

    /// All profiles, for the snapshot writer.
    pub fn export(&self) -> Vec<UserProfile> {
        self.profiles.iter().map(|e| e.clone()).collect()
    }
}
