//! Engine configuration — serde structs for aether.json
//!
//! Pure types and parsing only. Construction of the running engine lives in
//! aether-engine.

use serde::Deserialize;
use std::path::Path;

/// Sampling parameters forwarded to the generation backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            repetition_penalty: 1.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier reported in metadata and forwarded to the backend.
    pub model_name: String,
    /// Display name used for assistant turns in assembled prompts.
    pub assistant_name: String,
    /// Base system directive, always the first prompt block.
    pub system_prompt: String,
    /// History turns included when assembling a prompt.
    pub history_turns: usize,
    /// Recent turns retained engine-wide for the snapshot.
    pub snapshot_turns: usize,
    /// Per-profile interaction log cap.
    pub interaction_log_cap: usize,
    pub gen: GenParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_name: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            assistant_name: "AETHER".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_turns: 3,
            snapshot_turns: 50,
            interaction_log_cap: 100,
            gen: GenParams::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are AETHER (Advanced Engine for Thought, Heuristic Emotion and Reasoning), \
an AI assistant created by AlgoRythm Tech. You combine advanced reasoning, emotional \
intelligence, and adaptive learning to provide personalized assistance. You think \
deeply, reason carefully, and adapt to each user's unique communication style and needs.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_baseline() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.history_turns, 3);
        assert_eq!(cfg.snapshot_turns, 50);
        assert_eq!(cfg.gen.max_new_tokens, 512);
        assert!((cfg.gen.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_config_deserializes() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"assistant_name": "NOVA", "gen": {"top_k": 40}}"#).unwrap();
        assert_eq!(cfg.assistant_name, "NOVA");
        assert_eq!(cfg.gen.top_k, 40);
        assert_eq!(cfg.gen.max_new_tokens, 512);
    }
}
