//! Prompt assembly
//!
//! Fixed block order: base system directive, optional profile block, the
//! last N history turns, then the current input framed as a new turn. Every
//! included field appears verbatim; a missing profile omits its block
//! entirely rather than emitting empty headers.

use crate::profile::UserProfile;
use aether_core::HistoryTurn;

pub struct PromptAssembler {
    system_prompt: String,
    assistant_name: String,
    history_turns: usize,
}

impl PromptAssembler {
    pub fn new(
        system_prompt: impl Into<String>,
        assistant_name: impl Into<String>,
        history_turns: usize,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            assistant_name: assistant_name.into(),
            history_turns,
        }
    }

    pub fn build(
        &self,
        input: &str,
        profile: Option<&UserProfile>,
        history: &[HistoryTurn],
    ) -> String {
        let mut prompt = self.system_prompt.clone();

        if let Some(profile) = profile {
            prompt.push_str("\n\nUser Preferences:");
            prompt.push_str(&format!("\n- Personality: {}", profile.personality));
            prompt.push_str(&format!("\n- Response Style: {}", profile.response_style));
            prompt.push_str(&format!(
                "\n- Expertise Areas: {}",
                profile.expertise_areas.join(", ")
            ));
            prompt.push_str(&format!("\n- Language: {}", profile.language_preference));

            if !profile.custom_instructions.is_empty() {
                prompt.push_str(&format!(
                    "\n\nCustom Instructions: {}",
                    profile.custom_instructions
                ));
            }
        }

        let start = history.len().saturating_sub(self.history_turns);
        let recent = &history[start..];
        if !recent.is_empty() {
            prompt.push_str("\n\nRecent conversation:");
            for turn in recent {
                prompt.push_str(&format!("\nUser: {}", turn.user));
                prompt.push_str(&format!("\n{}: {}", self.assistant_name, turn.assistant));
            }
        }

        prompt.push_str(&format!("\n\nUser: {}\n{}:", input, self.assistant_name));
        prompt
    }
}
