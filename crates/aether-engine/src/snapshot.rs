//! Durable state snapshots
//!
//! Used only at process boundaries (startup/shutdown), never on the request
//! hot path. The blob store is pluggable; the engine only needs "save a
//! blob, load it back". Restoring profiles re-enters the same `create`
//! path used at runtime, so no snapshot can bypass validation.

use crate::orchestrator::Engine;
use crate::profile::ProfilePatch;
use aether_core::{EngineInfo, HistoryTurn, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Durable blob store for engine state.
pub trait StateStore: Send + Sync {
    fn save(&self, blob: &[u8]) -> std::io::Result<()>;
    /// `None` means no snapshot exists yet (first run).
    fn load(&self) -> std::io::Result<Option<Vec<u8>>>;
}

/// File-backed store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StateStore for FileStore {
    fn save(&self, blob: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, blob)
    }

    fn load(&self) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The language-agnostic snapshot record.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub user_profiles: BTreeMap<String, ProfilePrefs>,
    pub conversation_history: Vec<HistoryTurn>,
    pub metadata: EngineInfo,
}

/// The customization fields that survive a restart. Interaction history and
/// timestamps are rebuilt fresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfilePrefs {
    pub personality: String,
    pub response_style: String,
    pub expertise_areas: Vec<String>,
    pub language_preference: String,
    pub custom_instructions: String,
}

impl Snapshot {
    /// Parse a persisted blob, surfacing malformed state as
    /// `SnapshotCorrupt`.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob)
            .map_err(|e| aether_core::EngineError::snapshot_corrupt(e.to_string()))
    }
}

impl Engine {
    /// Capture current state: all profiles plus the engine-wide recent-turn
    /// window (at most `snapshot_turns`, already bounded).
    pub fn snapshot(&self) -> Snapshot {
        let user_profiles = self
            .profiles
            .export()
            .into_iter()
            .map(|p| {
                (
                    p.user_id.clone(),
                    ProfilePrefs {
                        personality: p.personality,
                        response_style: p.response_style,
                        expertise_areas: p.expertise_areas,
                        language_preference: p.language_preference,
                        custom_instructions: p.custom_instructions,
                    },
                )
            })
            .collect();
        let conversation_history = self
            .recent
            .lock()
            .expect("recent log poisoned")
            .iter()
            .cloned()
            .collect();
        Snapshot {
            user_profiles,
            conversation_history,
            metadata: self.info(),
        }
    }

    /// Serialize and persist a snapshot.
    pub fn save_state(&self, store: &dyn StateStore) -> Result<()> {
        let snapshot = self.snapshot();
        let blob = serde_json::to_vec_pretty(&snapshot)?;
        store.save(&blob)?;
        info!(
            profiles = snapshot.user_profiles.len(),
            turns = snapshot.conversation_history.len(),
            "state saved"
        );
        Ok(())
    }

    /// Load persisted state, if any. A corrupt snapshot is reported and
    /// skipped — startup proceeds with empty state rather than aborting.
    pub fn load_state(&self, store: &dyn StateStore) -> Result<()> {
        let Some(blob) = store.load()? else {
            info!("no snapshot found, starting fresh");
            return Ok(());
        };

        let snapshot = match Snapshot::from_blob(&blob) {
            Ok(s) => s,
            Err(e) => {
                warn!("{}, starting with empty state", e);
                return Ok(());
            }
        };

        for (user_id, prefs) in &snapshot.user_profiles {
            let patch = ProfilePatch::default()
                .personality(prefs.personality.clone())
                .response_style(prefs.response_style.clone())
                .expertise_areas(prefs.expertise_areas.clone())
                .language_preference(prefs.language_preference.clone())
                .custom_instructions(prefs.custom_instructions.clone());
            self.profiles.create(user_id, &patch);
        }

        {
            let mut recent = self.recent.lock().expect("recent log poisoned");
            recent.clear();
            recent.extend(snapshot.conversation_history.iter().cloned());
            while recent.len() > self.config.snapshot_turns {
                recent.pop_front();
            }
        }

        info!(
            profiles = snapshot.user_profiles.len(),
            turns = snapshot.conversation_history.len(),
            "state restored"
        );
        Ok(())
    }
}
