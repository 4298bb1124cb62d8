//! The resumable session record kept in the state store while paused.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempo_core::{ControlMode, SessionId, WorkspaceId};
use tempo_store::StateStore;

/// State-store key of the paused session record.
pub const RESUMABLE_SESSION_KEY: &str = "resumable_session";

/// Everything needed to continue a paused session after a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumableSession {
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    pub workspace_root: PathBuf,
    pub log_path: PathBuf,
    /// Epoch ms.
    pub start_time: i64,
    /// Epoch ms.
    pub paused_at: i64,
    pub total_paused_ms: u64,
    /// Older records may lack it; resume treats that as human.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_mode: Option<ControlMode>,
}

impl ResumableSession {
    /// Elapsed time frozen at the pause.
    pub fn frozen_elapsed_ms(&self) -> u64 {
        (self.paused_at - self.start_time - self.total_paused_ms as i64).max(0) as u64
    }
}

/// Read the saved record. Unreadable or malformed records count as absent.
pub fn load_saved(store: &dyn StateStore) -> Option<ResumableSession> {
    let value = match store.get(RESUMABLE_SESSION_KEY) {
        Ok(value) => value?,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read saved session; ignoring it");
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(saved) => Some(saved),
        Err(e) => {
            tracing::warn!(error = %e, "malformed saved session; ignoring it");
            None
        }
    }
}

pub fn save(store: &dyn StateStore, saved: &ResumableSession) -> anyhow::Result<()> {
    store.put(RESUMABLE_SESSION_KEY, &serde_json::to_value(saved)?)
}

/// Remove the saved record; failures are logged.
pub fn clear_saved(store: &dyn StateStore) {
    if let Err(e) = store.remove(RESUMABLE_SESSION_KEY) {
        tracing::warn!(error = %e, "cannot clear saved session");
    }
}

/// Remove the saved record only if it belongs to `session_id`.
pub fn clear_saved_for(store: &dyn StateStore, session_id: &str) {
    match load_saved(store) {
        Some(saved) if saved.session_id == session_id => clear_saved(store),
        Some(saved) => tracing::debug!(
            saved = %saved.session_id,
            ended = %session_id,
            "keeping saved record of another session"
        ),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_store::{FileStateStore, MemoryStateStore};

    fn sample() -> ResumableSession {
        ResumableSession {
            session_id: "ses_a".into(),
            workspace_id: "ws".into(),
            workspace_root: PathBuf::from("/work"),
            log_path: PathBuf::from("/logs/ses_a.jsonl"),
            start_time: 1_000,
            paused_at: 61_000,
            total_paused_ms: 10_000,
            control_mode: Some(ControlMode::Ai),
        }
    }

    #[test]
    fn frozen_elapsed() {
        assert_eq!(sample().frozen_elapsed_ms(), 50_000);
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(load_saved(&store).is_none());

        save(&store, &sample()).unwrap();
        assert!(dir.path().join("resumable_session.json").exists());
        assert_eq!(load_saved(&store), Some(sample()));

        clear_saved(&store);
        assert!(load_saved(&store).is_none());
        // clearing twice is fine
        clear_saved(&store);
    }

    #[test]
    fn clear_for_other_session_keeps_record() {
        let store = MemoryStateStore::new();
        save(&store, &sample()).unwrap();

        clear_saved_for(&store, "ses_b");
        assert_eq!(load_saved(&store), Some(sample()));

        clear_saved_for(&store, "ses_a");
        assert!(load_saved(&store).is_none());
    }

    #[test]
    fn missing_control_mode_is_accepted() {
        let store = MemoryStateStore::new();
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("control_mode");
        store.put(RESUMABLE_SESSION_KEY, &value).unwrap();

        let loaded = load_saved(&store).unwrap();
        assert_eq!(loaded.control_mode, None);
    }

    #[test]
    fn malformed_record_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resumable_session.json"), "{ nope").unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(load_saved(&store).is_none());

        let mem = MemoryStateStore::new();
        mem.put(RESUMABLE_SESSION_KEY, &serde_json::json!({"session_id": 3}))
            .unwrap();
        assert!(load_saved(&mem).is_none());
    }
}
