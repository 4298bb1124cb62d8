use serde::{Deserialize, Serialize};

use crate::types::{ControlMode, Cursor, ModeChangeReason, SessionId, ViolationKind, WorkspaceId};

/// Header fields stamped onto every event at emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stamp {
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    /// Milliseconds since session start, paused time excluded.
    pub elapsed_ms: u64,
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_version: Option<String>,
}

/// Kind-specific payload. Serialized as tagged JSON (`"event": "edit"`, etc.).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Edit {
        file: String,
        chars_added: u64,
        chars_deleted: u64,
        lines_added: u64,
        lines_removed: u64,
        is_paste: bool,
        is_undo: bool,
        is_redo: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<Cursor>,
        control_mode: ControlMode,
    },
    AiPrompt {
        assist_mode: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        prompt_hash: String,
        prompt_chars: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_preview: Option<String>,
        control_mode: ControlMode,
    },
    Snapshot {
        files: u64,
        loc: u64,
        bytes: u64,
        git_head: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        git_commit: Option<String>,
    },
    Note {
        text: String,
    },
    SessionStart {
        workspace_root: String,
        control_mode: ControlMode,
    },
    SessionEnd {
        total_paused_ms: u64,
    },
    SessionPause,
    SessionResume {
        paused_ms: u64,
    },
    FileCreate {
        file: String,
        loc: u64,
        bytes: u64,
    },
    FileDelete {
        file: String,
        loc: u64,
        bytes: u64,
    },
    WorkspaceDiff {
        added_files: u64,
        removed_files: u64,
        added_loc: u64,
        removed_loc: u64,
        added_bytes: u64,
        removed_bytes: u64,
        added_paths: Vec<String>,
        removed_paths: Vec<String>,
    },
    ModeChange {
        from: ControlMode,
        to: ControlMode,
        reason: ModeChangeReason,
    },
    PolicyViolation {
        kind: ViolationKind,
        control_mode: ControlMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl EventKind {
    /// The `event` tag this kind serializes under.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::Edit { .. } => "edit",
            EventKind::AiPrompt { .. } => "ai_prompt",
            EventKind::Snapshot { .. } => "snapshot",
            EventKind::Note { .. } => "note",
            EventKind::SessionStart { .. } => "session_start",
            EventKind::SessionEnd { .. } => "session_end",
            EventKind::SessionPause => "session_pause",
            EventKind::SessionResume { .. } => "session_resume",
            EventKind::FileCreate { .. } => "file_create",
            EventKind::FileDelete { .. } => "file_delete",
            EventKind::WorkspaceDiff { .. } => "workspace_diff",
            EventKind::ModeChange { .. } => "mode_change",
            EventKind::PolicyViolation { .. } => "policy_violation",
        }
    }
}

/// A single timeline record (one JSONL line in the session log).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(flatten)]
    pub stamp: Stamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(stamp: Stamp, kind: EventKind) -> Self {
        Self { stamp, kind }
    }

    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}

/// Anything that stamps a payload with session identity and hands it to the log.
///
/// Emission never fails from the producer's point of view.
pub trait Emitter: Send + Sync {
    fn emit(&self, kind: EventKind);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> Stamp {
        Stamp {
            ts: 1_700_000_000_000,
            elapsed_ms: 1_500,
            session_id: "ses_01hzz".into(),
            workspace_id: "abc123".into(),
            tool_version: Some("0.1.0".into()),
            extension_version: None,
        }
    }

    #[test]
    fn header_and_tag_are_flat() {
        let event = Event::new(stamp(), EventKind::Note { text: "hi".into() });
        let val = serde_json::to_value(&event).unwrap();
        assert_eq!(val["ts"], 1_700_000_000_000i64);
        assert_eq!(val["elapsed_ms"], 1_500);
        assert_eq!(val["session_id"], "ses_01hzz");
        assert_eq!(val["workspace_id"], "abc123");
        assert_eq!(val["event"], "note");
        assert_eq!(val["text"], "hi");
        assert_eq!(val["tool_version"], "0.1.0");
        assert!(val.get("extension_version").is_none());
    }

    #[test]
    fn unit_variant_serializes_with_header_only() {
        let event = Event::new(stamp(), EventKind::SessionPause);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"session_pause""#));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, EventKind::SessionPause);
    }

    #[test]
    fn mode_change_fields() {
        let event = Event::new(
            stamp(),
            EventKind::ModeChange {
                from: ControlMode::Human,
                to: ControlMode::Ai,
                reason: ModeChangeReason::AiPrompt,
            },
        );
        let val = serde_json::to_value(&event).unwrap();
        assert_eq!(val["event"], "mode_change");
        assert_eq!(val["from"], "human");
        assert_eq!(val["to"], "ai");
        assert_eq!(val["reason"], "ai_prompt");
    }

    #[test]
    fn edit_event_parses_back() {
        let event = Event::new(
            stamp(),
            EventKind::Edit {
                file: "src/main.rs".into(),
                chars_added: 12,
                chars_deleted: 0,
                lines_added: 1,
                lines_removed: 0,
                is_paste: false,
                is_undo: false,
                is_redo: false,
                cursor: Some(Cursor {
                    line: 4,
                    character: 2,
                }),
                control_mode: ControlMode::Ai,
            },
        );
        let line = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.tag(), "edit");
    }

    #[test]
    fn tags_match_serialized_names() {
        let kinds = vec![
            EventKind::SessionResume { paused_ms: 3 },
            EventKind::SessionEnd { total_paused_ms: 0 },
            EventKind::PolicyViolation {
                kind: ViolationKind::AiActionInHumanMode,
                control_mode: ControlMode::Human,
                detail: None,
            },
            EventKind::FileDelete {
                file: "a".into(),
                loc: 1,
                bytes: 0,
            },
        ];
        for kind in kinds {
            let val = serde_json::to_value(&kind).unwrap();
            assert_eq!(val["event"], kind.tag());
        }
    }
}
