use serde::{Deserialize, Serialize};

/// Session ID format: `ses_<ulid>` (lowercase, sorts by creation time).
pub type SessionId = String;

/// Workspace ID: stable hash of the workspace root path.
pub type WorkspaceId = String;

/// Allocate a new time-ordered session id.
pub fn new_session_id() -> SessionId {
    format!("ses_{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// Attribution applied to edits until the next mode change.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Human,
    Ai,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Human => "human",
            ControlMode::Ai => "ai",
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(ControlMode::Human),
            "ai" => Ok(ControlMode::Ai),
            other => Err(format!("unknown control mode: {other}")),
        }
    }
}

/// Why a `mode_change` happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModeChangeReason {
    Manual,
    AiPrompt,
}

/// Kinds of recorded policy violations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// An AI-assist action happened while the session was attributed to the human.
    AiActionInHumanMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Stopped,
    Active,
    Paused,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Stopped => "stopped",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
        }
    }
}

/// Zero-based editor cursor position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub line: u32,
    pub character: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with("ses_"));
        assert_eq!(a.len(), 4 + 26);
        assert_ne!(a, b);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn control_mode_round_trips_through_str() {
        assert_eq!("ai".parse::<ControlMode>().unwrap(), ControlMode::Ai);
        assert_eq!(" Human ".parse::<ControlMode>().unwrap(), ControlMode::Human);
        assert!("robot".parse::<ControlMode>().is_err());
        assert_eq!(ControlMode::Ai.to_string(), "ai");
    }

    #[test]
    fn control_mode_serializes_snake_case() {
        let json = serde_json::to_string(&ControlMode::Ai).unwrap();
        assert_eq!(json, r#""ai""#);
        let reason = serde_json::to_string(&ModeChangeReason::AiPrompt).unwrap();
        assert_eq!(reason, r#""ai_prompt""#);
        let kind = serde_json::to_string(&ViolationKind::AiActionInHumanMode).unwrap();
        assert_eq!(kind, r#""ai_action_in_human_mode""#);
    }
}
