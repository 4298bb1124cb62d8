//! Error types for session lifecycle and configuration.

use std::path::PathBuf;

use tempo_log::LogError;

/// Why a session operation was refused or failed.
///
/// A refused transition leaves the recorder state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────
    #[error("a session is already active")]
    AlreadyActive,

    #[error("no active session")]
    NotActive,

    #[error("no paused session to resume")]
    NoSavedSession,

    #[error("workspace root is not a directory: {0}")]
    MissingWorkspace(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Event log
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Log(#[from] LogError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
