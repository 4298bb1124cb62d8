//! On-disk layout of the per-user store:
//!
//! ```text
//! <store_root>/workspaces/<workspace_id>/
//!     logs/            session logs (unless configured elsewhere)
//!     state/           resumable session record
//!     recorder.lock
//! ```

use std::fs;
use std::path::{Path, PathBuf};

/// Stable id for a workspace: first 32 hex chars of the blake3 hash of its
/// canonical path. Case-insensitive on Windows.
pub fn workspace_id(root: &Path) -> String {
    let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut key = canonical.to_string_lossy().replace('\\', "/");
    if cfg!(windows) {
        key = key.to_lowercase();
    }
    let hash = blake3::hash(key.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// `TEMPO_STORE_DIR` if set, else `<data_dir>/tempo`, else `~/.tempo`,
/// else `./.tempo-store`.
pub fn store_root() -> PathBuf {
    if let Some(dir) = std::env::var_os("TEMPO_STORE_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("tempo"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".tempo")))
        .unwrap_or_else(|| PathBuf::from(".tempo-store"))
}

pub fn workspace_dir(workspace_id: &str) -> PathBuf {
    store_root().join("workspaces").join(workspace_id)
}

/// Create `logs/` and `state/` under a workspace directory.
pub fn ensure_dirs(base: &Path) -> anyhow::Result<()> {
    for sub in ["logs", "state"] {
        fs::create_dir_all(base.join(sub))?;
    }
    Ok(())
}
