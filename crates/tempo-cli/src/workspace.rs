use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tempo_core::SystemClock;
use tempo_session::{Recorder, TelemetryConfig};
use tempo_store::{FileStateStore, LockGuard};

/// Canonical workspace root, so ids match what the recorder computes.
pub fn resolve_root(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = match arg {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    root.canonicalize()
        .with_context(|| format!("workspace not found: {}", root.display()))
}

/// `<store_root>/workspaces/<workspace_id>/`, created on demand.
pub fn store_dir(root: &Path) -> anyhow::Result<PathBuf> {
    let dir = tempo_store::workspace_dir(&tempo_store::workspace_id(root));
    tempo_store::ensure_dirs(&dir)?;
    Ok(dir)
}

/// Held for as long as this process may write the workspace's session.
pub fn lock(root: &Path) -> anyhow::Result<LockGuard> {
    tempo_store::lock_file(&store_dir(root)?.join("recorder.lock"))
}

pub fn recorder(root: &Path) -> anyhow::Result<Recorder> {
    let config = TelemetryConfig::load(root)?;
    let store = FileStateStore::new(store_dir(root)?.join("state"));
    Ok(Recorder::new(config, Arc::new(store), Arc::new(SystemClock))
        .with_extension_version(concat!("tempo-cli/", env!("CARGO_PKG_VERSION"))))
}
