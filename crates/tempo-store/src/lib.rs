//! Per-user storage for tempo: where workspaces keep their logs and
//! resume state, plus the small file primitives the recorder relies on.

pub mod layout;
pub mod lock;
pub mod state;

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

pub use layout::{ensure_dirs, store_root, workspace_dir, workspace_id};
pub use lock::{lock_file, LockGuard};
pub use state::{FileStateStore, MemoryStateStore, StateStore};

/// Replace `path` with `data` in one step: write a sibling temp file, sync
/// it, then rename it over the target. Parent dirs are created as needed.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        // no temp files left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn write_atomic_needs_a_parent() {
        assert!(write_atomic(Path::new(""), b"x").is_err());
    }
}
