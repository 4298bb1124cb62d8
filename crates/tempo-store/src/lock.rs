use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// Exclusive advisory lock on a file. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    _file: File,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the lock without waiting. Fails if another process holds it.
pub fn lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("cannot open lock file {}", path.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("workspace is locked by another recorder ({})", path.display()))?;
    tracing::debug!(path = %path.display(), "workspace lock taken");
    Ok(LockGuard {
        path: path.to_path_buf(),
        _file: file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_fails_while_first_held() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("recorder.lock");
        let guard = lock_file(&lock_path).unwrap();
        assert_eq!(guard.path(), lock_path);
        assert!(lock_file(&lock_path).is_err());
        drop(guard);
        let _again = lock_file(&lock_path).unwrap();
    }
}
