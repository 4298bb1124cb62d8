use std::path::{Path, PathBuf};

/// Session log location: `<log_dir>/<session_id>.jsonl`.
pub fn session_log_path(log_dir: &Path, session_id: &str) -> PathBuf {
    log_dir.join(format!("{session_id}.jsonl"))
}

/// Name of the `index`-th rotated sibling of `base`.
///
/// `events.jsonl` → `events.1.jsonl`; a base without extension gets `.1` appended.
/// Index 0 is the base itself.
pub fn rotated_path(base: &Path, index: u32) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}.{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{index}"),
    };
    base.with_file_name(name)
}
