use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::filter::ScanFilter;

/// Size of one workspace file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub loc: u64,
    pub bytes: u64,
}

/// Workspace-relative path (forward slashes) → stat, ordered by path.
pub type FileMap = BTreeMap<String, FileStat>;

/// Aggregate totals plus the per-file map of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub files: u64,
    pub loc: u64,
    pub bytes: u64,
    pub file_map: FileMap,
}

impl WorkspaceSnapshot {
    fn insert(&mut self, rel_path: String, stat: FileStat) {
        self.files += 1;
        self.loc += stat.loc;
        self.bytes += stat.bytes;
        self.file_map.insert(rel_path, stat);
    }
}

/// Lines of code: line terminators + 1.
pub fn count_lines(data: &[u8]) -> u64 {
    data.iter().filter(|&&b| b == b'\n').count() as u64 + 1
}

/// Stat a single file (also used by file lifecycle producers).
pub fn file_stat(path: &Path) -> io::Result<FileStat> {
    let data = std::fs::read(path)?;
    Ok(FileStat {
        loc: count_lines(&data),
        bytes: data.len() as u64,
    })
}

/// Walk `root` and stat every file the filter accepts.
/// Unreadable entries are skipped.
pub fn scan_workspace(root: &Path, filter: &ScanFilter) -> WorkspaceSnapshot {
    let mut snapshot = WorkspaceSnapshot::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(ScanFilter::is_excluded_dir))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_path = rel.to_string_lossy().replace('\\', "/");
        if !filter.accepts(&rel_path) {
            continue;
        }
        match file_stat(entry.path()) {
            Ok(stat) => snapshot.insert(rel_path, stat),
            Err(e) => tracing::debug!(path = %rel_path, error = %e, "skipping unreadable file"),
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn line_count_is_terminators_plus_one() {
        assert_eq!(count_lines(b""), 1);
        assert_eq!(count_lines(b"one"), 1);
        assert_eq!(count_lines(b"one\ntwo"), 2);
        assert_eq!(count_lines(b"one\ntwo\n"), 3);
    }

    #[test]
    fn file_stat_reads_size_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "fn main() {\n}\n").unwrap();
        let stat = file_stat(&path).unwrap();
        assert_eq!(stat, FileStat { loc: 3, bytes: 14 });
        assert!(file_stat(&dir.path().join("missing.rs")).is_err());
    }

    #[test]
    fn scan_skips_excluded_dirs_and_filtered_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("src/lib.rs"), "a\nb").unwrap();
        fs::write(root.join("src/nested/mod.rs"), "x").unwrap();
        fs::write(root.join("src/notes.md"), "ignored").unwrap();
        fs::write(root.join("node_modules/pkg/index.rs"), "ignored").unwrap();
        fs::write(root.join(".git/config.rs"), "ignored").unwrap();
        fs::write(root.join("dist/out.rs"), "ignored").unwrap();

        let filter = ScanFilter::new(&["rs".to_string()], &["**/dist/**".to_string()]);
        let snap = scan_workspace(root, &filter);

        let paths: Vec<&str> = snap.file_map.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["src/lib.rs", "src/nested/mod.rs"]);
        assert_eq!(snap.files, 2);
        assert_eq!(snap.loc, 3);
        assert_eq!(snap.bytes, 4);
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snap = scan_workspace(&dir.path().join("gone"), &ScanFilter::new(&[], &[]));
        assert_eq!(snap, WorkspaceSnapshot::default());
    }
}
