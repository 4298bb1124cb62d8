use tempo_core::EventKind;

use crate::scan::FileMap;

/// Delta between two consecutive scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceDiff {
    pub added_files: u64,
    pub removed_files: u64,
    pub added_loc: u64,
    pub removed_loc: u64,
    pub added_bytes: u64,
    pub removed_bytes: u64,
    pub added_paths: Vec<String>,
    pub removed_paths: Vec<String>,
}

impl WorkspaceDiff {
    /// True when all six aggregate fields are zero.
    pub fn is_empty(&self) -> bool {
        self.added_files == 0
            && self.removed_files == 0
            && self.added_loc == 0
            && self.removed_loc == 0
            && self.added_bytes == 0
            && self.removed_bytes == 0
    }

    pub fn to_event(&self) -> EventKind {
        EventKind::WorkspaceDiff {
            added_files: self.added_files,
            removed_files: self.removed_files,
            added_loc: self.added_loc,
            removed_loc: self.removed_loc,
            added_bytes: self.added_bytes,
            removed_bytes: self.removed_bytes,
            added_paths: self.added_paths.clone(),
            removed_paths: self.removed_paths.clone(),
        }
    }
}

/// Compare two file maps.
///
/// New paths add their full size, vanished paths remove theirs, and paths in
/// both contribute only the signed change (growth → added, shrink → removed).
pub fn diff_file_maps(previous: &FileMap, current: &FileMap) -> WorkspaceDiff {
    let mut diff = WorkspaceDiff::default();

    for (path, cur) in current {
        match previous.get(path) {
            None => {
                diff.added_files += 1;
                diff.added_loc += cur.loc;
                diff.added_bytes += cur.bytes;
                diff.added_paths.push(path.clone());
            }
            Some(prev) => {
                if cur.loc >= prev.loc {
                    diff.added_loc += cur.loc - prev.loc;
                } else {
                    diff.removed_loc += prev.loc - cur.loc;
                }
                if cur.bytes >= prev.bytes {
                    diff.added_bytes += cur.bytes - prev.bytes;
                } else {
                    diff.removed_bytes += prev.bytes - cur.bytes;
                }
            }
        }
    }

    for (path, prev) in previous {
        if !current.contains_key(path) {
            diff.removed_files += 1;
            diff.removed_loc += prev.loc;
            diff.removed_bytes += prev.bytes;
            diff.removed_paths.push(path.clone());
        }
    }

    diff
}
