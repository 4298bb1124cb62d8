//! Workspace snapshots: what files exist, how big they are, and what changed
//! since the previous scan.

pub mod diff;
pub mod engine;
pub mod filter;
pub mod git;
pub mod scan;

pub use diff::{diff_file_maps, WorkspaceDiff};
pub use engine::{SnapshotEngine, SnapshotOutcome, SnapshotSettings, DEFAULT_CACHE_TTL_MS};
pub use filter::ScanFilter;
pub use git::{read_git_head, GitHead};
pub use scan::{count_lines, file_stat, scan_workspace, FileMap, FileStat, WorkspaceSnapshot};
