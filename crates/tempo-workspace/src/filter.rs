use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directories never descended into: version control and dependency trees.
pub const ALWAYS_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "target",
    ".venv",
    "__pycache__",
    ".tempo",
];

/// Which workspace files count toward a snapshot.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl ScanFilter {
    /// An empty extension list accepts every extension.
    /// Invalid exclude globs are logged and ignored.
    pub fn new(target_extensions: &[String], exclude_patterns: &[String]) -> Self {
        let extensions = target_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern"),
            }
        }
        let excludes = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "exclude patterns unusable; excluding nothing");
            GlobSet::empty()
        });

        Self {
            extensions,
            excludes,
        }
    }

    pub fn is_excluded_dir(name: &str) -> bool {
        ALWAYS_EXCLUDED_DIRS.contains(&name)
    }

    /// Check a workspace-relative path (forward slashes).
    pub fn accepts(&self, rel_path: &str) -> bool {
        let path = Path::new(rel_path);
        if !self.extensions.is_empty() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            match ext {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }
        if self.excludes.is_match(rel_path) {
            return false;
        }
        // Also try matching against just the file name
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        !self.excludes.is_match(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let f = ScanFilter::new(&strings(&[".rs", "TS"]), &[]);
        assert!(f.accepts("src/main.rs"));
        assert!(f.accepts("web/App.ts"));
        assert!(f.accepts("web/Upper.RS"));
        assert!(!f.accepts("README.md"));
        assert!(!f.accepts("Makefile"));
    }

    #[test]
    fn empty_extension_list_accepts_all() {
        let f = ScanFilter::new(&[], &[]);
        assert!(f.accepts("Makefile"));
        assert!(f.accepts("a/b/c.weird"));
    }

    #[test]
    fn exclude_globs_match_path_or_name() {
        let f = ScanFilter::new(&[], &strings(&["**/dist/**", "*.min.js"]));
        assert!(!f.accepts("dist/bundle.js"));
        assert!(!f.accepts("web/dist/app.js"));
        assert!(!f.accepts("web/vendor.min.js"));
        assert!(f.accepts("web/app.js"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let f = ScanFilter::new(&[], &strings(&["a[", "*.log"]));
        assert!(!f.accepts("debug.log"));
        assert!(f.accepts("a["));
    }

    #[test]
    fn always_excluded_dirs() {
        assert!(ScanFilter::is_excluded_dir(".git"));
        assert!(ScanFilter::is_excluded_dir("node_modules"));
        assert!(!ScanFilter::is_excluded_dir("src"));
    }
}
