use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempo_workspace::{SnapshotSettings, DEFAULT_CACHE_TTL_MS};

use crate::error::ConfigError;

const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 300_000;
const DEFAULT_PASTE_LIKE_THRESHOLD: usize = 50;
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["**/*.min.js", "**/dist/**", "**/build/**"];

const DEFAULT_TARGET_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "py", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "scala", "sh", "sql", "html", "css", "scss", "vue", "svelte",
];

/// Per-workspace recorder settings. Every field has a default, so a partial
/// `config.json` is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Keep full prompt text in `ai_prompt` records instead of a short preview.
    pub store_prompt_text: bool,
    /// Where session logs go; `None` means `<workspace_dir>/logs`.
    pub log_directory: Option<PathBuf>,
    /// 0 disables periodic snapshots.
    pub snapshot_interval_ms: u64,
    pub paste_like_threshold: usize,
    pub exclude_patterns: Vec<String>,
    /// Empty means every extension.
    pub target_extensions: Vec<String>,
    /// Rotation cap per log file; 0 disables rotation.
    pub max_file_size_mb: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            store_prompt_text: false,
            log_directory: None,
            snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
            paste_like_threshold: DEFAULT_PASTE_LIKE_THRESHOLD,
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            target_extensions: DEFAULT_TARGET_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
        }
    }
}

/// `<workspace>/.tempo/config.json`
pub fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".tempo").join("config.json")
}

impl TelemetryConfig {
    /// Load the workspace config file (missing → defaults), then apply
    /// `TEMPO_*` environment overrides.
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&config_path(workspace_root))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup. Unparsable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TEMPO_STORE_PROMPT_TEXT") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.store_prompt_text = true,
                "0" | "false" | "no" | "off" => self.store_prompt_text = false,
                other => tracing::warn!(value = %other, "ignoring TEMPO_STORE_PROMPT_TEXT"),
            }
        }
        if let Some(v) = lookup("TEMPO_LOG_DIR") {
            if !v.trim().is_empty() {
                self.log_directory = Some(PathBuf::from(v.trim()));
            }
        }
        if let Some(v) = lookup("TEMPO_SNAPSHOT_INTERVAL_MS") {
            match v.trim().parse() {
                Ok(ms) => self.snapshot_interval_ms = ms,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring TEMPO_SNAPSHOT_INTERVAL_MS"),
            }
        }
        if let Some(v) = lookup("TEMPO_MAX_FILE_SIZE_MB") {
            match v.trim().parse() {
                Ok(mb) => self.max_file_size_mb = mb,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring TEMPO_MAX_FILE_SIZE_MB"),
            }
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings {
            interval_ms: self.snapshot_interval_ms,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            target_extensions: self.target_extensions.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = TelemetryConfig::default();
        assert!(!c.store_prompt_text);
        assert_eq!(c.snapshot_interval_ms, 300_000);
        assert_eq!(c.paste_like_threshold, 50);
        assert_eq!(c.max_file_size_bytes(), 10 * 1024 * 1024);
        assert!(c.exclude_patterns.contains(&"**/dist/**".to_string()));
        assert!(c.target_extensions.contains(&"rs".to_string()));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = TelemetryConfig::from_file(&config_path(dir.path())).unwrap();
        assert_eq!(c, TelemetryConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"store_prompt_text": true, "target_extensions": []}"#).unwrap();

        let c = TelemetryConfig::from_file(&path).unwrap();
        assert!(c.store_prompt_text);
        assert!(c.target_extensions.is_empty());
        assert_eq!(c.snapshot_interval_ms, 300_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TelemetryConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("TEMPO_STORE_PROMPT_TEXT", "yes"),
            ("TEMPO_LOG_DIR", "/tmp/tempo-logs"),
            ("TEMPO_SNAPSHOT_INTERVAL_MS", "soon"),
            ("TEMPO_MAX_FILE_SIZE_MB", "0"),
        ]
        .into_iter()
        .collect();

        let mut c = TelemetryConfig::default();
        c.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert!(c.store_prompt_text);
        assert_eq!(c.log_directory, Some(PathBuf::from("/tmp/tempo-logs")));
        assert_eq!(c.snapshot_interval_ms, 300_000);
        assert_eq!(c.max_file_size_bytes(), 0);
    }

    #[test]
    fn snapshot_settings_follow_config() {
        let c = TelemetryConfig {
            snapshot_interval_ms: 1_000,
            ..TelemetryConfig::default()
        };
        let s = c.snapshot_settings();
        assert_eq!(s.interval_ms, 1_000);
        assert_eq!(s.cache_ttl_ms, DEFAULT_CACHE_TTL_MS);
        assert_eq!(s.exclude_patterns, c.exclude_patterns);
    }
}
