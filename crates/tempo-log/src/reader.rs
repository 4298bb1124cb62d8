use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempo_core::Event;

use crate::paths::rotated_path;

/// The base log file followed by its rotated siblings, in rotation order.
/// Stops at the first missing index.
pub fn log_files(base: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut index = 0;
    loop {
        let path = rotated_path(base, index);
        if !path.is_file() {
            break;
        }
        files.push(path);
        index += 1;
    }
    files
}

/// Read every event of a session log, across rotated files.
pub fn read_events(base: &Path) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::new();
    for path in log_files(base) {
        let file = std::fs::File::open(&path)
            .with_context(|| format!("opening event log: {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).with_context(|| {
                format!("parsing {}:{}", path.display(), lineno + 1)
            })?;
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("none.jsonl");
        assert!(log_files(&base).is_empty());
        assert!(read_events(&base).unwrap().is_empty());
    }

    #[test]
    fn corrupt_line_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("s.jsonl");
        std::fs::write(&base, "\n{oops\n").unwrap();
        let err = read_events(&base).unwrap_err();
        assert!(format!("{err:#}").contains("s.jsonl:2"));
    }

    #[test]
    fn rotated_files_listed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("s.jsonl");
        std::fs::write(&base, "").unwrap();
        std::fs::write(dir.path().join("s.1.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("s.2.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("s.4.jsonl"), "").unwrap();
        let files = log_files(&base);
        assert_eq!(files.len(), 3);
        assert_eq!(files[2], dir.path().join("s.2.jsonl"));
    }
}
