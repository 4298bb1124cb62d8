//! Size-bounded append-only file with numbered rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::paths::rotated_path;

/// The file currently being appended to, plus its rotation bookkeeping.
#[derive(Debug)]
pub struct RotatingFile {
    base: PathBuf,
    index: u32,
    current: PathBuf,
    out: BufWriter<File>,
    bytes_written: u64,
    rotations: u32,
}

impl RotatingFile {
    /// Open the log in append mode, creating parent dirs if needed.
    /// A log that already rotated continues in its newest sibling.
    pub fn open(base: &Path) -> io::Result<Self> {
        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut index = 0;
        while rotated_path(base, index + 1).is_file() {
            index += 1;
        }
        let current = rotated_path(base, index);
        let (out, bytes_written) = open_append(&current)?;
        Ok(Self {
            base: base.to_path_buf(),
            index,
            current,
            out,
            bytes_written,
            rotations: 0,
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.current
    }

    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append one complete record. Rotates first if the current file has
    /// reached `max_bytes` (0 disables rotation), so a record never spans files.
    pub fn append(&mut self, record: &[u8], max_bytes: u64) -> io::Result<()> {
        if max_bytes > 0 && self.bytes_written >= max_bytes {
            self.rotate()?;
        }
        self.out.write_all(record)?;
        self.bytes_written += record.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Flush buffered records and ask the OS to persist them.
    pub fn sync(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_data()
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.out.flush()?;
        let next_index = self.index + 1;
        let next = rotated_path(&self.base, next_index);
        let (out, existing) = open_append(&next)?;
        tracing::debug!(
            from = %self.current.display(),
            to = %next.display(),
            bytes = self.bytes_written,
            "rotating event log"
        );
        // Dropping the old writer closes the previous file.
        self.out = out;
        self.index = next_index;
        self.current = next;
        self.bytes_written = existing;
        self.rotations += 1;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((BufWriter::new(file), len))
}
