//! Turns a batch of editor text changes into `edit` record fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One contiguous replacement reported by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    /// Zero-based first line of the replaced range.
    pub start_line: u32,
    /// Zero-based last line of the replaced range.
    pub end_line: u32,
    /// Characters replaced.
    pub replaced_len: u64,
    /// The replaced text, when the editor provides it. Needed for undo/redo detection.
    #[serde(default)]
    pub replaced_text: Option<String>,
    /// Inserted text.
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditSummary {
    pub chars_added: u64,
    pub chars_deleted: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub is_paste: bool,
    pub is_undo: bool,
    pub is_redo: bool,
}

#[derive(Debug, Clone)]
struct LastBatch {
    inserted: String,
    /// `None` when some replaced text was not reported.
    removed: Option<String>,
    undo: bool,
}

/// Stateful classifier; keeps the last batch per file.
///
/// Undo/redo detection is approximate: a batch that exactly reverses the
/// previous batch on the same file counts as an undo, and one that reverses
/// an undo counts as a redo. Deleting text just typed also looks like an undo.
#[derive(Debug, Default)]
pub struct EditClassifier {
    last: HashMap<String, LastBatch>,
}

impl EditClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(
        &mut self,
        file: &str,
        changes: &[TextChange],
        paste_like_threshold: usize,
    ) -> EditSummary {
        let mut summary = EditSummary::default();
        let mut inserted = String::new();
        let mut removed = Some(String::new());

        for change in changes {
            let added_chars = change.text.chars().count();
            summary.chars_added += added_chars as u64;
            summary.chars_deleted += change.replaced_len;
            summary.lines_added += change.text.matches('\n').count() as u64;
            summary.lines_removed += change.end_line.saturating_sub(change.start_line) as u64;
            if paste_like_threshold > 0 && added_chars >= paste_like_threshold {
                summary.is_paste = true;
            }

            inserted.push_str(&change.text);
            match (&mut removed, &change.replaced_text) {
                (Some(acc), Some(text)) => acc.push_str(text),
                (Some(_), None) if change.replaced_len > 0 => removed = None,
                _ => {}
            }
        }

        if let (Some(prev), Some(removed)) = (self.last.get(file), removed.as_ref()) {
            let reverses = (!inserted.is_empty() || !removed.is_empty())
                && prev.removed.as_deref() == Some(inserted.as_str())
                && prev.inserted == *removed;
            if reverses {
                if prev.undo {
                    summary.is_redo = true;
                } else {
                    summary.is_undo = true;
                }
            }
        }
        if summary.is_undo || summary.is_redo {
            summary.is_paste = false;
        }

        self.last.insert(
            file.to_string(),
            LastBatch {
                inserted,
                removed,
                undo: summary.is_undo,
            },
        );
        summary
    }

    /// Drop history for a file (deleted or closed).
    pub fn forget(&mut self, file: &str) {
        self.last.remove(file);
    }
}
