//! Best-effort repository head lookup. Reads `.git` files directly; never
//! shells out and never fails.

use std::io;
use std::path::{Path, PathBuf};

pub const NOT_A_REPOSITORY: &str = "not a repository";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHead {
    Branch {
        name: String,
        commit: Option<String>,
    },
    Detached {
        commit: String,
    },
    NotARepository,
}

impl GitHead {
    /// Branch name, detached commit, or "not a repository".
    pub fn label(&self) -> String {
        match self {
            GitHead::Branch { name, .. } => name.clone(),
            GitHead::Detached { commit } => commit.clone(),
            GitHead::NotARepository => NOT_A_REPOSITORY.to_string(),
        }
    }

    pub fn commit(&self) -> Option<&str> {
        match self {
            GitHead::Branch { commit, .. } => commit.as_deref(),
            GitHead::Detached { commit } => Some(commit),
            GitHead::NotARepository => None,
        }
    }
}

pub fn read_git_head(root: &Path) -> GitHead {
    match try_read_head(root) {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!(root = %root.display(), error = %e, "no readable git head");
            GitHead::NotARepository
        }
    }
}

fn try_read_head(root: &Path) -> io::Result<GitHead> {
    let git_dir = locate_git_dir(root)?;
    let head = std::fs::read_to_string(git_dir.join("HEAD"))?;
    let head = head.trim();

    if let Some(refname) = head.strip_prefix("ref:") {
        let refname = refname.trim();
        let name = refname
            .strip_prefix("refs/heads/")
            .unwrap_or(refname)
            .to_string();
        let commit = resolve_ref(&git_dir, refname);
        return Ok(GitHead::Branch { name, commit });
    }
    if is_object_id(head) {
        return Ok(GitHead::Detached {
            commit: head.to_string(),
        });
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "unrecognized HEAD"))
}

/// `.git` is a directory, or a file pointing elsewhere (`gitdir: <path>`) for worktrees.
fn locate_git_dir(root: &Path) -> io::Result<PathBuf> {
    let dot_git = root.join(".git");
    if dot_git.is_dir() {
        return Ok(dot_git);
    }
    let content = std::fs::read_to_string(&dot_git)?;
    let target = content
        .trim()
        .strip_prefix("gitdir:")
        .map(str::trim)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed .git file"))?;
    let target = Path::new(target);
    Ok(if target.is_absolute() {
        target.to_path_buf()
    } else {
        root.join(target)
    })
}

fn resolve_ref(git_dir: &Path, refname: &str) -> Option<String> {
    let mut dirs = vec![git_dir.to_path_buf()];
    // Linked worktrees keep branch refs in the common dir.
    if let Ok(common) = std::fs::read_to_string(git_dir.join("commondir")) {
        dirs.push(git_dir.join(common.trim()));
    }
    for dir in &dirs {
        if let Ok(content) = std::fs::read_to_string(dir.join(refname)) {
            let id = content.trim();
            if is_object_id(id) {
                return Some(id.to_string());
            }
        }
        if let Some(id) = find_packed_ref(dir, refname) {
            return Some(id);
        }
    }
    None
}

fn find_packed_ref(dir: &Path, refname: &str) -> Option<String> {
    let packed = std::fs::read_to_string(dir.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter(|l| !l.starts_with('#') && !l.starts_with('^'))
        .find_map(|line| {
            let (id, name) = line.split_once(' ')?;
            (name.trim() == refname && is_object_id(id)).then(|| id.to_string())
        })
}

fn is_object_id(s: &str) -> bool {
    (s.len() == 40 || s.len() == 64) && s.chars().all(|c| c.is_ascii_hexdigit())
}
