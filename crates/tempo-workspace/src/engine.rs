//! Periodic and on-demand workspace snapshots with incremental diffs.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tempo_core::{Clock, Emitter, EventKind};

use crate::diff::{diff_file_maps, WorkspaceDiff};
use crate::filter::ScanFilter;
use crate::git::{read_git_head, GitHead};
use crate::scan::{scan_workspace, WorkspaceSnapshot};

/// How long a scan result is reused before the workspace is walked again.
pub const DEFAULT_CACHE_TTL_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSettings {
    /// Period of the background timer; 0 disables it.
    pub interval_ms: u64,
    pub cache_ttl_ms: u64,
    pub target_extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            target_extensions: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// What one `take_snapshot` call observed and emitted.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    pub files: u64,
    pub loc: u64,
    pub bytes: u64,
    pub git_head: GitHead,
    /// Emitted diff, if any.
    pub diff: Option<WorkspaceDiff>,
    pub from_cache: bool,
}

struct CachedScan {
    taken_at_ms: i64,
    snapshot: Arc<WorkspaceSnapshot>,
}

struct EngineState {
    filter: ScanFilter,
    cache: Option<CachedScan>,
    previous: Option<Arc<WorkspaceSnapshot>>,
}

struct Inner {
    root: PathBuf,
    emitter: Arc<dyn Emitter>,
    clock: Arc<dyn Clock>,
    settings: Mutex<SnapshotSettings>,
    /// Held for a whole snapshot, so timer and on-demand calls never overlap.
    state: Mutex<EngineState>,
}

impl Inner {
    fn settings(&self) -> MutexGuard<'_, SnapshotSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_snapshot(&self) -> SnapshotOutcome {
        let mut state = self.state();
        let ttl_ms = self.settings().cache_ttl_ms as i64;
        let now = self.clock.now_ms();

        let cached = state
            .cache
            .as_ref()
            .filter(|c| now >= c.taken_at_ms && now - c.taken_at_ms < ttl_ms)
            .map(|c| Arc::clone(&c.snapshot));
        let from_cache = cached.is_some();
        let current = match cached {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = Arc::new(scan_workspace(&self.root, &state.filter));
                tracing::debug!(
                    root = %self.root.display(),
                    files = snapshot.files,
                    loc = snapshot.loc,
                    "workspace scanned"
                );
                state.cache = Some(CachedScan {
                    taken_at_ms: now,
                    snapshot: Arc::clone(&snapshot),
                });
                snapshot
            }
        };

        let git_head = read_git_head(&self.root);
        self.emitter.emit(EventKind::Snapshot {
            files: current.files,
            loc: current.loc,
            bytes: current.bytes,
            git_head: git_head.label(),
            git_commit: git_head.commit().map(str::to_string),
        });

        // The first scan of a session has no baseline and never diffs.
        let diff = state
            .previous
            .as_ref()
            .map(|prev| diff_file_maps(&prev.file_map, &current.file_map))
            .filter(|d| !d.is_empty());
        if let Some(diff) = &diff {
            self.emitter.emit(diff.to_event());
        }
        state.previous = Some(Arc::clone(&current));

        SnapshotOutcome {
            files: current.files,
            loc: current.loc,
            bytes: current.bytes,
            git_head,
            diff,
            from_cache,
        }
    }
}

struct Periodic {
    interval_ms: u64,
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the snapshot cache, the previous file map and the background timer
/// for one session.
pub struct SnapshotEngine {
    inner: Arc<Inner>,
    periodic: Mutex<Option<Periodic>>,
}

impl SnapshotEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: SnapshotSettings,
        emitter: Arc<dyn Emitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filter = ScanFilter::new(&settings.target_extensions, &settings.exclude_patterns);
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                emitter,
                clock,
                settings: Mutex::new(settings),
                state: Mutex::new(EngineState {
                    filter,
                    cache: None,
                    previous: None,
                }),
            }),
            periodic: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn settings(&self) -> SnapshotSettings {
        self.inner.settings().clone()
    }

    /// Scan (or reuse a fresh cached scan), emit `snapshot`, and emit
    /// `workspace_diff` when something changed since the previous call.
    pub fn take_snapshot(&self) -> SnapshotOutcome {
        self.inner.take_snapshot()
    }

    /// Force the next snapshot to walk the workspace.
    pub fn invalidate_cache(&self) {
        self.inner.state().cache = None;
    }

    /// Start (or restart) the background timer. An interval of 0 only stops it.
    pub fn start_periodic(&self, interval_ms: u64) {
        let mut periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = periodic.take() {
            stop_timer(old);
        }
        if interval_ms == 0 {
            return;
        }

        let (stop, stop_rx) = mpsc::channel::<()>();
        let inner = Arc::clone(&self.inner);
        let interval = Duration::from_millis(interval_ms);
        let spawned = std::thread::Builder::new()
            .name("tempo-snapshot".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        inner.take_snapshot();
                    }
                    // stop requested or engine dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        match spawned {
            Ok(handle) => {
                tracing::debug!(interval_ms, "periodic snapshots started");
                *periodic = Some(Periodic {
                    interval_ms,
                    stop,
                    handle,
                });
            }
            Err(e) => tracing::warn!(error = %e, "cannot start periodic snapshots"),
        }
    }

    /// Stop the background timer. No-op when it is not running.
    pub fn stop_periodic(&self) {
        let old = self
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(old) = old {
            stop_timer(old);
            tracing::debug!("periodic snapshots stopped");
        }
    }

    pub fn is_periodic_running(&self) -> bool {
        self.periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Apply new settings. Filter changes drop the cache; an interval change
    /// restarts a running timer.
    pub fn update_settings(&self, settings: SnapshotSettings) {
        let (filters_changed, interval_changed) = {
            let mut current = self.inner.settings();
            let filters_changed = current.target_extensions != settings.target_extensions
                || current.exclude_patterns != settings.exclude_patterns;
            let interval_changed = current.interval_ms != settings.interval_ms;
            *current = settings.clone();
            (filters_changed, interval_changed)
        };

        if filters_changed {
            let mut state = self.inner.state();
            state.filter =
                ScanFilter::new(&settings.target_extensions, &settings.exclude_patterns);
            state.cache = None;
        }

        let running_interval = self
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.interval_ms);
        if interval_changed && running_interval.is_some() {
            self.start_periodic(settings.interval_ms);
        }
    }

    /// Stop the timer and drop cached scans.
    pub fn shutdown(&self) {
        self.stop_periodic();
        let mut state = self.inner.state();
        state.cache = None;
        state.previous = None;
    }
}

impl Drop for SnapshotEngine {
    fn drop(&mut self) {
        self.stop_periodic();
    }
}

fn stop_timer(periodic: Periodic) {
    drop(periodic.stop);
    if periodic.handle.join().is_err() {
        tracing::error!("snapshot timer thread panicked");
    }
}
