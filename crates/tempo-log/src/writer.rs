//! The session event log writer.
//!
//! Producers call [`EventLog::emit`] from any thread. Events go through a
//! bounded queue to a single worker thread that owns the file, so records
//! are appended whole and in emit order. [`EventLog::flush`] blocks until
//! every accepted event has been written; [`EventLog::close`] flushes and
//! then releases the file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tempo_core::Event;

use crate::rotate::RotatingFile;

/// Default number of events that may wait in the queue before producers block.
pub const QUEUE_CAPACITY: usize = 4096;

/// Records written between two flushes of the file buffer, at most.
const MAX_BATCH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot open event log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start event log writer: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Counters describing what the writer has done so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStats {
    pub written: u64,
    pub failed: u64,
    pub rotations: u32,
    pub current_path: PathBuf,
}

enum Command {
    Append(Event),
    Shutdown,
}

struct Progress {
    /// Accepted by `emit` but not yet written.
    in_flight: usize,
    /// The queue was full at some point and has not been emptied since.
    drain_pending: bool,
    worker_done: bool,
    stats: LogStats,
}

struct Shared {
    progress: Mutex<Progress>,
    drained: Condvar,
    max_bytes: AtomicU64,
}

impl Shared {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Append-only, size-rotated JSONL writer for one session.
pub struct EventLog {
    path: PathBuf,
    shared: Arc<Shared>,
    tx: Mutex<Option<SyncSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLog {
    /// Open (or continue) the log at `path` in append mode.
    /// `max_file_size_bytes == 0` disables rotation.
    pub fn open(path: impl Into<PathBuf>, max_file_size_bytes: u64) -> Result<Self, LogError> {
        Self::with_capacity(path, max_file_size_bytes, QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        path: impl Into<PathBuf>,
        max_file_size_bytes: u64,
        capacity: usize,
    ) -> Result<Self, LogError> {
        let path = path.into();
        let file = RotatingFile::open(&path).map_err(|source| LogError::Open {
            path: path.clone(),
            source,
        })?;

        let shared = Arc::new(Shared {
            progress: Mutex::new(Progress {
                in_flight: 0,
                drain_pending: false,
                worker_done: false,
                stats: LogStats {
                    written: 0,
                    failed: 0,
                    rotations: 0,
                    current_path: file.current_path().to_path_buf(),
                },
            }),
            drained: Condvar::new(),
            max_bytes: AtomicU64::new(max_file_size_bytes),
        });

        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("tempo-log-writer".to_string())
            .spawn(move || run_worker(rx, file, worker_shared))
            .map_err(LogError::Spawn)?;

        tracing::debug!(path = %path.display(), max_file_size_bytes, "event log opened");

        Ok(Self {
            path,
            shared,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Base path this log was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an event for writing. Never fails; problems are logged.
    pub fn emit(&self, event: Event) {
        // Holding the sender lock across the send keeps queue order equal to emit order.
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = tx.as_ref() else {
            tracing::warn!(event = event.tag(), "event log closed; dropping event");
            return;
        };

        self.shared.progress().in_flight += 1;

        let outcome = match sender.try_send(Command::Append(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                self.shared.progress().drain_pending = true;
                tracing::debug!("event log queue full; waiting for drain");
                sender.send(cmd).map_err(|e| e.0)
            }
            Err(TrySendError::Disconnected(cmd)) => Err(cmd),
        };

        if let Err(Command::Append(event)) = outcome {
            tracing::warn!(event = event.tag(), "event log writer stopped; dropping event");
            let mut progress = self.shared.progress();
            progress.in_flight = progress.in_flight.saturating_sub(1);
            progress.stats.failed += 1;
            self.shared.drained.notify_all();
        }
    }

    /// Block until every event accepted so far has been written and flushed.
    pub fn flush(&self) {
        let mut progress = self.shared.progress();
        while (progress.in_flight > 0 || progress.drain_pending) && !progress.worker_done {
            progress = self
                .shared
                .drained
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Flush, then stop the writer and release the file. Idempotent.
    pub fn close(&self) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            self.flush();
            let _ = sender.send(Command::Shutdown);
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(path = %self.path.display(), "event log writer panicked");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Events accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.shared.progress().in_flight
    }

    pub fn stats(&self) -> LogStats {
        self.shared.progress().stats.clone()
    }

    /// Change the rotation cap; applies from the next record.
    pub fn set_max_file_size(&self, bytes: u64) {
        self.shared.max_bytes.store(bytes, Ordering::Relaxed);
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Marks the worker finished even if it unwinds, so `flush` never waits forever.
struct WorkerDone(Arc<Shared>);

impl Drop for WorkerDone {
    fn drop(&mut self) {
        self.0.progress().worker_done = true;
        self.0.drained.notify_all();
    }
}

fn run_worker(rx: Receiver<Command>, mut file: RotatingFile, shared: Arc<Shared>) {
    let _done = WorkerDone(Arc::clone(&shared));
    let mut shutdown = false;

    while !shutdown {
        let Ok(mut cmd) = rx.recv() else { break };
        let mut handled = 0usize;
        let mut written = 0u64;
        let mut failed = 0u64;
        let mut queue_empty = false;

        loop {
            match cmd {
                Command::Append(event) => {
                    handled += 1;
                    let max_bytes = shared.max_bytes.load(Ordering::Relaxed);
                    match write_record(&mut file, &event, max_bytes) {
                        Ok(()) => written += 1,
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(
                                path = %file.current_path().display(),
                                event = event.tag(),
                                error = %e,
                                "failed to append event"
                            );
                        }
                    }
                }
                Command::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
            if handled >= MAX_BATCH {
                break;
            }
            match rx.try_recv() {
                Ok(next) => cmd = next,
                Err(_) => {
                    queue_empty = true;
                    break;
                }
            }
        }

        if let Err(e) = file.flush() {
            tracing::warn!(path = %file.current_path().display(), error = %e, "failed to flush event log");
        }

        let mut progress = shared.progress();
        progress.in_flight = progress.in_flight.saturating_sub(handled);
        progress.stats.written += written;
        progress.stats.failed += failed;
        progress.stats.rotations = file.rotations();
        progress.stats.current_path = file.current_path().to_path_buf();
        if queue_empty {
            progress.drain_pending = false;
        }
        drop(progress);
        shared.drained.notify_all();
    }

    if let Err(e) = file.sync() {
        tracing::warn!(path = %file.current_path().display(), error = %e, "failed to sync event log");
    }
}

fn write_record(file: &mut RotatingFile, event: &Event, max_bytes: u64) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    file.append(&line, max_bytes)?;
    Ok(())
}
