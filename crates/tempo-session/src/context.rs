//! Per-session identity, timing and attribution.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempo_core::{
    Clock, ControlMode, Emitter, Event, EventKind, ModeChangeReason, SessionId, Stamp,
    WorkspaceId,
};
use tempo_log::EventLog;

use crate::resume::ResumableSession;

/// Session timing. All values are epoch milliseconds except `total_paused_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    pub start_ms: i64,
    pub total_paused_ms: u64,
    /// Set while paused; elapsed time is frozen at this instant.
    pub last_pause_ms: Option<i64>,
}

impl SessionClock {
    pub fn started_at(start_ms: i64) -> Self {
        Self {
            start_ms,
            total_paused_ms: 0,
            last_pause_ms: None,
        }
    }

    /// Active time since start, paused time excluded.
    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        let end = self.last_pause_ms.unwrap_or(now_ms);
        let elapsed = end - self.start_ms - self.total_paused_ms as i64;
        elapsed.max(0) as u64
    }
}

struct Timing {
    clock: SessionClock,
    /// Lowest `ts` the next event may carry.
    ts_floor: i64,
}

/// One recording session: what every event gets stamped with and where it goes.
///
/// Cheap to share; producers on other threads hold it as `Arc<dyn Emitter>`.
pub struct SessionContext {
    session_id: SessionId,
    workspace_id: WorkspaceId,
    workspace_root: PathBuf,
    log: Arc<EventLog>,
    clock: Arc<dyn Clock>,
    tool_version: Option<String>,
    extension_version: Option<String>,
    timing: Mutex<Timing>,
    control_mode: Mutex<ControlMode>,
}

pub struct SessionIdentity {
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    pub workspace_root: PathBuf,
}

impl SessionContext {
    pub fn new(
        identity: SessionIdentity,
        timing: SessionClock,
        control_mode: ControlMode,
        log: Arc<EventLog>,
        clock: Arc<dyn Clock>,
        extension_version: Option<String>,
    ) -> Self {
        Self {
            session_id: identity.session_id,
            workspace_id: identity.workspace_id,
            workspace_root: identity.workspace_root,
            log,
            clock,
            tool_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            extension_version,
            timing: Mutex::new(Timing {
                clock: timing,
                ts_floor: i64::MIN,
            }),
            control_mode: Mutex::new(control_mode),
        }
    }

    /// Rebuild a context from a saved pause, still frozen at `paused_at`.
    pub fn from_saved(
        saved: &ResumableSession,
        log: Arc<EventLog>,
        clock: Arc<dyn Clock>,
        extension_version: Option<String>,
    ) -> Self {
        let ctx = Self::new(
            SessionIdentity {
                session_id: saved.session_id.clone(),
                workspace_id: saved.workspace_id.clone(),
                workspace_root: saved.workspace_root.clone(),
            },
            SessionClock {
                start_ms: saved.start_time,
                total_paused_ms: saved.total_paused_ms,
                last_pause_ms: Some(saved.paused_at),
            },
            saved.control_mode.unwrap_or_default(),
            log,
            clock,
            extension_version,
        );
        // Records written after the pause sort after it.
        ctx.timing().ts_floor = saved.paused_at + 1;
        ctx
    }

    fn timing(&self) -> MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mode(&self) -> MutexGuard<'_, ControlMode> {
        self.control_mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn timing_snapshot(&self) -> SessionClock {
        self.timing().clock
    }

    pub fn elapsed_ms(&self) -> u64 {
        let now = self.clock.now_ms();
        self.timing().clock.elapsed_ms(now)
    }

    pub fn control_mode(&self) -> ControlMode {
        *self.mode()
    }

    /// Stamp `kind` as of `now_ms` and hand it to the log.
    pub fn emit_at(&self, kind: EventKind, now_ms: i64) {
        let stamp = {
            let timing = self.timing();
            Stamp {
                ts: now_ms.max(timing.ts_floor),
                elapsed_ms: timing.clock.elapsed_ms(now_ms),
                session_id: self.session_id.clone(),
                workspace_id: self.workspace_id.clone(),
                tool_version: self.tool_version.clone(),
                extension_version: self.extension_version.clone(),
            }
        };
        self.log.emit(Event::new(stamp, kind));
    }

    /// Freeze elapsed time at `now_ms`.
    pub fn mark_paused(&self, now_ms: i64) {
        self.timing().clock.last_pause_ms = Some(now_ms);
    }

    /// Unfreeze, counting the time since the pause as paused. Returns that duration.
    pub fn mark_resumed(&self, now_ms: i64) -> u64 {
        let mut timing = self.timing();
        let Some(paused_at) = timing.clock.last_pause_ms.take() else {
            return 0;
        };
        let paused_ms = (now_ms - paused_at).max(0) as u64;
        timing.clock.total_paused_ms += paused_ms;
        paused_ms
    }

    /// The only way attribution changes. Emits `mode_change` before the new
    /// mode becomes visible; returns false when `to` is already current.
    pub fn switch_mode(&self, to: ControlMode, reason: ModeChangeReason) -> bool {
        let mut mode = self.mode();
        if *mode == to {
            return false;
        }
        self.emit(EventKind::ModeChange {
            from: *mode,
            to,
            reason,
        });
        *mode = to;
        true
    }

    /// What to persist when pausing at `paused_at`.
    pub fn to_resumable(&self, paused_at: i64) -> ResumableSession {
        let timing = self.timing_snapshot();
        ResumableSession {
            session_id: self.session_id.clone(),
            workspace_id: self.workspace_id.clone(),
            workspace_root: self.workspace_root.clone(),
            log_path: self.log.path().to_path_buf(),
            start_time: timing.start_ms,
            paused_at,
            total_paused_ms: timing.total_paused_ms,
            control_mode: Some(self.control_mode()),
        }
    }
}

impl Emitter for SessionContext {
    fn emit(&self, kind: EventKind) {
        self.emit_at(kind, self.clock.now_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::ManualClock;

    #[test]
    fn elapsed_excludes_paused_time() {
        let mut c = SessionClock::started_at(1_000);
        assert_eq!(c.elapsed_ms(1_000), 0);
        assert_eq!(c.elapsed_ms(4_000), 3_000);

        c.last_pause_ms = Some(4_000);
        assert_eq!(c.elapsed_ms(9_000), 3_000);

        c.last_pause_ms = None;
        c.total_paused_ms = 5_000;
        assert_eq!(c.elapsed_ms(10_000), 4_000);
    }

    #[test]
    fn elapsed_never_negative() {
        let c = SessionClock::started_at(5_000);
        assert_eq!(c.elapsed_ms(1_000), 0);
    }

    fn context(dir: &Path, clock: &ManualClock) -> SessionContext {
        let log = EventLog::open(dir.join("ses_x.jsonl"), 0).unwrap();
        SessionContext::new(
            SessionIdentity {
                session_id: "ses_x".into(),
                workspace_id: "ws".into(),
                workspace_root: dir.to_path_buf(),
            },
            SessionClock::started_at(clock.now_ms()),
            ControlMode::Human,
            Arc::new(log),
            Arc::new(clock.clone()),
            Some("1.2.3".into()),
        )
    }

    #[test]
    fn stamps_identity_and_versions() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(10_000);
        let ctx = context(dir.path(), &clock);
        clock.advance(250);
        ctx.emit(EventKind::Note { text: "n".into() });
        ctx.log().flush();

        let events = tempo_log::read_events(ctx.log().path()).unwrap();
        assert_eq!(events.len(), 1);
        let stamp = &events[0].stamp;
        assert_eq!(stamp.ts, 10_250);
        assert_eq!(stamp.elapsed_ms, 250);
        assert_eq!(stamp.session_id, "ses_x");
        assert_eq!(stamp.workspace_id, "ws");
        assert_eq!(stamp.tool_version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        assert_eq!(stamp.extension_version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn switch_mode_is_noop_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let ctx = context(dir.path(), &clock);

        assert!(!ctx.switch_mode(ControlMode::Human, ModeChangeReason::Manual));
        assert!(ctx.switch_mode(ControlMode::Ai, ModeChangeReason::Manual));
        assert_eq!(ctx.control_mode(), ControlMode::Ai);
        ctx.log().flush();

        let events = tempo_log::read_events(ctx.log().path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::ModeChange {
                from: ControlMode::Human,
                to: ControlMode::Ai,
                reason: ModeChangeReason::Manual,
            }
        );
    }

    #[test]
    fn pause_and_resume_adjust_totals() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let ctx = context(dir.path(), &clock);

        clock.advance(1_000);
        ctx.mark_paused(clock.now_ms());
        clock.advance(4_000);
        assert_eq!(ctx.elapsed_ms(), 1_000);
        assert_eq!(ctx.mark_resumed(clock.now_ms()), 4_000);
        clock.advance(500);
        assert_eq!(ctx.elapsed_ms(), 1_500);
        assert_eq!(ctx.timing_snapshot().total_paused_ms, 4_000);
        // not paused: nothing to add
        assert_eq!(ctx.mark_resumed(clock.now_ms()), 0);
    }
}
