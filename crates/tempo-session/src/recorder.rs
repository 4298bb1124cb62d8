//! Session lifecycle: `stopped → active ⇄ paused → stopped`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempo_core::hash::{sha256_hex, truncate_chars};
use tempo_core::{
    new_session_id, Clock, ControlMode, Cursor, Emitter, EventKind, ModeChangeReason, SessionId,
    SessionStatus, ViolationKind,
};
use tempo_log::{session_log_path, EventLog};
use tempo_store::StateStore;
use tempo_workspace::{FileStat, SnapshotEngine, SnapshotOutcome};

use crate::config::TelemetryConfig;
use crate::context::{SessionClock, SessionContext, SessionIdentity};
use crate::edit::{EditClassifier, TextChange};
use crate::error::SessionError;
use crate::resume::{self, ResumableSession};

/// Characters of prompt text kept when full text storage is off.
pub const PROMPT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Created,
    Deleted,
}

/// What a finished session looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub workspace_id: String,
    pub log_path: PathBuf,
    pub elapsed_ms: u64,
    pub total_paused_ms: u64,
    pub control_mode: ControlMode,
}

struct ActiveSession {
    // Dropped first: stops the timer before the context goes.
    engine: Arc<SnapshotEngine>,
    ctx: Arc<SessionContext>,
    edits: EditClassifier,
}

enum State {
    Stopped,
    Active(ActiveSession),
    Paused(ResumableSession),
}

/// Owns the current session and drives its lifecycle.
///
/// All methods take `&self`; the recorder can be shared between the thread
/// feeding editor activity and the one handling shutdown signals.
pub struct Recorder {
    config: Mutex<TelemetryConfig>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    extension_version: Option<String>,
    state: Mutex<State>,
}

impl Recorder {
    pub fn new(config: TelemetryConfig, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Mutex::new(config),
            store,
            clock,
            extension_version: None,
            state: Mutex::new(State::Stopped),
        }
    }

    /// Version string of the host integration, stamped onto every event.
    pub fn with_extension_version(mut self, version: impl Into<String>) -> Self {
        self.extension_version = Some(version.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> TelemetryConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Lifecycle ──

    /// Begin a new session rooted at `workspace_root`. A paused session,
    /// in memory or left in the state store, gets its `session_end` first.
    pub fn start(&self, workspace_root: &Path) -> Result<SessionId, SessionError> {
        let mut state = self.state();
        if matches!(*state, State::Active(_)) {
            return Err(SessionError::AlreadyActive);
        }
        if !workspace_root.is_dir() {
            return Err(SessionError::MissingWorkspace(workspace_root.to_path_buf()));
        }

        let paused = match &*state {
            State::Paused(saved) => Some(saved.clone()),
            _ => resume::load_saved(self.store.as_ref()),
        };
        if let Some(saved) = paused {
            self.end_paused(&saved)?;
            resume::clear_saved_for(self.store.as_ref(), &saved.session_id);
            tracing::info!(session_id = %saved.session_id, "ended paused session");
            *state = State::Stopped;
        }

        let root = workspace_root
            .canonicalize()
            .unwrap_or_else(|_| workspace_root.to_path_buf());
        let workspace_id = tempo_store::workspace_id(&root);
        let session_id = new_session_id();
        let config = self.config();
        let log_dir = config
            .log_directory
            .clone()
            .unwrap_or_else(|| tempo_store::workspace_dir(&workspace_id).join("logs"));
        let log = EventLog::open(
            session_log_path(&log_dir, &session_id),
            config.max_file_size_bytes(),
        )?;

        let now = self.clock.now_ms();
        let ctx = Arc::new(SessionContext::new(
            SessionIdentity {
                session_id: session_id.clone(),
                workspace_id,
                workspace_root: root.clone(),
            },
            SessionClock::started_at(now),
            ControlMode::Human,
            Arc::new(log),
            Arc::clone(&self.clock),
            self.extension_version.clone(),
        ));
        ctx.emit_at(
            EventKind::SessionStart {
                workspace_root: root.to_string_lossy().to_string(),
                control_mode: ControlMode::Human,
            },
            now,
        );
        let engine = self.start_engine(&ctx, &config);

        tracing::info!(
            session_id = %session_id,
            log = %ctx.log().path().display(),
            "session started"
        );
        *state = State::Active(ActiveSession {
            engine,
            ctx,
            edits: EditClassifier::new(),
        });
        Ok(session_id)
    }

    /// Pause the active session and persist what is needed to resume it.
    pub fn pause(&self) -> Result<ResumableSession, SessionError> {
        let mut state = self.state();
        if !matches!(*state, State::Active(_)) {
            return Err(SessionError::NotActive);
        }
        let State::Active(active) = std::mem::replace(&mut *state, State::Stopped) else {
            return Err(SessionError::NotActive);
        };

        active.engine.stop_periodic();
        let now = self.clock.now_ms();
        active.ctx.emit_at(EventKind::SessionPause, now);
        active.ctx.mark_paused(now);

        let saved = active.ctx.to_resumable(now);
        if let Err(e) = resume::save(self.store.as_ref(), &saved) {
            tracing::warn!(
                session_id = %saved.session_id,
                error = %e,
                "cannot persist paused session; it can only be resumed in this process"
            );
        }
        teardown(active);

        tracing::info!(session_id = %saved.session_id, "session paused");
        *state = State::Paused(saved.clone());
        Ok(saved)
    }

    /// Continue the paused session, from memory or from the state store.
    pub fn resume(&self) -> Result<SessionId, SessionError> {
        let mut state = self.state();
        let saved = match &*state {
            State::Active(_) => return Err(SessionError::AlreadyActive),
            State::Paused(saved) => saved.clone(),
            State::Stopped => {
                resume::load_saved(self.store.as_ref()).ok_or(SessionError::NoSavedSession)?
            }
        };

        let config = self.config();
        let log = EventLog::open(&saved.log_path, config.max_file_size_bytes())?;
        let ctx = Arc::new(SessionContext::from_saved(
            &saved,
            Arc::new(log),
            Arc::clone(&self.clock),
            self.extension_version.clone(),
        ));
        let now = self.clock.now_ms();
        let paused_ms = ctx.mark_resumed(now);
        ctx.emit_at(EventKind::SessionResume { paused_ms }, now);
        resume::clear_saved_for(self.store.as_ref(), &saved.session_id);
        let engine = self.start_engine(&ctx, &config);

        tracing::info!(session_id = %saved.session_id, paused_ms, "session resumed");
        *state = State::Active(ActiveSession {
            engine,
            ctx,
            edits: EditClassifier::new(),
        });
        Ok(saved.session_id)
    }

    /// End the current session, active or paused. `Ok(None)` when there was
    /// nothing to end.
    pub fn stop(&self) -> Result<Option<SessionSummary>, SessionError> {
        let mut state = self.state();
        let saved = match &*state {
            State::Active(_) => None,
            State::Paused(saved) => Some(saved.clone()),
            State::Stopped => match resume::load_saved(self.store.as_ref()) {
                Some(saved) => Some(saved),
                None => return Ok(None),
            },
        };

        let summary = match saved {
            Some(saved) => self.end_paused(&saved)?,
            None => {
                let State::Active(active) = std::mem::replace(&mut *state, State::Stopped) else {
                    return Ok(None);
                };
                active.engine.stop_periodic();
                let now = self.clock.now_ms();
                let timing = active.ctx.timing_snapshot();
                active.ctx.emit_at(
                    EventKind::SessionEnd {
                        total_paused_ms: timing.total_paused_ms,
                    },
                    now,
                );
                let summary = SessionSummary {
                    session_id: active.ctx.session_id().to_string(),
                    workspace_id: active.ctx.workspace_id().to_string(),
                    log_path: active.ctx.log().path().to_path_buf(),
                    elapsed_ms: timing.elapsed_ms(now),
                    total_paused_ms: timing.total_paused_ms,
                    control_mode: active.ctx.control_mode(),
                };
                teardown(active);
                summary
            }
        };

        resume::clear_saved_for(self.store.as_ref(), &summary.session_id);
        tracing::info!(
            session_id = %summary.session_id,
            elapsed_ms = summary.elapsed_ms,
            "session stopped"
        );
        *state = State::Stopped;
        Ok(Some(summary))
    }

    /// Append `session_end` to a paused session's log. Elapsed time stays
    /// frozen at the pause; the time since then counts as paused.
    fn end_paused(&self, saved: &ResumableSession) -> Result<SessionSummary, SessionError> {
        let log = EventLog::open(&saved.log_path, self.config().max_file_size_bytes())?;
        let ctx = SessionContext::from_saved(
            saved,
            Arc::new(log),
            Arc::clone(&self.clock),
            self.extension_version.clone(),
        );
        let now = self.clock.now_ms();
        let total_paused_ms = saved.total_paused_ms + (now - saved.paused_at).max(0) as u64;
        ctx.emit_at(EventKind::SessionEnd { total_paused_ms }, now);
        ctx.log().close();

        Ok(SessionSummary {
            session_id: saved.session_id.clone(),
            workspace_id: saved.workspace_id.clone(),
            log_path: saved.log_path.clone(),
            elapsed_ms: saved.frozen_elapsed_ms(),
            total_paused_ms,
            control_mode: saved.control_mode.unwrap_or_default(),
        })
    }

    fn start_engine(&self, ctx: &Arc<SessionContext>, config: &TelemetryConfig) -> Arc<SnapshotEngine> {
        let emitter: Arc<dyn Emitter> = ctx.clone();
        let engine = Arc::new(SnapshotEngine::new(
            ctx.workspace_root(),
            config.snapshot_settings(),
            emitter,
            Arc::clone(&self.clock),
        ));
        // baseline for the first diff
        engine.take_snapshot();
        engine.start_periodic(config.snapshot_interval_ms);
        engine
    }

    // ── Attribution ──

    /// Switch attribution. No event when the mode is unchanged.
    pub fn set_control_mode(
        &self,
        mode: ControlMode,
        reason: ModeChangeReason,
    ) -> Result<(), SessionError> {
        let state = self.state();
        let State::Active(active) = &*state else {
            return Err(SessionError::NotActive);
        };
        if active.ctx.switch_mode(mode, reason) {
            tracing::info!(mode = %mode, ?reason, "control mode changed");
        }
        Ok(())
    }

    /// Record a policy violation under the current mode. Changes nothing.
    pub fn report_policy_violation(
        &self,
        kind: ViolationKind,
        detail: Option<String>,
    ) -> Result<(), SessionError> {
        let state = self.state();
        let State::Active(active) = &*state else {
            return Err(SessionError::NotActive);
        };
        let control_mode = active.ctx.control_mode();
        active.ctx.emit(EventKind::PolicyViolation {
            kind,
            control_mode,
            detail,
        });
        Ok(())
    }

    /// Record an AI-assist prompt. A prompt while attributed to the human is
    /// a violation, and attribution moves to the AI from here on.
    ///
    /// Runs under the state lock, so a concurrent `pause` sees either none
    /// or all of the violation, mode change and prompt.
    pub fn log_prompt(
        &self,
        assist_mode: &str,
        note: Option<String>,
        prompt_text: &str,
    ) -> Result<(), SessionError> {
        let store_text = self.config().store_prompt_text;
        let state = self.state();
        let State::Active(active) = &*state else {
            return Err(SessionError::NotActive);
        };
        let ctx = &active.ctx;
        if ctx.control_mode() == ControlMode::Human {
            ctx.emit(EventKind::PolicyViolation {
                kind: ViolationKind::AiActionInHumanMode,
                control_mode: ControlMode::Human,
                detail: Some(format!("{assist_mode} prompt while in human mode")),
            });
            ctx.switch_mode(ControlMode::Ai, ModeChangeReason::AiPrompt);
        }

        ctx.emit(EventKind::AiPrompt {
            assist_mode: assist_mode.to_string(),
            note,
            prompt_hash: sha256_hex(prompt_text.as_bytes()),
            prompt_chars: prompt_text.chars().count() as u64,
            prompt_text: store_text.then(|| prompt_text.to_string()),
            prompt_preview: (!store_text)
                .then(|| truncate_chars(prompt_text, PROMPT_PREVIEW_CHARS).to_string()),
            control_mode: ctx.control_mode(),
        });
        Ok(())
    }

    // ── Producers ──

    /// Classify and record one batch of text changes to `file`.
    /// An empty batch records nothing.
    pub fn record_edit(
        &self,
        file: &str,
        changes: &[TextChange],
        cursor: Option<Cursor>,
    ) -> Result<(), SessionError> {
        let threshold = self.config().paste_like_threshold;
        let mut state = self.state();
        let State::Active(active) = &mut *state else {
            return Err(SessionError::NotActive);
        };
        if changes.is_empty() {
            return Ok(());
        }
        let summary = active.edits.classify(file, changes, threshold);
        active.ctx.emit(EventKind::Edit {
            file: file.to_string(),
            chars_added: summary.chars_added,
            chars_deleted: summary.chars_deleted,
            lines_added: summary.lines_added,
            lines_removed: summary.lines_removed,
            is_paste: summary.is_paste,
            is_undo: summary.is_undo,
            is_redo: summary.is_redo,
            cursor,
            control_mode: active.ctx.control_mode(),
        });
        Ok(())
    }

    /// Record a file appearing or disappearing. The next snapshot rescans.
    pub fn record_file_event(
        &self,
        event: FileEvent,
        file: &str,
        stat: FileStat,
    ) -> Result<(), SessionError> {
        let mut state = self.state();
        let State::Active(active) = &mut *state else {
            return Err(SessionError::NotActive);
        };
        let file_name = file.to_string();
        let kind = match event {
            FileEvent::Created => EventKind::FileCreate {
                file: file_name,
                loc: stat.loc,
                bytes: stat.bytes,
            },
            FileEvent::Deleted => {
                active.edits.forget(file);
                EventKind::FileDelete {
                    file: file_name,
                    loc: stat.loc,
                    bytes: stat.bytes,
                }
            }
        };
        active.ctx.emit(kind);
        active.engine.invalidate_cache();
        Ok(())
    }

    pub fn add_note(&self, text: &str) -> Result<(), SessionError> {
        self.emit(EventKind::Note {
            text: text.to_string(),
        })
    }

    /// Stamp and record any event kind on the active session.
    pub fn emit(&self, kind: EventKind) -> Result<(), SessionError> {
        self.active_context()?.emit(kind);
        Ok(())
    }

    /// The active session as an emitter for producers on other threads.
    /// Events emitted after the session ends are dropped.
    pub fn emitter(&self) -> Option<Arc<dyn Emitter>> {
        match &*self.state() {
            State::Active(active) => {
                let emitter: Arc<dyn Emitter> = active.ctx.clone();
                Some(emitter)
            }
            _ => None,
        }
    }

    // ── Snapshots ──

    pub fn take_snapshot(&self) -> Result<SnapshotOutcome, SessionError> {
        let engine = match &*self.state() {
            State::Active(active) => Arc::clone(&active.engine),
            _ => return Err(SessionError::NotActive),
        };
        Ok(engine.take_snapshot())
    }

    pub fn invalidate_snapshot_cache(&self) {
        if let State::Active(active) = &*self.state() {
            active.engine.invalidate_cache();
        }
    }

    // ── Queries ──

    pub fn status(&self) -> SessionStatus {
        match &*self.state() {
            State::Stopped => SessionStatus::Stopped,
            State::Active(_) => SessionStatus::Active,
            State::Paused(_) => SessionStatus::Paused,
        }
    }

    /// Active time of the current session; frozen while paused, 0 when stopped.
    pub fn elapsed_ms(&self) -> u64 {
        match &*self.state() {
            State::Stopped => 0,
            State::Active(active) => active.ctx.elapsed_ms(),
            State::Paused(saved) => saved.frozen_elapsed_ms(),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &*self.state() {
            State::Stopped => None,
            State::Active(active) => Some(active.ctx.session_id().to_string()),
            State::Paused(saved) => Some(saved.session_id.clone()),
        }
    }

    pub fn control_mode(&self) -> ControlMode {
        match &*self.state() {
            State::Stopped => ControlMode::default(),
            State::Active(active) => active.ctx.control_mode(),
            State::Paused(saved) => saved.control_mode.unwrap_or_default(),
        }
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        match &*self.state() {
            State::Stopped => None,
            State::Active(active) => Some(active.ctx.log().path().to_path_buf()),
            State::Paused(saved) => Some(saved.log_path.clone()),
        }
    }

    /// The paused session held in memory, else the one in the state store.
    pub fn saved_session(&self) -> Option<ResumableSession> {
        match &*self.state() {
            State::Paused(saved) => Some(saved.clone()),
            State::Active(_) => None,
            State::Stopped => resume::load_saved(self.store.as_ref()),
        }
    }

    // ── Configuration ──

    /// Apply new settings. The log directory takes effect with the next session.
    pub fn update_config(&self, config: TelemetryConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        if let State::Active(active) = &*self.state() {
            active.ctx.log().set_max_file_size(config.max_file_size_bytes());
            active.engine.update_settings(config.snapshot_settings());
            if !active.engine.is_periodic_running() && config.snapshot_interval_ms > 0 {
                active.engine.start_periodic(config.snapshot_interval_ms);
            }
        }
    }

    fn active_context(&self) -> Result<Arc<SessionContext>, SessionError> {
        match &*self.state() {
            State::Active(active) => Ok(Arc::clone(&active.ctx)),
            _ => Err(SessionError::NotActive),
        }
    }
}

/// Timer (already stopped by the caller) → flush → close → release caches.
/// Every step is idempotent.
fn teardown(active: ActiveSession) {
    active.engine.stop_periodic();
    active.ctx.log().flush();
    active.ctx.log().close();
    active.engine.shutdown();
}
