//! Session clock, control-mode attribution and pause/resume for one
//! recording session at a time.

pub mod config;
pub mod context;
pub mod edit;
pub mod error;
pub mod recorder;
pub mod resume;

pub use config::{config_path, TelemetryConfig};
pub use context::{SessionClock, SessionContext, SessionIdentity};
pub use edit::{EditClassifier, EditSummary, TextChange};
pub use error::{ConfigError, SessionError};
pub use recorder::{FileEvent, Recorder, SessionSummary, PROMPT_PREVIEW_CHARS};
pub use resume::{ResumableSession, RESUMABLE_SESSION_KEY};
