pub mod paths;
pub mod reader;
pub mod rotate;
pub mod writer;

pub use paths::{rotated_path, session_log_path};
pub use reader::{log_files, read_events};
pub use writer::{EventLog, LogError, LogStats};
