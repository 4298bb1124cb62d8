pub mod clock;
pub mod event;
pub mod hash;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{Emitter, Event, EventKind, Stamp};
pub use types::*;
