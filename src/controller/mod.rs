//! Controller module - everything that drives the remote player
//!
//! - `resolver`: artist catalog -> track set
//! - `scheduler`: sleep + cancellation used for pacing
//! - `supervisor`: the long-running playback watchdog
//! - `session`: interactive search/selection shell around the supervisor

mod resolver;
pub(crate) mod scheduler;
mod session;
mod supervisor;

pub use scheduler::{spawn_interrupt_listener, TokioScheduler};
pub use session::{spawn_stdin_reader, Session, SessionSettings};
pub use supervisor::{SupervisorSettings, MAX_BATCH_SIZE};
