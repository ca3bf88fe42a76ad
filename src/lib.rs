// Library surface shared by the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod ui;

pub use session::{SessionStatus, TrainingSessionState};
pub use tracker::{SessionTracker, TransitionOutcome};
