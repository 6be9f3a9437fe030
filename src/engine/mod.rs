//! Bootstrap engine
//!
//! The engine takes a compiled [`cmdqueue::CommandQueue`] and drives a
//! [`remotekit::Transport`] through the bootstrap phases:
//! 1. Identity login and root elevation
//! 2. Hostname and hosts rewrite (non-production only)
//! 3. User creation
//! 4. Queue execution
//! 5. De-elevation

pub mod context;
pub mod error;
pub mod orchestrator;

pub use context::{NoProgress, ProgressCallback, StdoutSink};
pub use error::BootstrapError;
pub use orchestrator::{Mode, Orchestrator, Outcome, Phase};
