//! Errors surfaced by a bootstrap run

use thiserror::Error;

/// Either kind of failure that ends a run
///
/// Both are passed through unchanged from where they were raised.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The queue or an intent is malformed
    #[error(transparent)]
    Structural(#[from] cmdqueue::Error),

    /// Connecting, running a command or copying a file failed
    #[error(transparent)]
    Transport(#[from] remotekit::Error),
}

impl BootstrapError {
    /// What the user can do about it
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Structural(_) => "Fix the Machinesfile task and run again",
            Self::Transport(e) => e.category().advice(),
        }
    }
}

/// Result type for bootstrap runs
pub type Result<T> = std::result::Result<T, BootstrapError>;
