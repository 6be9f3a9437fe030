//! Structural errors for queue construction.
//!
//! A structural error means the provisioning description itself is
//! malformed: an entry without a label or command, or an intent missing
//! an option it cannot work without. These are raised before any remote
//! call is made for the offending entry.

use thiserror::Error;

/// Errors raised while building or validating the command queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An entry was appended with an empty label
    #[error("command entry is missing a label")]
    MissingLabel,

    /// An entry was appended with an empty command or transfer path
    #[error("command entry '{label}' is missing a command")]
    MissingCommand {
        /// Label of the offending entry
        label: String,
    },

    /// An intent was invoked without one or more required options
    #[error("{operation} requires option(s): {}", keys.join(", "))]
    MissingOptions {
        /// Intent that was invoked
        operation: &'static str,
        /// Every missing option key, in declaration order
        keys: Vec<&'static str>,
    },
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Check that every required option of an operation is present.
///
/// `options` pairs each option key with whether it was supplied. All
/// missing keys are reported together.
pub fn require_options(operation: &'static str, options: &[(&'static str, bool)]) -> Result<()> {
    let keys: Vec<&'static str> = options
        .iter()
        .filter(|(_, present)| !present)
        .map(|(key, _)| *key)
        .collect();

    if keys.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingOptions { operation, keys })
    }
}
