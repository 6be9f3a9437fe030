//! Error types for remote execution.
//!
//! Transport errors are propagated unchanged to the caller; nothing in
//! this crate retries. Categories exist so the CLI can tell the user what
//! to look at.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Host unreachable or connection refused
    Connection,
    /// Credentials rejected
    Authentication,
    /// A remote command exited non-zero
    Command,
    /// A file could not be copied
    Transfer,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Could not reach host",
            Self::Authentication => "Authentication failed",
            Self::Command => "Remote command failed",
            Self::Transfer => "File transfer failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check that the host is up and SSH is listening",
            Self::Authentication => {
                "Check the bootstrap identity and password, or whether root login is still enabled"
            }
            Self::Command => "Rerun with -vvv to see the remote output; the machine may be partially provisioned",
            Self::Transfer => "Check that the local file exists and the remote directory is writable",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to a remote machine.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connection could not be established
    #[error("could not connect to {host}: {message}")]
    Connect {
        /// Host that was dialled
        host: String,
        /// Underlying error message
        message: String,
    },

    /// Server rejected the credentials
    #[error("authentication failed for {user}@{host}")]
    Authentication {
        /// Host that rejected the login
        host: String,
        /// User that attempted to log in
        user: String,
    },

    /// Remote command exited with a non-zero status
    #[error("command failed with exit code {code}: {command}")]
    CommandFailed {
        /// The command line that was executed
        command: String,
        /// Exit code reported by the remote shell
        code: i32,
        /// Standard error output from the command
        stderr: String,
    },

    /// Local file could not be sent
    #[error("could not upload {}: {message}", from.display())]
    Transfer {
        /// Local source path
        from: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// SSH protocol error
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connect { .. } => ErrorCategory::Connection,
            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::Transfer { .. } => ErrorCategory::Transfer,
            Error::Ssh(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_category() {
        let err = Error::CommandFailed {
            command: "useradd deploy".into(),
            code: 9,
            stderr: "user exists".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Command);
        assert_eq!(err.to_string(), "command failed with exit code 9: useradd deploy");
    }

    #[test]
    fn test_command_advice_points_at_verbose_output() {
        assert!(ErrorCategory::Command.advice().contains("-vvv"));
    }

    #[test]
    fn test_connect_category() {
        let err = Error::Connect {
            host: "10.0.0.5".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(!err.category().advice().is_empty());
    }

    #[test]
    fn test_io_is_other() {
        let err = Error::from(std::io::Error::other("boom"));
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
