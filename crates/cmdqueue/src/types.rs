//! Core types for queued provisioning work

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What an entry does on the remote machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// A shell line executed on the remote session
    Shell(String),
    /// A local file copied to a remote path
    Transfer {
        /// Local source path
        from: PathBuf,
        /// Remote destination path
        to: String,
    },
}

impl Payload {
    /// Create a transfer payload
    pub fn transfer(from: impl Into<PathBuf>, to: impl Into<String>) -> Self {
        Self::Transfer {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether there is nothing to run or copy
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(command) => command.trim().is_empty(),
            Self::Transfer { from, to } => from.as_os_str().is_empty() || to.trim().is_empty(),
        }
    }
}

impl From<&str> for Payload {
    fn from(command: &str) -> Self {
        Self::Shell(command.to_string())
    }
}

impl From<String> for Payload {
    fn from(command: String) -> Self {
        Self::Shell(command)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(command) => f.write_str(command),
            Self::Transfer { from, to } => write!(f, "upload {} to {}", from.display(), to),
        }
    }
}

/// One queued unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Human-readable name shown in dry runs and errors
    pub label: String,
    /// Command or transfer to perform
    pub payload: Payload,
    /// Verification command run after the payload; exit 0 means the effect is in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

impl CommandEntry {
    /// Create an entry without validating it
    pub fn new(label: impl Into<String>, payload: impl Into<Payload>, check: Option<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
            check,
        }
    }

    /// Ensure the entry has both a label and something to do
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(Error::MissingLabel);
        }
        if self.payload.is_empty() {
            return Err(Error::MissingCommand {
                label: self.label.clone(),
            });
        }
        Ok(())
    }
}
