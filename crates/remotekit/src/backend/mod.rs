//! Backend abstraction for remote execution.
//!
//! The [`Transport`] trait opens sessions; a [`Session`] runs commands and
//! copies files. Implementations:
//! - [`ssh::SshTransport`] talks to a real host over SSH/SCP
//! - [`dry_run::DryRunTransport`] only logs what would happen

pub mod dry_run;
pub mod ssh;

use crate::error::{Error, Result};
use crate::types::{Credential, ExitStatus};
use std::path::Path;

/// Opens sessions on remote hosts.
pub trait Transport {
    /// Open a session on `host` as `user`.
    fn connect(&self, host: &str, user: &str, credential: &Credential) -> Result<Box<dyn Session>>;
}

/// An authenticated session on one host.
///
/// One session is reused for every command in a phase.
pub trait Session {
    /// Run a shell line and wait for it to finish.
    fn execute(&mut self, command: &str) -> Result<ExitStatus>;

    /// Copy a local file to a remote path.
    fn transfer(&mut self, from: &Path, to: &str) -> Result<ExitStatus>;

    /// Run a shell line, treating a non-zero exit as an error.
    fn execute_checked(&mut self, command: &str) -> Result<ExitStatus> {
        let status = self.execute(command)?;
        if !status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                code: status.code,
                stderr: status.stderr.trim().to_string(),
            });
        }
        Ok(status)
    }

    /// Copy a file, treating a non-zero status as an error.
    fn transfer_checked(&mut self, from: &Path, to: &str) -> Result<ExitStatus> {
        let status = self.transfer(from, to)?;
        if !status.success() {
            return Err(Error::Transfer {
                from: from.to_path_buf(),
                message: format!("exit code {}: {}", status.code, status.stderr.trim()),
            });
        }
        Ok(status)
    }
}
