//! Transport that only logs.

use super::{Session, Transport};
use crate::error::Result;
use crate::types::{Credential, ExitStatus};
use std::path::Path;

/// Transport that never touches the network.
///
/// Every operation is logged at `info` and reported as successful.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunTransport;

impl DryRunTransport {
    /// Create a dry-run transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for DryRunTransport {
    fn connect(&self, host: &str, user: &str, _credential: &Credential) -> Result<Box<dyn Session>> {
        log::info!("[dry-run] connect {user}@{host}");
        Ok(Box::new(DryRunSession {
            target: format!("{user}@{host}"),
        }))
    }
}

/// Stub session handed out by [`DryRunTransport`].
#[derive(Debug)]
pub struct DryRunSession {
    target: String,
}

impl Session for DryRunSession {
    fn execute(&mut self, command: &str) -> Result<ExitStatus> {
        log::info!("[dry-run] {}: {command}", self.target);
        Ok(ExitStatus::ok())
    }

    fn transfer(&mut self, from: &Path, to: &str) -> Result<ExitStatus> {
        log::info!("[dry-run] {}: upload {} to {to}", self.target, from.display());
        Ok(ExitStatus::ok())
    }
}
