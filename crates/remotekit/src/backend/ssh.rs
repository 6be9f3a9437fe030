//! SSH/SCP backend built on `ssh2`.

use super::{Session, Transport};
use crate::error::{Error, Result};
use crate::types::{Credential, ExitStatus};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Mode given to files copied over SCP.
const UPLOAD_MODE: i32 = 0o644;

/// Lines of output kept as the error text of a failed command
const ERROR_TAIL_LINES: usize = 20;

/// Last lines of a command's merged output
fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Transport that opens password-authenticated SSH sessions.
#[derive(Debug, Clone)]
pub struct SshTransport {
    port: u16,
}

impl SshTransport {
    /// Create a transport dialling the default SSH port.
    pub fn new() -> Self {
        Self { port: DEFAULT_PORT }
    }

    /// Dial a different port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SshTransport {
    fn connect(&self, host: &str, user: &str, credential: &Credential) -> Result<Box<dyn Session>> {
        log::debug!("Connecting to {user}@{host}:{}", self.port);

        let tcp = TcpStream::connect((host, self.port)).map_err(|e| Error::Connect {
            host: host.to_string(),
            message: e.to_string(),
        })?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;

        session
            .userauth_password(user, credential.expose())
            .map_err(|_| Error::Authentication {
                host: host.to_string(),
                user: user.to_string(),
            })?;

        if !session.authenticated() {
            return Err(Error::Authentication {
                host: host.to_string(),
                user: user.to_string(),
            });
        }

        Ok(Box::new(SshSession {
            session,
            target: format!("{user}@{host}"),
        }))
    }
}

/// An authenticated SSH session.
///
/// Each `execute` opens its own channel, so shell state such as the
/// working directory does not carry over between calls.
pub struct SshSession {
    session: ssh2::Session,
    target: String,
}

impl Session for SshSession {
    fn execute(&mut self, command: &str) -> Result<ExitStatus> {
        log::debug!("{}: {command}", self.target);

        let mut channel = self.session.channel_session()?;
        // stderr shares the stdout stream so neither can fill up unread
        channel.handle_extended_data(ssh2::ExtendedData::Merge)?;
        channel.exec(command)?;

        let mut output = String::new();
        channel.read_to_string(&mut output)?;

        channel.wait_close()?;
        let code = channel.exit_status()?;

        if !output.trim().is_empty() {
            log::trace!("{}", output.trim_end());
        }

        let stderr = if code == 0 {
            String::new()
        } else {
            output_tail(&output)
        };
        Ok(ExitStatus {
            code,
            stdout: output,
            stderr,
        })
    }

    fn transfer(&mut self, from: &Path, to: &str) -> Result<ExitStatus> {
        log::debug!("{}: upload {} to {to}", self.target, from.display());

        let data = fs::read(from).map_err(|e| Error::Transfer {
            from: from.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut remote = self
            .session
            .scp_send(Path::new(to), UPLOAD_MODE, data.len() as u64, None)?;
        remote.write_all(&data)?;
        remote.send_eof()?;
        remote.wait_eof()?;
        remote.close()?;
        remote.wait_close()?;

        Ok(ExitStatus::ok())
    }
}
