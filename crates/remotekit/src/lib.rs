//! # remotekit
//!
//! Blocking remote execution for provisioning.
//!
//! A [`Transport`] opens a [`Session`] on a host with a user and password;
//! the session runs shell lines and copies files. Two backends are
//! provided:
//!
//! - [`SshTransport`]: real SSH sessions and SCP uploads via `ssh2`
//! - [`DryRunTransport`]: logs every call and reports success
//!
//! ## Example
//!
//! ```no_run
//! use remotekit::{Credential, SshTransport, Transport};
//!
//! let transport = SshTransport::new();
//! let mut session = transport
//!     .connect("10.0.0.5", "ubuntu", &Credential::password("ubuntu"))
//!     .expect("connect");
//! let status = session.execute_checked("uname -a").expect("uname");
//! println!("{}", status.stdout);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::dry_run::DryRunTransport;
pub use backend::ssh::SshTransport;
pub use backend::{Session, Transport};
pub use error::{Error, ErrorCategory, Result};
pub use types::{Credential, ExitStatus};
