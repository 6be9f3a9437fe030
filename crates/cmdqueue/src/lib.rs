//! # cmdqueue
//!
//! The command queue behind `machines`.
//!
//! Provisioning intents compile into [`CommandEntry`] values: a label, a
//! shell command or file transfer, and an optional verification command.
//! Entries accumulate in a [`CommandQueue`] during one configuration pass
//! and are drained exactly once when the queue is executed.
//!
//! ## Example
//!
//! ```
//! use cmdqueue::{CommandQueue, check};
//!
//! let mut queue = CommandQueue::new();
//! queue
//!     .append(
//!         "install git",
//!         "apt-get -q -y install git",
//!         Some(check::pass_fail(&check::package_installed("git"))),
//!     )
//!     .unwrap();
//!
//! for entry in queue.drain() {
//!     println!("{:<15} {}", entry.label, entry.payload);
//! }
//! assert!(queue.is_empty());
//! ```

#![warn(missing_docs)]

pub mod check;
pub mod error;
pub mod queue;
pub mod types;

pub use error::{Error, Result, require_options};
pub use queue::CommandQueue;
pub use types::{CommandEntry, Payload};
