//! Operating user creation

use cmdqueue::check::pass_fail;
use cmdqueue::{CommandQueue, Result};

/// Build the `useradd` line for a new member of `group`
///
/// `password` must already be encrypted; it is passed to `-p` verbatim.
pub fn useradd_command(username: &str, password: Option<&str>, group: &str) -> String {
    match password {
        Some(password) => format!("useradd -p '{password}' -G {group} {username}"),
        None => format!("useradd -G {group} {username}"),
    }
}

/// Queue creation of a user account
pub fn create_user(queue: &mut CommandQueue, username: &str, password: Option<&str>, group: &str) -> Result<()> {
    queue.append(
        format!("create user {username}"),
        useradd_command(username, password, group),
        Some(pass_fail(&format!("id -u {username} >/dev/null 2>&1"))),
    )
}
