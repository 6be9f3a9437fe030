//! Remote file operations
//!
//! Paths are passed through to the remote shell as-is, so callers quote
//! anything with spaces themselves.

use cmdqueue::check::{self, fail_pass, pass_fail};
use cmdqueue::{CommandQueue, Payload, Result, require_options};
use std::path::PathBuf;

/// Optional mode and owner applied after creating a path
#[derive(Debug, Clone, Default)]
pub struct Ownership {
    pub perms: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Link target (required)
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    /// Replacement text (required)
    pub with: Option<String>,
    /// File to edit in place (required)
    pub in_file: Option<String>,
}

/// Application directories created under an app root
const APP_DIRS: [&str; 3] = ["releases", "shared/config", "shared/system"];

fn apply_ownership(queue: &mut CommandQueue, path: &str, ownership: &Ownership) -> Result<()> {
    if let Some(perms) = &ownership.perms {
        chmod(queue, perms, path)?;
    }
    if let Some(owner) = &ownership.owner {
        chown(queue, owner, path)?;
    }
    Ok(())
}

/// Copy a local file to the remote host
pub fn upload(queue: &mut CommandQueue, from: PathBuf, to: &str, ownership: &Ownership) -> Result<()> {
    let label = format!("upload {to}");
    queue.append(
        label,
        Payload::transfer(from, to),
        Some(pass_fail(&check::file_exists(to))),
    )?;
    apply_ownership(queue, to, ownership)
}

pub fn rename(queue: &mut CommandQueue, from: &str, to: &str) -> Result<()> {
    queue.append(
        format!("rename {from}"),
        format!("mv {from} {to}"),
        Some(pass_fail(&check::file_exists(to))),
    )
}

pub fn copy(queue: &mut CommandQueue, from: &str, to: &str) -> Result<()> {
    queue.append(
        format!("copy {from}"),
        format!("cp {from} {to}"),
        Some(pass_fail(&check::file_exists(to))),
    )
}

/// Remove a file; `force` ignores a missing path
pub fn remove(queue: &mut CommandQueue, path: &str, force: bool) -> Result<()> {
    let flag = if force { "-f " } else { "" };
    queue.append(
        format!("remove {path}"),
        format!("rm {flag}{path}"),
        Some(fail_pass(&check::file_exists(path))),
    )
}

/// Rename a versioned directory such as `redis-2.2.4` to plain `redis`
pub fn remove_version_info(queue: &mut CommandQueue, name: &str) -> Result<()> {
    queue.append(
        format!("strip version {name}"),
        format!("find . -maxdepth 1 -name '{name}*' -a -type d | xargs -I xxx mv xxx {name}"),
        None,
    )
}

/// Symlink `from` to the target in `opts.to`
pub fn link(queue: &mut CommandQueue, from: &str, opts: &LinkOptions) -> Result<()> {
    require_options("link", &[("to", opts.to.is_some())])?;
    let to = opts.to.as_deref().unwrap_or_default();
    queue.append(
        format!("link {from}"),
        format!("ln -sf {to} {from}"),
        Some(pass_fail(&check::link_exists(from))),
    )
}

/// Replace text in a remote file with sed
pub fn replace(queue: &mut CommandQueue, what: &str, opts: &ReplaceOptions) -> Result<()> {
    require_options(
        "replace",
        &[("with", opts.with.is_some()), ("in", opts.in_file.is_some())],
    )?;
    let with = opts.with.as_deref().unwrap_or_default().replace('/', r"\/");
    let file = opts.in_file.as_deref().unwrap_or_default();
    queue.append(
        format!("replace in {file}"),
        format!("sed -i 's/{what}/{with}/' {file}"),
        None,
    )
}

pub fn mkdir(queue: &mut CommandQueue, path: &str, ownership: &Ownership) -> Result<()> {
    queue.append(
        format!("mkdir {path}"),
        format!("mkdir -p {path}"),
        Some(pass_fail(&check::dir_exists(path))),
    )?;
    apply_ownership(queue, path, ownership)
}

pub fn chmod(queue: &mut CommandQueue, mode: &str, path: &str) -> Result<()> {
    queue.append(format!("chmod {path}"), format!("chmod {mode} {path}"), None)
}

/// Change owner and group to the same name
pub fn chown(queue: &mut CommandQueue, owner: &str, path: &str) -> Result<()> {
    queue.append(
        format!("chown {path}"),
        format!("chown {owner}:{owner} {path}"),
        None,
    )
}

/// Create the releases and shared directories of a deployed app
pub fn make_app_structure(queue: &mut CommandQueue, path: &str, owner: &str) -> Result<()> {
    let ownership = Ownership {
        perms: None,
        owner: Some(owner.to_string()),
    };
    for dir in APP_DIRS {
        mkdir(queue, &format!("{path}/{dir}"), &ownership)?;
    }
    Ok(())
}
