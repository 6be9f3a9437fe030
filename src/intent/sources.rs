//! apt source and PPA registration

use cmdqueue::check::{self, pass_fail};
use cmdqueue::{CommandQueue, Result, require_options};

/// Signing key for an apt source; both fields are required
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// URL of the ASCII-armoured key
    pub key_url: Option<String>,
    /// Name or fingerprint fragment to look for in `apt-key list`
    pub key_name: Option<String>,
}

/// Write a sources.list fragment and register its signing key
pub fn add_source(queue: &mut CommandQueue, name: &str, source: &str, opts: &SourceOptions) -> Result<()> {
    require_options(
        "add_source",
        &[("key_url", opts.key_url.is_some()), ("key_name", opts.key_name.is_some())],
    )?;
    let key_url = opts.key_url.as_deref().unwrap_or_default();
    let key_name = opts.key_name.as_deref().unwrap_or_default();
    let list = format!("/etc/apt/sources.list.d/{name}.list");

    queue.append(
        format!("add source {name}"),
        format!("echo '{source}' > {list}"),
        Some(pass_fail(&check::file_exists(&list))),
    )?;
    queue.append(
        format!("add key {key_name}"),
        format!("wget -q -O - {key_url} | apt-key add -"),
        Some(pass_fail(&check::key_listed(key_name))),
    )
}

/// Register a Launchpad PPA and refresh the package index
pub fn add_ppa(queue: &mut CommandQueue, ppa: &str, key_name: &str) -> Result<()> {
    queue.append(format!("add ppa {ppa}"), format!("add-apt-repository -y ppa:{ppa}"), None)?;
    queue.append(
        format!("update for {ppa}"),
        "apt-get -q update",
        Some(pass_fail(&check::key_listed(key_name))),
    )
}
