//! Package installation and arbitrary commands
//!
//! apt handles package lists, dpkg handles downloaded `.deb` archives and
//! Git sources are cloned and their bundled `install*` script run.

use cmdqueue::check::{self, fail_pass, pass_fail};
use cmdqueue::{CommandQueue, Result, require_options};
use regex::Regex;
use std::sync::LazyLock;

use super::OneOrMany;

/// Prepended to every `run` line so remote tools see a sane terminal
const ENV_PREFIX: &str = "export TERM=linux";

static GIT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(git://|git@|git\+ssh://)|\.git$").expect("valid regex"));

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("valid regex"));

/// What an `install` task points at, decided once from its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// Clone and run the repository's `install*` script
    Git {
        url: String,
        to: Option<String>,
        args: Option<String>,
    },
    /// Download a `.deb` and install it with dpkg
    Archive { url: String },
    /// Install apt packages, one entry each
    PackageList(Vec<String>),
}

impl InstallSource {
    /// Classify raw task input; `None` means the input is ignored
    pub fn classify(packages: &OneOrMany, to: Option<String>, args: Option<String>) -> Option<Self> {
        match packages {
            OneOrMany::Many(names) => Some(Self::PackageList(names.clone())),
            OneOrMany::One(url) if GIT_URL.is_match(url) => Some(Self::Git {
                url: url.clone(),
                to,
                args,
            }),
            OneOrMany::One(url) if HTTP_URL.is_match(url) => Some(Self::Archive { url: url.clone() }),
            OneOrMany::One(_) => None,
        }
    }
}

/// Options for [`run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run the line (and its check) as this user
    pub as_user: Option<String>,
    pub check: Option<String>,
}

/// Last path segment of a URL
fn basename(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Archive file name without its compression suffix
fn archive_stem(name: &str) -> &str {
    [".zip", ".tar.gz", ".tgz"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Quote a line for `sh -c '...'`
fn single_quote(line: &str) -> String {
    format!("'{}'", line.replace('\'', r"'\''"))
}

fn as_user(user: &str, line: &str) -> String {
    format!("sudo -u {user} sh -c {}", single_quote(line))
}

/// Upgrade apt packages
pub fn update(queue: &mut CommandQueue) -> Result<()> {
    queue.append("update", "apt-get -q update && apt-get -q -y upgrade", None)
}

/// Install from a Git repository, a `.deb` URL or a list of apt packages
pub fn install(queue: &mut CommandQueue, source: &InstallSource, as_user: Option<&str>) -> Result<()> {
    match source {
        InstallSource::Git { url, to, args } => {
            require_options("install", &[("to", to.is_some())])?;
            let to = to.as_deref().unwrap_or_default();
            let label = format!("install {}", basename(url).trim_end_matches(".git"));
            let args = args
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .map(|a| format!(" {a}"))
                .unwrap_or_default();

            queue.append(label.clone(), format!("rm -rf {to}"), None)?;
            run(
                queue,
                &label,
                &[
                    format!("git clone --quiet {url} {to}"),
                    format!("cd {to}"),
                    format!(
                        "find . -maxdepth 1 -name 'install*' -type f | head -n 1 | xargs -I xxx xxx{args}"
                    ),
                ],
                &RunOptions {
                    as_user: as_user.map(str::to_string),
                    check: Some(pass_fail(&format!("ls {to}/install* >/dev/null 2>&1"))),
                },
            )
        }
        InstallSource::Archive { url } => {
            let name = basename(url);
            let package = name.trim_end_matches(".deb").split('_').next().unwrap_or(name);
            queue.append(
                format!("install {name}"),
                format!("cd /tmp && wget -q {url} && dpkg -i {name} && rm {name} && cd -"),
                Some(pass_fail(&check::package_installed(package))),
            )
        }
        InstallSource::PackageList(names) => {
            for name in names {
                queue.append(
                    format!("install {name}"),
                    format!("apt-get -q -y install {name}"),
                    Some(pass_fail(&check::package_installed(name))),
                )?;
            }
            Ok(())
        }
    }
}

/// Remove apt packages, one entry each
pub fn uninstall(queue: &mut CommandQueue, names: &[String]) -> Result<()> {
    for name in names {
        queue.append(
            format!("uninstall {name}"),
            format!("apt-get -q -y remove {name}"),
            Some(fail_pass(&check::package_installed(name))),
        )?;
    }
    Ok(())
}

/// Run one or more commands as a single `&&` chain
pub fn run(queue: &mut CommandQueue, label: &str, commands: &[String], opts: &RunOptions) -> Result<()> {
    let line = std::iter::once(ENV_PREFIX)
        .chain(commands.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" && ");

    match &opts.as_user {
        Some(user) => queue.append(
            label,
            as_user(user, &line),
            opts.check.as_deref().map(|c| as_user(user, c)),
        ),
        None => queue.append(label, line, opts.check.clone()),
    }
}

/// Install a gem, optionally pinned to a version
pub fn gem(queue: &mut CommandQueue, name: &str, version: Option<&str>) -> Result<()> {
    let version = version.map(|v| format!(" -v '{v}'")).unwrap_or_default();
    queue.append(
        format!("gem {name}"),
        format!("gem install {name}{version}"),
        Some(pass_fail(&check::gem_installed(name))),
    )
}

/// Update gems, e.g. `--system` for Rubygems itself
pub fn gem_update(queue: &mut CommandQueue, flags: &str) -> Result<()> {
    let command = format!("gem update {flags}");
    queue.append("gem update", command.trim_end(), None)
}

/// Download and unpack a `.zip` or `.tar.gz` into /tmp
pub fn extract(queue: &mut CommandQueue, url: &str) -> Result<()> {
    let name = basename(url);
    let tool = if name.ends_with(".zip") { "unzip" } else { "tar -zxvf" };
    let dir = archive_stem(name);

    queue.append(
        format!("extract {name}"),
        format!("cd /tmp && wget -q {url} && {tool} {name} && rm {name} && cd -"),
        Some(pass_fail(&check::dir_exists(&format!("/tmp/{dir}")))),
    )
}

/// Clone a repository, optionally into a given directory
pub fn git_clone(queue: &mut CommandQueue, url: &str, to: Option<&str>) -> Result<()> {
    let label = format!("git clone {}", basename(url).trim_end_matches(".git"));
    match to {
        Some(to) => queue.append(
            label,
            format!("git clone --quiet {url} {to}"),
            Some(pass_fail(&check::dir_exists(&format!("{to}/.git")))),
        ),
        None => queue.append(label, format!("git clone --quiet {url}"), None),
    }
}

/// Build nginx from a source tarball with the Passenger module
pub fn install_nginx(queue: &mut CommandQueue, url: &str, ssl: bool) -> Result<()> {
    extract(queue, url)?;
    let name = archive_stem(basename(url));
    let flags = if ssl {
        " --extra-configure-flags=--with-http_ssl_module"
    } else {
        ""
    };
    queue.append(
        "install nginx",
        format!(
            "cd /tmp && passenger-install-nginx-module --auto --nginx-source-dir=/tmp/{name}{flags} && rm -rf {name} && cd -"
        ),
        Some(pass_fail(&check::file_exists("/opt/nginx/sbin/nginx"))),
    )
}
