//! Provisioning intents and their compilation into queue entries
//!
//! Each Machinesfile task names one intent. Compiling a task appends one
//! or more entries to the [`CommandQueue`] passed in; nothing is executed
//! here. The compilers themselves live in the submodules and are pure
//! string builders.

use cmdqueue::{CommandQueue, Result};
use serde::Deserialize;
use std::path::Path;

use crate::config::{Environment, MachineConfig};

pub mod file_ops;
pub mod installation;
pub mod sources;
pub mod users;

pub use file_ops::{LinkOptions, Ownership, ReplaceOptions};
pub use installation::{InstallSource, RunOptions};
pub use sources::SourceOptions;

/// One string or an ordered list of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// Restricts a task to matching machines
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selector {
    pub environment: Option<Environment>,
    pub role: Option<String>,
    pub app: Option<String>,
}

impl Selector {
    pub fn matches(&self, machine: &MachineConfig) -> bool {
        if let Some(env) = self.environment
            && machine.environment != Some(env)
        {
            return false;
        }
        if let Some(role) = &self.role
            && machine.role.as_ref() != Some(role)
        {
            return false;
        }
        if let Some(app) = &self.app
            && !machine.apps.as_ref().is_some_and(|apps| apps.contains(app))
        {
            return false;
        }
        true
    }
}

/// A Machinesfile task: an intent plus an optional selector
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub when: Option<Selector>,
    #[serde(flatten)]
    pub intent: Intent,
}

/// Every provisioning intent a Machinesfile can request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    Update,
    Install {
        packages: OneOrMany,
        to: Option<String>,
        #[serde(rename = "as")]
        as_user: Option<String>,
        args: Option<String>,
    },
    Uninstall {
        packages: OneOrMany,
    },
    Run {
        commands: OneOrMany,
        label: Option<String>,
        #[serde(rename = "as")]
        as_user: Option<String>,
        check: Option<String>,
    },
    Gem {
        name: String,
        version: Option<String>,
    },
    GemUpdate {
        #[serde(default)]
        flags: String,
    },
    Extract {
        url: String,
    },
    GitClone {
        url: String,
        to: Option<String>,
    },
    InstallNginx {
        url: String,
        #[serde(default)]
        ssl: bool,
    },
    AddSource {
        name: String,
        source: String,
        key_url: Option<String>,
        key_name: Option<String>,
    },
    AddPpa {
        ppa: String,
        key_name: String,
    },
    CreateUser {
        username: String,
        password: Option<String>,
        group: Option<String>,
    },
    Upload {
        from: String,
        to: String,
        perms: Option<String>,
        owner: Option<String>,
    },
    Rename {
        from: String,
        to: String,
    },
    Copy {
        from: String,
        to: String,
    },
    Remove {
        path: String,
        #[serde(default)]
        force: bool,
    },
    RemoveVersionInfo {
        name: String,
    },
    Link {
        from: String,
        to: Option<String>,
    },
    Replace {
        what: String,
        with: Option<String>,
        #[serde(rename = "in")]
        in_file: Option<String>,
    },
    Mkdir {
        path: String,
        perms: Option<String>,
        owner: Option<String>,
    },
    Chmod {
        mode: String,
        path: String,
    },
    Chown {
        owner: String,
        path: String,
    },
    MakeAppStructure {
        path: String,
        owner: Option<String>,
    },
}

/// What a compiler may need to know beyond its own options
pub struct CompileContext<'a> {
    pub machine: &'a MachineConfig,
    /// Directory local upload paths are relative to
    pub base_dir: &'a Path,
    /// Group new users join by default
    pub admin_group: &'a str,
}

impl Intent {
    /// Append this intent's entries to the queue
    pub fn compile(&self, queue: &mut CommandQueue, ctx: &CompileContext) -> Result<()> {
        match self {
            Intent::Update => installation::update(queue),
            Intent::Install {
                packages,
                to,
                as_user,
                args,
            } => match InstallSource::classify(packages, to.clone(), args.clone()) {
                Some(source) => installation::install(queue, &source, as_user.as_deref()),
                None => {
                    log::debug!("Ignoring install of unrecognised packages {packages:?}");
                    Ok(())
                }
            },
            Intent::Uninstall { packages } => installation::uninstall(queue, &packages.to_vec()),
            Intent::Run {
                commands,
                label,
                as_user,
                check,
            } => installation::run(
                queue,
                label.as_deref().unwrap_or("run"),
                &commands.to_vec(),
                &RunOptions {
                    as_user: as_user.clone(),
                    check: check.clone(),
                },
            ),
            Intent::Gem { name, version } => installation::gem(queue, name, version.as_deref()),
            Intent::GemUpdate { flags } => installation::gem_update(queue, flags),
            Intent::Extract { url } => installation::extract(queue, url),
            Intent::GitClone { url, to } => installation::git_clone(queue, url, to.as_deref()),
            Intent::InstallNginx { url, ssl } => installation::install_nginx(queue, url, *ssl),
            Intent::AddSource {
                name,
                source,
                key_url,
                key_name,
            } => sources::add_source(
                queue,
                name,
                source,
                &SourceOptions {
                    key_url: key_url.clone(),
                    key_name: key_name.clone(),
                },
            ),
            Intent::AddPpa { ppa, key_name } => sources::add_ppa(queue, ppa, key_name),
            Intent::CreateUser {
                username,
                password,
                group,
            } => users::create_user(
                queue,
                username,
                password.as_deref(),
                group.as_deref().unwrap_or(ctx.admin_group),
            ),
            Intent::Upload {
                from,
                to,
                perms,
                owner,
            } => file_ops::upload(
                queue,
                ctx.base_dir.join(from),
                to,
                &Ownership {
                    perms: perms.clone(),
                    owner: owner.clone(),
                },
            ),
            Intent::Rename { from, to } => file_ops::rename(queue, from, to),
            Intent::Copy { from, to } => file_ops::copy(queue, from, to),
            Intent::Remove { path, force } => file_ops::remove(queue, path, *force),
            Intent::RemoveVersionInfo { name } => file_ops::remove_version_info(queue, name),
            Intent::Link { from, to } => {
                file_ops::link(queue, from, &LinkOptions { to: to.clone() })
            }
            Intent::Replace {
                what,
                with,
                in_file,
            } => file_ops::replace(
                queue,
                what,
                &ReplaceOptions {
                    with: with.clone(),
                    in_file: in_file.clone(),
                },
            ),
            Intent::Mkdir { path, perms, owner } => file_ops::mkdir(
                queue,
                path,
                &Ownership {
                    perms: perms.clone(),
                    owner: owner.clone(),
                },
            ),
            Intent::Chmod { mode, path } => file_ops::chmod(queue, mode, path),
            Intent::Chown { owner, path } => file_ops::chown(queue, owner, path),
            Intent::MakeAppStructure { path, owner } => file_ops::make_app_structure(
                queue,
                path,
                owner.as_deref().unwrap_or(&ctx.machine.username),
            ),
        }
    }
}

/// Compile every task whose selector matches the machine, in order
///
/// Returns the number of tasks compiled. Stops at the first structural
/// error.
pub fn compile_all(tasks: &[Task], ctx: &CompileContext, queue: &mut CommandQueue) -> Result<usize> {
    let mut compiled = 0;
    for task in tasks {
        if let Some(selector) = &task.when
            && !selector.matches(ctx.machine)
        {
            log::debug!("Skipping {:?}: selector does not match", task.intent);
            continue;
        }
        task.intent.compile(queue, ctx)?;
        compiled += 1;
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdqueue::Error;
    use std::path::PathBuf;

    fn selected_machine() -> MachineConfig {
        let mut machine = MachineConfig::from_descriptor(&[
            "web".to_string(),
            "10.0.0.5".to_string(),
            String::new(),
        ])
        .unwrap();
        let apps = vec!["shop".to_string()];
        machine.select("web", Environment::Staging, Some(&apps), Some("app"));
        machine
    }

    fn parse_tasks(toml_src: &str) -> Vec<Task> {
        #[derive(Deserialize)]
        struct Wrapper {
            tasks: Vec<Task>,
        }
        toml::from_str::<Wrapper>(toml_src).unwrap().tasks
    }

    fn compile(toml_src: &str) -> Result<CommandQueue> {
        let machine = selected_machine();
        let base = PathBuf::from("/work");
        let ctx = CompileContext {
            machine: &machine,
            base_dir: &base,
            admin_group: "admin",
        };
        let mut queue = CommandQueue::new();
        compile_all(&parse_tasks(toml_src), &ctx, &mut queue)?;
        Ok(queue)
    }

    #[test]
    fn test_selector_filters_tasks() {
        let queue = compile(
            r#"
            [[tasks]]
            action = "install"
            packages = ["nginx"]
            when = { role = "app" }

            [[tasks]]
            action = "install"
            packages = ["postgresql"]
            when = { role = "db" }

            [[tasks]]
            action = "install"
            packages = ["redis-server"]
            when = { environment = "staging", app = "shop" }
            "#,
        )
        .unwrap();

        let labels: Vec<&str> = queue.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["install nginx", "install redis-server"]);
    }

    #[test]
    fn test_unrecognised_install_is_noop() {
        let queue = compile(
            r#"
            [[tasks]]
            action = "install"
            packages = "ftp://example.com/thing"
            "#,
        )
        .unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_missing_option_stops_compilation() {
        let err = compile(
            r#"
            [[tasks]]
            action = "replace"
            what = "foo"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::MissingOptions {
                operation: "replace",
                keys: vec!["with", "in"],
            }
        );
    }

    #[test]
    fn test_upload_is_relative_to_machinesfile() {
        let queue = compile(
            r#"
            [[tasks]]
            action = "upload"
            from = "files/nginx.conf"
            to = "/etc/nginx/nginx.conf"
            "#,
        )
        .unwrap();
        let entry = queue.iter().next().unwrap();
        assert_eq!(
            entry.payload,
            cmdqueue::Payload::transfer("/work/files/nginx.conf", "/etc/nginx/nginx.conf")
        );
    }

    #[test]
    fn test_make_app_structure_defaults_to_machine_user() {
        let queue = compile(
            r#"
            [[tasks]]
            action = "make_app_structure"
            path = "/srv/shop"
            "#,
        )
        .unwrap();
        assert!(
            queue
                .iter()
                .any(|e| e.payload.to_string() == "chown ubuntu:ubuntu /srv/shop/releases")
        );
    }

    #[test]
    fn test_create_user_uses_admin_group() {
        let queue = compile(
            r#"
            [[tasks]]
            action = "create_user"
            username = "deploy"
            "#,
        )
        .unwrap();
        assert_eq!(
            queue.iter().next().unwrap().payload.to_string(),
            "useradd -G admin deploy"
        );
    }
}
