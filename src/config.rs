//! Machine identity and Machinesfile loading
//!
//! The deployment descriptor comes from the command line; the
//! Machinesfile names the machines it knows about and the tasks to
//! compile. A machine is only provisioned with tasks when its config name
//! matches one of the `[[machines]]` entries.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::intent::Task;

/// Identity used when the descriptor names no user
pub const DEFAULT_USERNAME: &str = "ubuntu";

// ============================================================================
// Machine Config
// ============================================================================

/// Deployment environment of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

/// Connection identity and selection state for one target machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub config_name: String,
    pub host: String,
    /// Encrypted password for the operating user
    pub password: Option<String>,
    pub db_master: String,
    pub machine_name: String,
    pub username: String,
    /// Set by [`select`](Self::select) on a name match
    pub environment: Option<Environment>,
    pub apps: Option<Vec<String>>,
    pub role: Option<String>,
}

impl MachineConfig {
    /// Build from `[config_name, host, password, db_master?, machine_name?, username?]`
    ///
    /// `db_master` defaults to the host, `machine_name` to the config name
    /// and `username` to [`DEFAULT_USERNAME`]. An empty password means none.
    pub fn from_descriptor(fields: &[String]) -> Result<Self> {
        let [config_name, host, password, rest @ ..] = fields else {
            bail!("Deployment descriptor needs at least a config name, host and password");
        };
        if rest.len() > 3 {
            bail!("Deployment descriptor has {} fields, expected at most 6", fields.len());
        }

        let optional = |i: usize| rest.get(i).filter(|s| !s.is_empty()).cloned();

        Ok(Self {
            config_name: config_name.clone(),
            host: host.clone(),
            password: Some(password.clone()).filter(|p| !p.is_empty()),
            db_master: optional(0).unwrap_or_else(|| host.clone()),
            machine_name: optional(1).unwrap_or_else(|| config_name.clone()),
            username: optional(2).unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            environment: None,
            apps: None,
            role: None,
        })
    }

    /// Target-match predicate
    ///
    /// Sets environment, apps and role only when `candidate` is exactly the
    /// active config name. Returns whether it matched.
    pub fn select(
        &mut self,
        candidate: &str,
        environment: Environment,
        apps: Option<&[String]>,
        role: Option<&str>,
    ) -> bool {
        if candidate != self.config_name {
            return false;
        }
        self.environment = Some(environment);
        self.apps = apps.map(<[String]>::to_vec);
        self.role = role.map(str::to_string);
        true
    }

    /// Whether a Machinesfile entry matched this machine
    pub fn is_selected(&self) -> bool {
        self.environment.is_some()
    }

    /// True for any selected, non-production environment
    pub fn is_non_production(&self) -> bool {
        self.environment.is_some_and(|e| !e.is_production())
    }

    /// Value of a Machinesfile `${VAR}` placeholder
    pub fn variable(&self, name: &str) -> Option<&str> {
        match name {
            "HOST" => Some(&self.host),
            "CONFIG_NAME" => Some(&self.config_name),
            "DB_MASTER" => Some(&self.db_master),
            "MACHINE_NAME" => Some(&self.machine_name),
            "USERNAME" => Some(&self.username),
            _ => None,
        }
    }
}

// ============================================================================
// Machinesfile
// ============================================================================

/// Fixed identities and paths used while bootstrapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Account present on a fresh image
    pub identity: String,
    pub identity_password: String,
    /// Root password while elevated
    pub temp_password: String,
    /// crypt(3) form of `temp_password`, handed to usermod
    pub temp_password_encrypted: String,
    pub admin_group: String,
    /// Hostname baked into the image, replaced by the machine name
    pub default_hostname: String,
    /// Local hosts file uploaded to non-production machines
    pub hosts_template: String,
    pub port: u16,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            identity: DEFAULT_USERNAME.to_string(),
            identity_password: DEFAULT_USERNAME.to_string(),
            temp_password: "ubuntu".to_string(),
            temp_password_encrypted: "$1$machines$4b0wX.odJqXSflAAfAIS01".to_string(),
            admin_group: "admin".to_string(),
            default_hostname: "ubuntu".to_string(),
            hosts_template: "etc/hosts".to_string(),
            port: 22,
        }
    }
}

/// A machine the Machinesfile knows how to provision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineEntry {
    pub name: String,
    pub environment: Environment,
    #[serde(default)]
    pub apps: Option<Vec<String>>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Parsed Machinesfile
#[derive(Debug, Deserialize, Default)]
pub struct Machinesfile {
    #[serde(default)]
    pub bootstrap: BootstrapSettings,

    #[serde(default)]
    pub machines: Vec<MachineEntry>,

    /// Tasks in the order they are queued
    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Per-app passwords, keyed by app name
    #[serde(default)]
    pub passwords: BTreeMap<String, String>,

    /// Names of the folders under `users/` next to the Machinesfile
    #[serde(skip)]
    pub users: Vec<String>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Machinesfile {
    /// Load a Machinesfile, substituting the machine's `${VAR}` placeholders
    pub fn load(path: &Path, machine: &MachineConfig) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read Machinesfile: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        Self::parse(&content, base_dir, machine)
            .with_context(|| format!("Invalid Machinesfile: {}", path.display()))
    }

    /// Parse Machinesfile content
    pub fn parse(content: &str, base_dir: PathBuf, machine: &MachineConfig) -> Result<Self> {
        let expanded = shellexpand::env_with_context_no_errors(content, |name| machine.variable(name));
        let mut file: Self = toml::from_str(&expanded).context("Invalid TOML format")?;
        file.users = discover_users(&base_dir)?;
        file.base_dir = base_dir;
        Ok(file)
    }

    /// Add or replace the password of an app, keeping the others
    pub fn password(&mut self, app: impl Into<String>, pass: impl Into<String>) {
        self.passwords.insert(app.into(), pass.into());
    }

    /// Run the target-match predicate against every machine entry
    pub fn resolve(&self, machine: &mut MachineConfig) -> bool {
        let mut matched = false;
        for entry in &self.machines {
            matched |= machine.select(
                &entry.name,
                entry.environment,
                entry.apps.as_deref(),
                entry.role.as_deref(),
            );
        }
        matched
    }

    /// Resolve a path from the Machinesfile against its directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        self.base_dir.join(expanded.as_ref())
    }

    /// Local hosts template
    pub fn hosts_template(&self) -> PathBuf {
        self.resolve_path(&self.bootstrap.hosts_template)
    }
}

/// List the user folders under `base_dir/users`, sorted by name
///
/// A missing `users` directory means no users.
pub fn discover_users(base_dir: &Path) -> Result<Vec<String>> {
    let dir = base_dir.join("users");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut users = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("Could not read users directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            users.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    users.sort();
    log::debug!("Discovered {} users in {}", users.len(), dir.display());
    Ok(users)
}
