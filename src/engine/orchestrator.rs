//! Bootstrap state machine
//!
//! `install` logs in as the image's stock identity, gives root a temporary
//! password, opens a root session, renames the machine (non-production
//! only), creates the operating user, runs the queue and finally locks
//! root again. `test` only lists the queue. Anything else does nothing.
//!
//! Every error ends the run at once; completed phases are not undone.

use cmdqueue::{CommandEntry, CommandQueue, Payload};
use remotekit::{Credential, Session, Transport};
use std::fmt;
use std::path::PathBuf;

use super::context::{LineSink, ProgressCallback};
use super::error::Result;
use crate::config::{BootstrapSettings, MachineConfig};
use crate::intent::users::useradd_command;

/// Account elevated during the run
const ROOT: &str = "root";

/// Run mode given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// List the queue, no network I/O
    Test,
    /// Bootstrap and provision the machine
    Install,
    Unknown(String),
}

impl From<&str> for Mode {
    fn from(token: &str) -> Self {
        match token {
            "test" => Self::Test,
            "install" => Self::Install,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Install => write!(f, "install"),
            Self::Unknown(token) => write!(f, "{token}"),
        }
    }
}

/// Phases of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    IdentityLogin,
    ElevateRoot,
    NameAndHosts,
    CreateUser,
    RunQueue,
    Deelevate,
    DrainOnly,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityLogin => "identity login",
            Self::ElevateRoot => "elevate root",
            Self::NameAndHosts => "name and hosts",
            Self::CreateUser => "create user",
            Self::RunQueue => "run queue",
            Self::Deelevate => "de-elevate",
            Self::DrainOnly => "drain only",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unknown mode, nothing happened
    Idle,
    /// Test mode listed this many entries
    Drained { entries: usize },
    /// Install mode ran this many entries
    Provisioned { entries: usize },
}

/// Command that gives root the temporary password through sudo
pub fn elevate_command(settings: &BootstrapSettings) -> String {
    format!(
        "echo {} | sudo -S usermod -p '{}' {ROOT}",
        settings.identity_password, settings.temp_password_encrypted
    )
}

/// Elevation command as it appears in errors, without the passwords
fn redacted_elevate_command() -> String {
    format!("echo **** | sudo -S usermod -p '****' {ROOT}")
}

/// Replace the command line of a failure with `command`
fn redact(err: remotekit::Error, command: String) -> remotekit::Error {
    match err {
        remotekit::Error::CommandFailed { code, stderr, .. } => {
            remotekit::Error::CommandFailed { command, code, stderr }
        }
        other => other,
    }
}

/// Command that swaps the image hostname for the machine name
pub fn hostname_command(settings: &BootstrapSettings, machine_name: &str) -> String {
    format!(
        "sed -i 's/{}/{machine_name}/' /etc/{{hosts,hostname}}",
        settings.default_hostname
    )
}

/// Command that removes root's password again
pub fn deelevate_command() -> String {
    format!("passwd -d {ROOT}")
}

/// Dry-run listing line for an entry
fn listing_line(entry: &CommandEntry) -> String {
    format!("{:<15} {}", entry.label, entry.payload)
}

/// Drives a transport through the bootstrap phases for one machine
pub struct Orchestrator<'a> {
    transport: &'a dyn Transport,
    machine: &'a MachineConfig,
    settings: &'a BootstrapSettings,
    hosts_template: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        machine: &'a MachineConfig,
        settings: &'a BootstrapSettings,
        hosts_template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            machine,
            settings,
            hosts_template: hosts_template.into(),
        }
    }

    /// Run the mode against the queue, consuming its entries
    pub fn run(
        &self,
        mode: &Mode,
        queue: &mut CommandQueue,
        sink: &mut dyn LineSink,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Outcome> {
        match mode {
            Mode::Test => {
                progress.on_phase(Phase::DrainOnly);
                let entries = Self::drain_only(queue, sink)?;
                Ok(Outcome::Drained { entries })
            }
            Mode::Install => {
                let entries = self.provision(queue, progress)?;
                Ok(Outcome::Provisioned { entries })
            }
            Mode::Unknown(token) => {
                log::warn!("Unknown mode '{token}', nothing to do");
                Ok(Outcome::Idle)
            }
        }
    }

    fn drain_only(queue: &mut CommandQueue, sink: &mut dyn LineSink) -> Result<usize> {
        let mut count = 0;
        for entry in queue.drain() {
            entry.validate()?;
            sink.line(&listing_line(&entry));
            count += 1;
        }
        Ok(count)
    }

    fn provision(&self, queue: &mut CommandQueue, progress: &mut dyn ProgressCallback) -> Result<usize> {
        // Nothing is touched remotely while the queue is malformed
        queue.iter().try_for_each(CommandEntry::validate)?;

        let host = &self.machine.host;

        progress.on_phase(Phase::IdentityLogin);
        log::info!("Logging in to {host} as {}", self.settings.identity);
        let mut identity = self.transport.connect(
            host,
            &self.settings.identity,
            &Credential::password(&self.settings.identity_password),
        )?;

        progress.on_phase(Phase::ElevateRoot);
        log::info!("Elevating {ROOT} on {host}");
        identity
            .execute_checked(&elevate_command(self.settings))
            .map_err(|e| redact(e, redacted_elevate_command()))?;
        drop(identity);
        let mut root = self.open_root()?;

        if self.machine.is_non_production() && self.hosts_template.is_file() {
            progress.on_phase(Phase::NameAndHosts);
            log::info!("Naming {host} {}", self.machine.machine_name);
            root.transfer_checked(&self.hosts_template, "/etc/hosts")?;
            root.execute_checked(&hostname_command(self.settings, &self.machine.machine_name))?;
        } else {
            log::debug!("Keeping hostname and /etc/hosts");
        }

        progress.on_phase(Phase::CreateUser);
        log::info!("Creating user {}", self.machine.username);
        root.execute_checked(&useradd_command(
            &self.machine.username,
            self.machine.password.as_deref(),
            &self.settings.admin_group,
        ))?;

        progress.on_phase(Phase::RunQueue);
        let entries = self.run_queue(queue, root.as_mut(), progress)?;

        progress.on_phase(Phase::Deelevate);
        log::info!("Locking {ROOT} on {host}");
        root.execute_checked(&deelevate_command())?;

        Ok(entries)
    }

    fn run_queue(
        &self,
        queue: &mut CommandQueue,
        root: &mut dyn Session,
        progress: &mut dyn ProgressCallback,
    ) -> Result<usize> {
        let mut transfers: Option<Box<dyn Session>> = None;
        let mut count = 0;

        progress.on_queue_start(queue.len());
        for entry in queue.drain() {
            entry.validate()?;
            progress.on_entry_start(&entry.label);
            log::debug!("{}", listing_line(&entry));

            match &entry.payload {
                Payload::Shell(command) => {
                    root.execute_checked(command)?;
                }
                Payload::Transfer { from, to } => {
                    if transfers.is_none() {
                        transfers = Some(self.open_root()?);
                    }
                    if let Some(session) = transfers.as_mut() {
                        session.transfer_checked(from, to)?;
                    }
                }
            }
            if let Some(check) = &entry.check {
                root.execute_checked(check)?;
            }

            progress.on_entry_complete(&entry.label);
            count += 1;
        }
        progress.on_queue_complete();

        Ok(count)
    }

    fn open_root(&self) -> Result<Box<dyn Session>> {
        Ok(self.transport.connect(
            &self.machine.host,
            ROOT,
            &Credential::password(&self.settings.temp_password),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::engine::context::NoProgress;
    use crate::engine::error::BootstrapError;
    use remotekit::ExitStatus;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    /// Every call made through the mock, in order
    #[derive(Default)]
    struct Recording {
        events: Vec<String>,
        fail_on: Option<String>,
    }

    struct RecordingTransport {
        log: Rc<RefCell<Recording>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                log: Rc::new(RefCell::new(Recording::default())),
            }
        }

        fn failing_on(command: &str) -> Self {
            let transport = Self::new();
            transport.log.borrow_mut().fail_on = Some(command.to_string());
            transport
        }

        fn events(&self) -> Vec<String> {
            self.log.borrow().events.clone()
        }
    }

    impl Transport for RecordingTransport {
        fn connect(
            &self,
            host: &str,
            user: &str,
            credential: &Credential,
        ) -> remotekit::Result<Box<dyn Session>> {
            self.log
                .borrow_mut()
                .events
                .push(format!("connect {user}@{host} {}", credential.expose()));
            Ok(Box::new(RecordingSession {
                user: user.to_string(),
                log: Rc::clone(&self.log),
            }))
        }
    }

    struct RecordingSession {
        user: String,
        log: Rc<RefCell<Recording>>,
    }

    impl Session for RecordingSession {
        fn execute(&mut self, command: &str) -> remotekit::Result<ExitStatus> {
            let mut log = self.log.borrow_mut();
            log.events.push(format!("{}: {command}", self.user));
            if log.fail_on.as_deref() == Some(command) {
                return Ok(ExitStatus::failed(1, "boom"));
            }
            Ok(ExitStatus::ok())
        }

        fn transfer(&mut self, from: &Path, to: &str) -> remotekit::Result<ExitStatus> {
            self.log
                .borrow_mut()
                .events
                .push(format!("{}: upload {} {to}", self.user, from.display()));
            Ok(ExitStatus::ok())
        }
    }

    /// Transport whose hosts never accept a connection
    struct RefusingTransport;

    impl Transport for RefusingTransport {
        fn connect(
            &self,
            host: &str,
            _user: &str,
            _credential: &Credential,
        ) -> remotekit::Result<Box<dyn Session>> {
            Err(remotekit::Error::Connect {
                host: host.to_string(),
                message: "connection refused".into(),
            })
        }
    }

    fn machine(environment: Environment) -> MachineConfig {
        let mut machine = MachineConfig::from_descriptor(&[
            "web".to_string(),
            "10.0.0.5".to_string(),
            String::new(),
            String::new(),
            "shop-web".to_string(),
            "deploy".to_string(),
        ])
        .unwrap();
        machine.select("web", environment, None, None);
        machine
    }

    fn queue() -> CommandQueue {
        let mut queue = CommandQueue::new();
        queue.append("update", "apt-get -q update", None).unwrap();
        queue
            .append("install vim", "apt-get -q -y install vim", Some("dpkg -s vim".into()))
            .unwrap();
        queue
    }

    fn run(
        transport: &dyn Transport,
        machine: &MachineConfig,
        mode: &Mode,
        queue: &mut CommandQueue,
        hosts: &Path,
    ) -> (Result<Outcome>, Vec<String>) {
        let settings = BootstrapSettings::default();
        let orchestrator = Orchestrator::new(transport, machine, &settings, hosts);
        let mut lines = Vec::new();
        let outcome = orchestrator.run(mode, queue, &mut lines, &mut NoProgress);
        (outcome, lines)
    }

    #[test]
    fn test_mode_from_token() {
        assert_eq!(Mode::from("test"), Mode::Test);
        assert_eq!(Mode::from("install"), Mode::Install);
        assert_eq!(Mode::from("deploy"), Mode::Unknown("deploy".into()));
    }

    #[test]
    fn test_test_mode_never_connects() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, lines) = run(&transport, &machine, &Mode::Test, &mut queue, Path::new("/nonexistent"));

        assert_eq!(outcome.unwrap(), Outcome::Drained { entries: 2 });
        assert!(transport.events().is_empty());
        assert_eq!(
            lines,
            vec![
                "update          apt-get -q update",
                "install vim     apt-get -q -y install vim",
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unknown_mode_touches_nothing() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, lines) = run(
            &transport,
            &machine,
            &Mode::Unknown("deploy".into()),
            &mut queue,
            Path::new("/nonexistent"),
        );

        assert_eq!(outcome.unwrap(), Outcome::Idle);
        assert!(transport.events().is_empty());
        assert!(lines.is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_install_runs_phases_in_order() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        assert_eq!(outcome.unwrap(), Outcome::Provisioned { entries: 2 });
        assert_eq!(
            transport.events(),
            vec![
                "connect ubuntu@10.0.0.5 ubuntu".to_string(),
                "ubuntu: echo ubuntu | sudo -S usermod -p '$1$machines$4b0wX.odJqXSflAAfAIS01' root".to_string(),
                "connect root@10.0.0.5 ubuntu".to_string(),
                "root: useradd -G admin deploy".to_string(),
                "root: apt-get -q update".to_string(),
                "root: apt-get -q -y install vim".to_string(),
                "root: dpkg -s vim".to_string(),
                "root: passwd -d root".to_string(),
            ]
        );
    }

    #[test]
    fn test_structural_error_aborts_before_connect() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = queue();
        queue.extend([CommandEntry::new("", "true", None)]);

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        assert!(matches!(
            outcome,
            Err(BootstrapError::Structural(cmdqueue::Error::MissingLabel))
        ));
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_structural_error_in_test_mode() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue: CommandQueue = [CommandEntry::new("noop", "", None)].into_iter().collect();

        let (outcome, lines) = run(&transport, &machine, &Mode::Test, &mut queue, Path::new("/nonexistent"));

        assert!(matches!(
            outcome,
            Err(BootstrapError::Structural(cmdqueue::Error::MissingCommand { .. }))
        ));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_transfers_use_one_root_session() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = CommandQueue::new();
        queue
            .append("upload a", Payload::transfer("/work/a", "/etc/a"), None)
            .unwrap();
        queue
            .append("upload b", Payload::transfer("/work/b", "/etc/b"), None)
            .unwrap();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));
        outcome.unwrap();

        let events = transport.events();
        let root_connects = events.iter().filter(|e| e.starts_with("connect root@")).count();
        assert_eq!(root_connects, 2);
        assert!(events.contains(&"root: upload /work/a /etc/a".to_string()));
        assert!(events.contains(&"root: upload /work/b /etc/b".to_string()));
    }

    #[test]
    fn test_command_failure_aborts_before_deelevate() {
        let transport = RecordingTransport::failing_on("apt-get -q update");
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        match outcome {
            Err(BootstrapError::Transport(remotekit::Error::CommandFailed { command, code, .. })) => {
                assert_eq!(command, "apt-get -q update");
                assert_eq!(code, 1);
            }
            other => panic!("expected command failure, got {other:?}"),
        }
        let events = transport.events();
        assert!(!events.iter().any(|e| e.contains("passwd -d root")));
        assert!(!events.iter().any(|e| e.contains("install vim")));
    }

    #[test]
    fn test_hosts_rewrite_for_non_production() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, "127.0.0.1 localhost ubuntu\n").unwrap();

        let transport = RecordingTransport::new();
        let machine = machine(Environment::Staging);
        let mut queue = CommandQueue::new();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, &hosts);
        assert_eq!(outcome.unwrap(), Outcome::Provisioned { entries: 0 });

        let events = transport.events();
        assert!(events.contains(&format!("root: upload {} /etc/hosts", hosts.display())));
        assert!(events.contains(&"root: sed -i 's/ubuntu/shop-web/' /etc/{hosts,hostname}".to_string()));
    }

    #[test]
    fn test_hosts_rewrite_skipped_for_production() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();

        let transport = RecordingTransport::new();
        let machine = machine(Environment::Production);
        let mut queue = CommandQueue::new();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, &hosts);
        outcome.unwrap();
        assert!(!transport.events().iter().any(|e| e.contains("/etc/hosts")));
    }

    #[test]
    fn test_hosts_rewrite_needs_template() {
        let transport = RecordingTransport::new();
        let machine = machine(Environment::Development);
        let mut queue = CommandQueue::new();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent/hosts"));
        outcome.unwrap();
        assert!(!transport.events().iter().any(|e| e.contains("sed -i")));
    }

    #[test]
    fn test_user_password_is_passed_to_useradd() {
        let transport = RecordingTransport::new();
        let mut machine = machine(Environment::Production);
        machine.password = Some("enc123".into());
        let mut queue = CommandQueue::new();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));
        outcome.unwrap();
        assert!(
            transport
                .events()
                .contains(&"root: useradd -p 'enc123' -G admin deploy".to_string())
        );
    }

    #[test]
    fn test_refused_identity_login_passes_through() {
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, _) = run(&RefusingTransport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        match outcome {
            Err(BootstrapError::Transport(remotekit::Error::Connect { host, message })) => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(message, "connection refused");
            }
            other => panic!("expected connect error, got {other:?}"),
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_failing_check_aborts_run() {
        let transport = RecordingTransport::failing_on("dpkg -s vim");
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        match outcome {
            Err(BootstrapError::Transport(remotekit::Error::CommandFailed { command, .. })) => {
                assert_eq!(command, "dpkg -s vim");
            }
            other => panic!("expected check failure, got {other:?}"),
        }
        let events = transport.events();
        assert!(events.contains(&"root: apt-get -q -y install vim".to_string()));
        assert!(!events.iter().any(|e| e.contains("passwd -d root")));
    }

    #[test]
    fn test_elevation_failure_hides_passwords() {
        let settings = BootstrapSettings::default();
        let transport = RecordingTransport::failing_on(&elevate_command(&settings));
        let machine = machine(Environment::Production);
        let mut queue = queue();

        let (outcome, _) = run(&transport, &machine, &Mode::Install, &mut queue, Path::new("/nonexistent"));

        let err = outcome.unwrap_err();
        match &err {
            BootstrapError::Transport(remotekit::Error::CommandFailed { command, code, stderr }) => {
                assert_eq!(command, "echo **** | sudo -S usermod -p '****' root");
                assert_eq!(*code, 1);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected command failure, got {other:?}"),
        }
        let message = err.to_string();
        assert!(!message.contains(&settings.identity_password));
        assert!(!message.contains(&settings.temp_password_encrypted));
        assert!(!transport.events().iter().any(|e| e.starts_with("connect root@")));
    }
}
