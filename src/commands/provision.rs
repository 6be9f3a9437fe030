//! The `machines` command: compile the Machinesfile and run it

use anyhow::{Context as _, Result};
use cmdqueue::{CommandEntry, CommandQueue};
use dialoguer::Confirm;
use remotekit::{DryRunTransport, SshTransport, Transport};

use crate::Context;
use crate::cli::Cli;
use crate::config::{MachineConfig, Machinesfile};
use crate::engine::{
    BootstrapError, Mode, NoProgress, Orchestrator, Outcome, ProgressCallback, StdoutSink,
};
use crate::intent::{CompileContext, compile_all};
use crate::paths;
use crate::progress::BarProgress;
use crate::ui;

pub fn run(ctx: &Context, cli: &Cli) -> Result<()> {
    let mode = Mode::from(cli.mode.as_str());
    if let Mode::Unknown(token) = &mode {
        ui::warn(&format!("Unknown mode '{token}', expected 'test' or 'install'"));
        return Ok(());
    }
    cli.check_flags()?;

    let mut machine = MachineConfig::from_descriptor(&cli.descriptor)?;
    let path = paths::machinesfile(cli.file.as_deref())?;
    let file = Machinesfile::load(&path, &machine)?;
    let queue = build_queue(&file, &mut machine)?;
    log::debug!(
        "Machinesfile has {} users and passwords for {} apps",
        file.users.len(),
        file.passwords.len()
    );

    if cli.json && mode == Mode::Test {
        println!("{}", queue_json(&queue)?);
        return Ok(());
    }

    if !ctx.quiet {
        show_summary(&mode, &machine, &file, &queue);
    }

    if mode == Mode::Install && !cli.yes && !cli.dry_run && !confirm_install(&machine)? {
        println!();
        ui::warn("Aborted");
        return Ok(());
    }

    execute(ctx, cli, &mode, &file, &machine, queue)
}

/// Select the machine and compile its tasks
fn build_queue(file: &Machinesfile, machine: &mut MachineConfig) -> Result<CommandQueue> {
    let mut queue = CommandQueue::new();

    file.resolve(machine);
    if !machine.is_selected() {
        ui::warn(&format!(
            "No machine named '{}' in the Machinesfile, nothing will be queued",
            machine.config_name
        ));
        return Ok(queue);
    }

    let compile_ctx = CompileContext {
        machine: &*machine,
        base_dir: &file.base_dir,
        admin_group: &file.bootstrap.admin_group,
    };
    let compiled = compile_all(&file.tasks, &compile_ctx, &mut queue)
        .context("Could not compile Machinesfile tasks")?;
    log::info!(
        "Compiled {compiled} of {} tasks into {} commands",
        file.tasks.len(),
        queue.len()
    );

    Ok(queue)
}

/// Render the queue as a JSON array of entries
fn queue_json(queue: &CommandQueue) -> Result<String> {
    let entries: Vec<&CommandEntry> = queue.iter().collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

fn show_summary(mode: &Mode, machine: &MachineConfig, file: &Machinesfile, queue: &CommandQueue) {
    ui::header(&format!("machines {mode} {}", machine.config_name));
    ui::kv("host", &machine.host);
    ui::kv("machine name", &machine.machine_name);
    ui::kv("user", &machine.username);
    if let Some(env) = machine.environment {
        ui::kv("environment", &env.to_string());
    }
    if let Some(role) = &machine.role {
        ui::kv("role", role);
    }
    if !file.users.is_empty() {
        ui::kv("users", &file.users.join(", "));
    }
    ui::kv("commands", &queue.len().to_string());
    println!();
}

fn confirm_install(machine: &MachineConfig) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Bootstrap {} ({})? Root gets a temporary password until the run ends",
            machine.host, machine.machine_name
        ))
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn execute(
    ctx: &Context,
    cli: &Cli,
    mode: &Mode,
    file: &Machinesfile,
    machine: &MachineConfig,
    mut queue: CommandQueue,
) -> Result<()> {
    let transport: Box<dyn Transport> = if cli.dry_run {
        Box::new(DryRunTransport::new())
    } else {
        Box::new(SshTransport::new().with_port(file.bootstrap.port))
    };
    let mut progress: Box<dyn ProgressCallback> = if ctx.quiet || *mode == Mode::Test {
        Box::new(NoProgress)
    } else {
        Box::new(BarProgress::new())
    };

    let orchestrator = Orchestrator::new(
        transport.as_ref(),
        machine,
        &file.bootstrap,
        file.hosts_template(),
    );

    match orchestrator.run(mode, &mut queue, &mut StdoutSink, progress.as_mut()) {
        Ok(Outcome::Provisioned { entries }) => {
            println!();
            ui::success(&format!(
                "Provisioned {} with {entries} commands",
                machine.machine_name
            ));
            if cli.dry_run {
                ui::info("Dry run - nothing was sent to the host");
            }
            Ok(())
        }
        Ok(Outcome::Drained { entries }) => {
            if !ctx.quiet {
                println!();
                ui::dim(&format!("{entries} commands queued"));
            }
            Ok(())
        }
        Ok(Outcome::Idle) => Ok(()),
        Err(e) => {
            ui::error(&e.to_string());
            if let Some(output) = remote_output(&e) {
                ui::dim(&format!("remote stderr: {output}"));
            }
            ui::dim(e.advice());
            Err(e).with_context(|| format!("Bootstrap of {} failed", machine.host))
        }
    }
}

/// Error output captured from a failed remote command
fn remote_output(err: &BootstrapError) -> Option<&str> {
    match err {
        BootstrapError::Transport(remotekit::Error::CommandFailed { stderr, .. })
            if !stderr.is_empty() =>
        {
            Some(stderr)
        }
        _ => None,
    }
}
