use clap::Parser;

#[derive(Parser)]
#[command(name = "machines")]
#[command(version)]
#[command(about = "Bootstrap and provision Ubuntu machines over SSH", long_about = None)]
pub struct Cli {
    /// Run mode: `test` lists the queue, `install` bootstraps the machine
    pub mode: String,

    /// Deployment descriptor: config name, host, password, then optionally
    /// db master, machine name and username
    #[arg(value_name = "FIELD", num_args = 3..=6, required = true)]
    pub descriptor: Vec<String>,

    /// Machinesfile to load
    #[arg(short, long, env = "MACHINESFILE")]
    pub file: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Skip the confirmation before a live install
    #[arg(short, long)]
    pub yes: bool,

    /// Walk through install without connecting to the host (see calls with -v)
    #[arg(long)]
    pub dry_run: bool,

    /// Print the queue as JSON (test mode)
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Reject flag combinations that depend on the mode
    pub fn check_flags(&self) -> anyhow::Result<()> {
        if self.json && self.mode != "test" {
            anyhow::bail!("--json only applies to test mode, not '{}'", self.mode);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_descriptor() {
        let cli = Cli::try_parse_from([
            "machines", "install", "web", "10.0.0.5", "", "10.0.0.6", "shop-web", "deploy", "-y",
        ])
        .unwrap();
        assert_eq!(cli.mode, "install");
        assert_eq!(cli.descriptor.len(), 6);
        assert_eq!(cli.descriptor[2], "");
        assert!(cli.yes);
    }

    #[test]
    fn test_descriptor_needs_three_fields() {
        assert!(Cli::try_parse_from(["machines", "test", "web", "10.0.0.5"]).is_err());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "machines", "test", "web", "10.0.0.5", "pw", "--json", "-vv", "-f", "ops/Machinesfile.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.file.as_deref(), Some("ops/Machinesfile.toml"));
        assert!(cli.check_flags().is_ok());
    }

    #[test]
    fn test_json_rejected_for_install() {
        let cli =
            Cli::try_parse_from(["machines", "install", "web", "10.0.0.5", "pw", "--json"]).unwrap();
        let err = cli.check_flags().unwrap_err();
        assert!(err.to_string().contains("--json only applies to test mode"));
    }

    #[test]
    fn test_install_without_json_passes_checks() {
        let cli = Cli::try_parse_from(["machines", "install", "web", "10.0.0.5", "pw"]).unwrap();
        assert!(cli.check_flags().is_ok());
    }
}
