//! Machinesfile lookup
//!
//! # Resolution Priority
//!
//! 1. `--file` (or `MACHINESFILE`), with `~` and `$VARS` expanded
//! 2. `./Machinesfile.toml`
//! 3. `XDG_CONFIG_HOME/machines/Machinesfile.toml` (if set)
//! 4. `~/.config/machines/Machinesfile.toml`

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// File name looked up in the working and config directories
pub const MACHINESFILE: &str = "Machinesfile.toml";

/// Get the machines config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("machines");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("machines"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Locate the Machinesfile to load
pub fn machinesfile(explicit: Option<&str>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Could not determine working directory")?;
    let config = config_dir()?;

    match find_machinesfile(explicit, &cwd, &config) {
        Some(path) => {
            log::debug!("Using Machinesfile: {}", path.display());
            Ok(path)
        }
        None => bail!(
            "No {MACHINESFILE} in {} or {}; pass one with --file",
            cwd.display(),
            config.display()
        ),
    }
}

fn find_machinesfile(explicit: Option<&str>, cwd: &Path, config: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand(path));
    }
    [cwd.join(MACHINESFILE), config.join(MACHINESFILE)]
        .into_iter()
        .find(|p| p.is_file())
}

// ============================================================================
// Tests
// ============================================================================
