mod cli;
mod display;
mod error;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, RunCommand};
use geoprofile::config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let mut config = read_config_from_toml()?;
    if let Some(base_path) = &args.base_path {
        config.base_path = base_path.clone();
    }
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config)?;
    }
    Ok(())
}

// Linux: ~/.config/geoprofile/config.toml
// macOS: ~/Library/Application Support/geoprofile/config.toml
fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("geoprofile").join("config.toml"))
}

fn read_config_from_toml() -> Result<Config> {
    match config_path() {
        Some(file_path) => read_config(&file_path),
        None => Ok(Config::default()),
    }
}

fn read_config(file_path: &Path) -> Result<Config> {
    match std::fs::read_to_string(file_path) {
        Ok(contents) => toml::from_str(&contents)
            .with_context(|| format!("Invalid TOML in config file {}", file_path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => {
            Err(e).with_context(|| format!("Error reading config file {}", file_path.display()))
        }
    }
}
