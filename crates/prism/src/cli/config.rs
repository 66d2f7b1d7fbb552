//! The `prism config` command for configuration management.

use clap::{Args, Subcommand};
use prism_core::Config;
use std::path::PathBuf;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration (literal credentials are masked)
    Show,

    /// Show config file path and the resolved data paths
    Path,

    /// Check a config file without using it
    Check {
        /// File to check (defaults to the standard location)
        path: Option<PathBuf>,
    },

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = masked(Config::load()?);
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            let config = Config::load().unwrap_or_default();
            println!("config:      {}", Config::default_path().display());
            println!("blur index:  {}", config.index_path().display());
            println!("local store: {}", config.local_store_root().display());
        }

        ConfigCommand::Check { path } => {
            let path = path.unwrap_or_else(Config::default_path);
            Config::load_from(&path)?;
            println!("{} is valid", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml = Config::default().to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Replace literal Cloudinary credentials; `${VAR}` references stay visible.
fn masked(mut config: Config) -> Config {
    for secret in [&mut config.cloudinary.api_key, &mut config.cloudinary.api_secret] {
        if !secret.is_empty() && !(secret.starts_with("${") && secret.ends_with('}')) {
            *secret = "********".to_string();
        }
    }
    config
}
