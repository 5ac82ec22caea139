//! Configuration commands

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use sitegate_runner::SuiteConfig;

use crate::output::{print_serialized, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration to a file
    Init {
        /// Destination; defaults to the --config path
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Load and validate the configuration
    Validate,
}

pub fn execute(cmd: ConfigCommands, config_path: &Path, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Init { path, force } => {
            let path = path.unwrap_or_else(|| config_path.to_path_buf());
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            SuiteConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            print_success(&format!("Wrote default configuration to {}", path.display()));
        }
        ConfigCommands::Show => {
            let config = SuiteConfig::load(config_path)?;
            print_serialized(&config, format);
        }
        ConfigCommands::Validate => {
            let config = SuiteConfig::load(config_path)?;
            config.validate()?;
            print_success(&format!("{} is valid", config_path.display()));
        }
    }
    Ok(())
}
