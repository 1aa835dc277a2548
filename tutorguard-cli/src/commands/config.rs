use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use tutorguard_core::EngineConfig;

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
    /// Validate a configuration file, or the merged configuration
    Check {
        /// File to check instead of the merged layers
        file: Option<PathBuf>,
    },
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
        ConfigCommands::Check { file } => check_config(file),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{}", toml_str);
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    Ok(())
}

fn check_config(file: Option<PathBuf>) -> Result<()> {
    let config = match &file {
        Some(path) => EngineConfig::load(path)?,
        None => ConfigLoader::load()?,
    };
    println!(
        "Configuration OK (threshold {}, {} hints, {} classifier patterns)",
        config.suspicion.threshold,
        config.tutoring.max_hint_count,
        config.tutoring.patterns.iter().count()
    );
    Ok(())
}
