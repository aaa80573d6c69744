use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use romfs_config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Print the built-in defaults as TOML
    Default,

    /// Show config file locations
    Path,

    /// Write the default config to .romfs/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: ConfigCommands, config: &Config) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
            print!("{rendered}");
        }
        ConfigCommands::Default => print!("{}", Config::default_toml()),
        ConfigCommands::Path => {
            let global = Config::global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no home directory)".to_string());
            println!("Global:  {global}");
            println!("Project: .romfs/config.toml");
        }
        ConfigCommands::Init { force } => {
            let path = PathBuf::from(".romfs/config.toml");
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::create_dir_all(".romfs").context("Failed to create .romfs")?;
            std::fs::write(&path, Config::default_toml())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
