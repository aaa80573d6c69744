//! # romfs CLI
//!
//! Builds RomFS images from host directories and inspects existing images.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod build;
mod config_cmd;
mod inspect;
mod normalize;

/// RomFS image builder and inspector
#[derive(Parser)]
#[command(name = "romfs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an image from a host directory
    Build(build::BuildArgs),

    /// List a directory inside an image
    Ls {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Directory inside the image
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,

        /// Show entry positions and file ranges
        #[arg(short, long)]
        long: bool,
    },

    /// Show table metadata for one path
    Stat {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Write a file's contents to stdout
    Cat {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Header layout and hash table statistics
    Info {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Normalize a path and print the canonical form
    Normalize(normalize::NormalizeArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: config_cmd::ConfigCommands,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = romfs_config::config().clone();
    romfs_config::init_logging(config.log.level().raised(cli.verbose));

    match cli.command {
        Commands::Build(args) => build::run(args, &config),
        Commands::Ls { image, path, long } => inspect::ls(&image, &path, long),
        Commands::Stat { image, path } => inspect::stat(&image, &path),
        Commands::Cat { image, path } => inspect::cat(&image, &path),
        Commands::Info { image } => inspect::info(&image),
        Commands::Normalize(args) => normalize::run(args, &config),
        Commands::Config { command } => config_cmd::run(command, &config),
    }
}
