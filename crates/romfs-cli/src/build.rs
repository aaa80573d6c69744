use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use romfs_config::{log_build_info, Config};
use romfs_table::RomFsBuilder;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Host directory to pack
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,

    /// Output image path
    #[arg(short, long, value_name = "IMAGE")]
    pub output: PathBuf,

    /// File data alignment in bytes [default: from config]
    #[arg(long)]
    pub alignment: Option<u64>,

    /// Directory hash bucket count (0 = derive from entry count)
    #[arg(long)]
    pub dir_buckets: Option<u32>,

    /// File hash bucket count (0 = derive from entry count)
    #[arg(long)]
    pub file_buckets: Option<u32>,

    /// Follow symbolic links while walking DIR
    #[arg(short = 'L', long)]
    pub follow_symlinks: bool,
}

pub fn run(args: BuildArgs, config: &Config) -> Result<()> {
    if !args.directory.is_dir() {
        bail!("{} is not a directory", args.directory.display());
    }

    let alignment = args.alignment.unwrap_or(config.build.data_alignment);
    let mut builder = RomFsBuilder::new()
        .with_alignment(alignment)
        .context("Invalid data alignment")?
        .with_bucket_counts(
            args.dir_buckets.unwrap_or(config.table.directory_buckets),
            args.file_buckets.unwrap_or(config.table.file_buckets),
        );

    builder
        .add_host_tree(
            &args.directory,
            args.follow_symlinks || config.build.follow_symlinks,
        )
        .with_context(|| format!("Failed to collect {}", args.directory.display()))?;

    let layout = builder.layout();
    log_build_info!(
        "Laid out image",
        dir_buckets = layout.dir_bucket_count,
        file_buckets = layout.file_bucket_count,
        size = layout.total_size
    );

    builder
        .build_to_file(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Built {} ({} directories, {} files, {} bytes)",
        args.output.display(),
        builder.directory_count(),
        builder.file_count(),
        layout.total_size
    );
    Ok(())
}
