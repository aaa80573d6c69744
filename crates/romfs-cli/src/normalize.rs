use anyhow::{Context, Result};
use clap::Args;
use romfs_config::{log_cli_warn, Config};
use romfs_path::{PathError, PathFlags};

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Path to normalize
    #[arg(value_name = "PATH", allow_hyphen_values = true)]
    pub path: String,

    /// Accept drive, UNC and DOS device prefixes
    #[arg(long)]
    pub windows: bool,

    /// Accept relative paths
    #[arg(long)]
    pub relative: bool,

    /// Accept a `name:` mount prefix
    #[arg(long)]
    pub mount: bool,

    /// Treat `\` as a separator
    #[arg(long)]
    pub backslash: bool,

    /// Skip the invalid-character check
    #[arg(long)]
    pub all_chars: bool,

    /// Accept the empty path
    #[arg(long)]
    pub empty: bool,

    /// Output buffer size including the terminator [default: from config]
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Only check whether PATH is already canonical
    #[arg(long)]
    pub check: bool,
}

impl NormalizeArgs {
    /// Command-line switches on top of the configured defaults.
    fn flags(&self, base: PathFlags) -> PathFlags {
        let mut flags = base;
        if self.windows {
            flags = flags.allow_windows_path();
        }
        if self.relative {
            flags = flags.allow_relative_path();
        }
        if self.mount {
            flags = flags.allow_mount_name();
        }
        if self.backslash {
            flags = flags.allow_backslash();
        }
        if self.all_chars {
            flags = flags.allow_all_characters();
        }
        if self.empty {
            flags = flags.allow_empty_path();
        }
        flags
    }
}

pub fn run(args: NormalizeArgs, config: &Config) -> Result<()> {
    let flags = args.flags(config.path.flags());
    let input = args.path.as_bytes();

    if args.check {
        let normalized = romfs_path::is_normalized(input, flags)
            .with_context(|| format!("Invalid path: {}", args.path))?;
        println!("{}", if normalized { "normalized" } else { "not normalized" });
        return Ok(());
    }

    let mut buffer = vec![0u8; args.max_len.unwrap_or(config.path.max_path_length)];
    match romfs_path::normalize_into(&mut buffer, input, flags) {
        Ok(len) => {
            println!("{}", String::from_utf8_lossy(&buffer[..len]));
            Ok(())
        }
        Err(PathError::TooLongPath { written }) => {
            log_cli_warn!("Normalized path truncated", capacity = buffer.len(), written = written);
            Err(PathError::TooLongPath { written })
                .with_context(|| format!("Normalized form of {} does not fit", args.path))
        }
        Err(e) => Err(e).with_context(|| format!("Invalid path: {}", args.path)),
    }
}
