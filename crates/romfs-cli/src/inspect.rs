//! Read-only image commands: `ls`, `stat`, `cat`, `info`.

use std::io::Write;
use std::path::Path as HostPath;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use romfs_config::{log_cli_debug, log_image_debug};
use romfs_path::PathFlags;
use romfs_storage::FileStorage;
use romfs_table::{ChainStats, EntryKind, RomFsError, RomImage};

type Image = RomImage<Arc<FileStorage>>;

fn open_image(path: &HostPath) -> Result<Image> {
    let storage = FileStorage::open_readonly(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    log_image_debug!("Opening image", size = romfs_storage::Storage::size(&storage));
    RomImage::open(Arc::new(storage))
        .with_context(|| format!("{} is not a valid RomFS image", path.display()))
}

/// Canonical absolute form of a user-supplied image path.
fn image_path(path: &str) -> Result<Vec<u8>> {
    let normalized = romfs_path::normalize(path.as_bytes(), PathFlags::new())
        .with_context(|| format!("Invalid image path: {path}"))?;
    let shown = String::from_utf8_lossy(&normalized);
    log_cli_debug!("Resolved image path", input = path, normalized = &*shown);
    Ok(normalized)
}

pub fn ls(image: &HostPath, path: &str, long: bool) -> Result<()> {
    let image = open_image(image)?;
    let path = image_path(path)?;
    let table = image.table();
    let entries = table
        .read_dir(&path)
        .with_context(|| format!("Cannot list {}", String::from_utf8_lossy(&path)))?;

    let mut out = std::io::stdout().lock();
    for entry in entries {
        match (entry.kind, long) {
            (EntryKind::Directory, false) => writeln!(out, "{}/", entry.name_lossy())?,
            (EntryKind::File, false) => writeln!(out, "{}", entry.name_lossy())?,
            (EntryKind::Directory, true) => {
                writeln!(out, "d {:>8} {:>12} {}/", entry.position, "-", entry.name_lossy())?
            }
            (EntryKind::File, true) => {
                let info = table.open_file_by_id(entry.position)?;
                writeln!(
                    out,
                    "f {:>8} {:>12} {} @{:#x}",
                    entry.position,
                    info.size,
                    entry.name_lossy(),
                    info.offset
                )?
            }
        }
    }
    Ok(())
}

pub fn stat(image: &HostPath, path: &str) -> Result<()> {
    let image = open_image(image)?;
    let path = image_path(path)?;
    let table = image.table();
    let display = String::from_utf8_lossy(&path).into_owned();
    let mut found = false;

    match table.convert_path_to_directory_id(&path) {
        Ok(id) => {
            found = true;
            let parent = table.get_directory_parent(id)?;
            let children = table.read_dir(&path)?;
            println!("{display}: directory");
            println!("  id:       {id}");
            match parent {
                Some(parent) => println!("  parent:   {parent}"),
                None => println!("  parent:   -"),
            }
            println!("  children: {}", children.len());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e).with_context(|| format!("Cannot stat {display}")),
    }

    match table.convert_path_to_file_id(&path) {
        Ok(id) => {
            found = true;
            let info = table.open_file_by_id(id)?;
            println!("{display}: file");
            println!("  id:       {id}");
            println!("  parent:   {}", table.get_parent(id)?);
            println!("  offset:   {:#x}", info.offset);
            println!("  size:     {}", info.size);
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e).with_context(|| format!("Cannot stat {display}")),
    }

    if !found {
        bail!("{display}: no such file or directory");
    }
    Ok(())
}

pub fn cat(image: &HostPath, path: &str) -> Result<()> {
    let image = open_image(image)?;
    let path = image_path(path)?;
    let data = match image.read_file(&path) {
        Ok(data) => data,
        Err(RomFsError::FileNotFound { path }) => bail!("{path}: no such file"),
        Err(e) => return Err(e).context("Failed to read file"),
    };

    let mut out = std::io::stdout().lock();
    match out.write_all(&data).and_then(|()| out.flush()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn print_chain_stats(label: &str, stats: &ChainStats) {
    println!("{label}:");
    println!("  entries:      {}", stats.entry_count);
    println!(
        "  buckets:      {} ({} used)",
        stats.bucket_count, stats.used_buckets
    );
    println!("  load factor:  {:.2}", stats.load_factor);
    println!(
        "  chain length: avg {:.2}, max {}",
        stats.avg_chain, stats.max_chain
    );
}

pub fn info(image: &HostPath) -> Result<()> {
    let image = open_image(image)?;
    let header = image.header();
    let stats = image.table().stats().context("Failed to walk hash chains")?;

    println!("Header ({:#x} bytes):", header.header_size);
    let regions = [
        ("dir hash", header.dir_hash_table_offset, header.dir_hash_table_size),
        ("dir meta", header.dir_meta_table_offset, header.dir_meta_table_size),
        ("file hash", header.file_hash_table_offset, header.file_hash_table_size),
        ("file meta", header.file_meta_table_offset, header.file_meta_table_size),
    ];
    for (name, offset, size) in regions {
        println!("  {name:<10} @{offset:#08x}  {size:>10} bytes");
    }
    println!("  {:<10} @{:#08x}", "file data", header.file_data_offset);
    print_chain_stats("Directories", &stats.directories);
    print_chain_stats("Files", &stats.files);
    Ok(())
}
