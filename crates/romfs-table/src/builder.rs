//! Builds RomFS images from explicit entries or a host directory tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path as HostPath, PathBuf};

use romfs_path::{Path, PathFlags};
use romfs_storage::{FileStorage, Storage, SubStorage};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::entry::RomFileInfo;
use crate::error::{Result, RomFsError};
use crate::image::{RomFsHeader, ROMFS_HEADER_SIZE};
use crate::table::{CacheContext, HierarchicalRomFileTable};

/// Default alignment of file data within the data region.
pub const DEFAULT_DATA_ALIGNMENT: u64 = 0x10;

const TABLE_ALIGNMENT: u64 = 4;
const COPY_CHUNK: usize = 64 * 1024;

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Bucket count for `entries` entries: small counts get an odd number,
/// larger ones the next number free of small prime factors.
pub fn suggest_bucket_count(entries: usize) -> u32 {
    let entries = entries as u32;
    if entries < 3 {
        return 3;
    }
    if entries < 19 {
        return entries | 1;
    }
    let mut count = entries;
    while [2, 3, 5, 7, 11, 13, 17].iter().any(|p| count % p == 0) {
        count += 1;
    }
    count
}

#[derive(Debug, Clone)]
enum FileSource {
    Bytes(Vec<u8>),
    Host { path: PathBuf, size: u64 },
}

impl FileSource {
    fn len(&self) -> u64 {
        match self {
            FileSource::Bytes(bytes) => bytes.len() as u64,
            FileSource::Host { size, .. } => *size,
        }
    }
}

/// Region offsets and per-file data placement computed before writing.
#[derive(Debug, Clone)]
pub struct RomFsLayout {
    pub header: RomFsHeader,
    pub dir_bucket_count: u32,
    pub file_bucket_count: u32,
    pub total_size: u64,
    file_offsets: Vec<u64>,
}

/// Collects directories and files, then lays them out into an image.
#[derive(Debug, Clone)]
pub struct RomFsBuilder {
    directories: BTreeSet<Vec<u8>>,
    files: BTreeMap<Vec<u8>, FileSource>,
    data_alignment: u64,
    dir_bucket_count: Option<u32>,
    file_bucket_count: Option<u32>,
}

impl Default for RomFsBuilder {
    fn default() -> Self {
        Self {
            directories: BTreeSet::new(),
            files: BTreeMap::new(),
            data_alignment: DEFAULT_DATA_ALIGNMENT,
            dir_bucket_count: None,
            file_bucket_count: None,
        }
    }
}

impl RomFsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// File data alignment; must be a power of two.
    pub fn with_alignment(mut self, alignment: u64) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(RomFsError::InvalidImage(format!(
                "data alignment {alignment} is not a power of two"
            )));
        }
        self.data_alignment = alignment;
        Ok(self)
    }

    /// Fixed bucket counts; 0 keeps the entry-count heuristic.
    pub fn with_bucket_counts(mut self, directories: u32, files: u32) -> Self {
        self.dir_bucket_count = (directories != 0).then_some(directories);
        self.file_bucket_count = (files != 0).then_some(files);
        self
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len() + 1
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Records `path` (already normalized) and all its ancestors.
    fn insert_directory_chain(&mut self, path: &Path) {
        let mut current = Some(path.clone());
        while let Some(dir) = current {
            if dir.is_root() || !self.directories.insert(dir.as_bytes().to_vec()) {
                break;
            }
            current = dir.parent();
        }
    }

    /// Adds a directory and any missing ancestors.
    pub fn add_directory(&mut self, path: impl AsRef<[u8]>) -> Result<()> {
        let path = Path::new(path.as_ref(), PathFlags::new())?;
        self.insert_directory_chain(&path);
        Ok(())
    }

    fn add_source(&mut self, path: &[u8], source: FileSource) -> Result<()> {
        let path = Path::new(path, PathFlags::new())?;
        if path.is_root() || self.files.contains_key(path.as_bytes()) {
            return Err(RomFsError::PathAlreadyExists {
                path: path.to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            self.insert_directory_chain(&parent);
        }
        self.files.insert(path.as_bytes().to_vec(), source);
        Ok(())
    }

    /// Adds a file with in-memory contents.
    pub fn add_file(&mut self, path: impl AsRef<[u8]>, data: Vec<u8>) -> Result<()> {
        self.add_source(path.as_ref(), FileSource::Bytes(data))
    }

    /// Adds a file whose contents are read from `host` at build time.
    pub fn add_host_file(&mut self, path: impl AsRef<[u8]>, host: &HostPath) -> Result<()> {
        let size = fs::metadata(host)?.len();
        self.add_source(
            path.as_ref(),
            FileSource::Host {
                path: host.to_path_buf(),
                size,
            },
        )
    }

    /// Adds every directory and regular file below `root`.
    pub fn add_host_tree(&mut self, root: &HostPath, follow_symlinks: bool) -> Result<()> {
        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| RomFsError::Io(e.into()))?;
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());

            let mut image_path = String::new();
            let mut representable = true;
            for component in relative.components() {
                match component.as_os_str().to_str() {
                    Some(name) => {
                        image_path.push('/');
                        image_path.push_str(name);
                    }
                    None => representable = false,
                }
            }
            if !representable {
                warn!(path = %entry.path().display(), "Skipping non-UTF-8 path");
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                self.add_directory(image_path.as_bytes())?;
            } else if file_type.is_file() {
                self.add_host_file(image_path.as_bytes(), entry.path())?;
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
            }
        }
        info!(
            root = %root.display(),
            directories = self.directory_count(),
            files = self.file_count(),
            "Collected host tree"
        );
        Ok(())
    }

    /// Directories ordered breadth-first so parents precede children.
    fn directories_breadth_first(&self) -> Vec<&Vec<u8>> {
        let depth = |path: &[u8]| path.iter().filter(|&&c| c == b'/').count();
        let mut dirs: Vec<&Vec<u8>> = self.directories.iter().collect();
        dirs.sort_by(|a, b| depth(a.as_slice()).cmp(&depth(b.as_slice())).then_with(|| a.cmp(b)));
        dirs
    }

    fn name_len(path: &[u8]) -> usize {
        path.len() - path.iter().rposition(|&c| c == b'/').map_or(0, |i| i + 1)
    }

    /// Computes region sizes and offsets without writing anything.
    pub fn layout(&self) -> RomFsLayout {
        type Table = HierarchicalRomFileTable<romfs_storage::MemoryStorage>;

        let dir_bucket_count = self
            .dir_bucket_count
            .unwrap_or_else(|| suggest_bucket_count(self.directory_count()));
        let file_bucket_count = self
            .file_bucket_count
            .unwrap_or_else(|| suggest_bucket_count(self.file_count()));

        let dir_meta_size = Table::query_directory_entry_size(0)
            + self
                .directories
                .iter()
                .map(|p| Table::query_directory_entry_size(Self::name_len(p)))
                .sum::<u64>();
        let file_meta_size = self
            .files
            .keys()
            .map(|p| Table::query_file_entry_size(Self::name_len(p)))
            .sum::<u64>();

        let mut header = RomFsHeader {
            header_size: ROMFS_HEADER_SIZE,
            ..RomFsHeader::default()
        };
        let mut cursor = ROMFS_HEADER_SIZE;
        let mut place = |size: u64| {
            let offset = align_up(cursor, TABLE_ALIGNMENT);
            cursor = offset + size;
            offset
        };
        header.dir_hash_table_size = Table::query_directory_entry_bucket_storage_size(dir_bucket_count);
        header.dir_hash_table_offset = place(header.dir_hash_table_size);
        header.dir_meta_table_size = dir_meta_size;
        header.dir_meta_table_offset = place(dir_meta_size);
        header.file_hash_table_size = Table::query_file_entry_bucket_storage_size(file_bucket_count);
        header.file_hash_table_offset = place(header.file_hash_table_size);
        header.file_meta_table_size = file_meta_size;
        header.file_meta_table_offset = place(file_meta_size);
        header.file_data_offset = align_up(cursor, self.data_alignment);

        let mut data_end = 0u64;
        let mut file_offsets = Vec::with_capacity(self.files.len());
        for source in self.files.values() {
            let offset = align_up(data_end, self.data_alignment);
            file_offsets.push(offset);
            data_end = offset + source.len();
        }

        RomFsLayout {
            header,
            dir_bucket_count,
            file_bucket_count,
            total_size: header.file_data_offset + data_end,
            file_offsets,
        }
    }

    /// Writes the image into `storage`, which must hold `layout().total_size` bytes.
    pub fn build_into<S: Storage>(&self, storage: &S) -> Result<RomFsHeader> {
        let layout = self.layout();
        let header = layout.header;
        if storage.size() < layout.total_size {
            return Err(RomFsError::EntryStorageFull {
                required: layout.total_size,
                capacity: storage.size(),
            });
        }

        let region = |offset: u64, size: u64| SubStorage::new(storage, offset, size);
        let dir_buckets = region(header.dir_hash_table_offset, header.dir_hash_table_size)?;
        let file_buckets = region(header.file_hash_table_offset, header.file_hash_table_size)?;
        HierarchicalRomFileTable::format(&dir_buckets, &file_buckets)?;

        let mut table = HierarchicalRomFileTable::new();
        table.initialize(
            dir_buckets,
            region(header.dir_meta_table_offset, header.dir_meta_table_size)?,
            file_buckets,
            region(header.file_meta_table_offset, header.file_meta_table_size)?,
        )?;
        table.create_root_directory()?;
        for dir in self.directories_breadth_first() {
            table.create_directory(dir)?;
        }

        let data = region(header.file_data_offset, layout.total_size - header.file_data_offset)?;
        let mut cache = CacheContext::default();
        for ((path, source), &offset) in self.files.iter().zip(&layout.file_offsets) {
            let info = RomFileInfo::new(offset as i64, source.len() as i64);
            table.create_file(path, &info, Some(&mut cache))?;
            Self::write_source(&data, offset, source)?;
        }

        let used = table.query_rom_file_system_size();
        if used.directory_entry_size != header.dir_meta_table_size
            || used.file_entry_size != header.file_meta_table_size
        {
            return Err(RomFsError::Corrupted(format!(
                "meta tables used {}/{} bytes, laid out {}/{}",
                used.directory_entry_size,
                used.file_entry_size,
                header.dir_meta_table_size,
                header.file_meta_table_size
            )));
        }

        storage.write(0, &header.encode())?;
        storage.flush()?;
        info!(
            directories = self.directory_count(),
            files = self.file_count(),
            size = layout.total_size,
            "Built RomFS image"
        );
        Ok(header)
    }

    fn write_source<S: Storage>(data: &S, offset: u64, source: &FileSource) -> Result<()> {
        match source {
            FileSource::Bytes(bytes) => data.write(offset, bytes)?,
            FileSource::Host { path, size } => {
                let contents = fs::read(path)?;
                if contents.len() as u64 != *size {
                    return Err(RomFsError::InvalidImage(format!(
                        "{} changed size during build ({} -> {})",
                        path.display(),
                        size,
                        contents.len()
                    )));
                }
                for (i, chunk) in contents.chunks(COPY_CHUNK).enumerate() {
                    data.write(offset + (i * COPY_CHUNK) as u64, chunk)?;
                }
            }
        }
        Ok(())
    }

    /// Builds straight into a new file at `path`.
    pub fn build_to_file(&self, path: &HostPath) -> Result<RomFsHeader> {
        let layout = self.layout();
        let storage = FileStorage::create(path, layout.total_size)?;
        self.build_into(&storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RomImage;
    use romfs_storage::MemoryStorage;

    #[test]
    fn test_suggest_bucket_count() {
        assert_eq!(suggest_bucket_count(0), 3);
        assert_eq!(suggest_bucket_count(2), 3);
        assert_eq!(suggest_bucket_count(4), 5);
        assert_eq!(suggest_bucket_count(7), 7);
        assert_eq!(suggest_bucket_count(19), 19);
        assert_eq!(suggest_bucket_count(20), 23);
        assert_eq!(suggest_bucket_count(361), 361); // 19 * 19
    }

    #[test]
    fn test_add_file_creates_ancestors() {
        let mut builder = RomFsBuilder::new();
        builder.add_file("/a/b/c.txt", b"hi".to_vec()).unwrap();
        assert_eq!(builder.directory_count(), 3);
        assert_eq!(builder.file_count(), 1);
        assert!(builder.add_file("/a/b/c.txt", vec![]).unwrap_err().is_already_exists());
        assert!(builder.add_file("/", vec![]).unwrap_err().is_already_exists());
        assert!(builder.add_file("a", vec![]).unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_file_and_directory_may_share_a_path() {
        let mut builder = RomFsBuilder::new();
        builder.add_file("/x", b"file".to_vec()).unwrap();
        builder.add_directory("/x").unwrap();
        builder.add_file("/y/z", vec![]).unwrap();
        builder.add_file("/y", b"also a file".to_vec()).unwrap();
        assert_eq!(builder.directory_count(), 3);
        assert_eq!(builder.file_count(), 3);

        let storage = MemoryStorage::new(builder.layout().total_size as usize);
        builder.build_into(&storage).unwrap();
        let image = RomImage::open(&storage).unwrap();
        assert_eq!(image.read_file(b"/x").unwrap(), b"file");
        assert!(image.table().convert_path_to_directory_id(b"/x").is_ok());
        assert_eq!(image.read_file(b"/y").unwrap(), b"also a file");
    }

    #[test]
    fn test_layout_aligns_file_data() {
        let mut builder = RomFsBuilder::new().with_alignment(0x20).unwrap();
        builder.add_file("/x", vec![1; 3]).unwrap();
        builder.add_file("/y", vec![2; 5]).unwrap();
        let layout = builder.layout();
        assert_eq!(layout.header.file_data_offset % 0x20, 0);
        assert_eq!(layout.file_offsets, vec![0, 0x20]);
        assert_eq!(layout.total_size, layout.header.file_data_offset + 0x25);
        assert!(RomFsBuilder::new().with_alignment(3).is_err());
    }

    #[test]
    fn test_build_into_too_small_storage() {
        let mut builder = RomFsBuilder::new();
        builder.add_file("/f", vec![0; 64]).unwrap();
        let storage = MemoryStorage::new(16);
        assert!(matches!(
            builder.build_into(&storage),
            Err(RomFsError::EntryStorageFull { .. })
        ));
    }
}
