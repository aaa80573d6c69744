//! Directory tree over two key-value stores.
//!
//! Directories and files live in separate stores, each keyed by
//! `(parent directory position, name)`. Every directory value holds the heads
//! of its child-directory and child-file sibling chains; each child links to
//! the next through its own `next` field.

use romfs_path::{is_normalized, DirectoryPathParser, PathError, PathFlags, ENTRY_NAME_LENGTH_MAX};
use romfs_storage::Storage;
use tracing::{debug, instrument, trace};

use crate::entry::{
    DirectoryRomEntry, EntryKey, FileRomEntry, Position, RomEntryKey, RomFileInfo,
    INVALID_POSITION, ROOT_POSITION,
};
use crate::error::{Result, RomFsError};
use crate::kv::{ChainStats, KeyValueRomStorage};

pub type DirectoryId = Position;
pub type FileId = Position;

type DirectoryStore<S> = KeyValueRomStorage<RomEntryKey, DirectoryRomEntry, S>;
type FileStore<S> = KeyValueRomStorage<RomEntryKey, FileRomEntry, S>;

/// Listing cursor: next unvisited entry in each child chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindPosition {
    pub next_directory: Position,
    pub next_file: Position,
    visited: u64,
}

impl FindPosition {
    pub fn is_exhausted(&self) -> bool {
        self.next_directory == INVALID_POSITION && self.next_file == INVALID_POSITION
    }
}

/// Append cursor for bulk file creation under one directory.
///
/// While consecutive `create_file` calls target the same parent, each new file
/// is linked after `parent_last_file_position` instead of at the chain head,
/// so files list in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheContext {
    pub parent_first_file_position: Position,
    pub parent_last_file_position: Position,
}

impl Default for CacheContext {
    fn default() -> Self {
        Self {
            parent_first_file_position: INVALID_POSITION,
            parent_last_file_position: INVALID_POSITION,
        }
    }
}

/// Arena bytes used by each entry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomFileSystemSize {
    pub directory_entry_size: u64,
    pub file_entry_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    Directory,
    File,
}

/// One listing result from [`HierarchicalRomFileTable::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: Vec<u8>,
    pub position: Position,
}

impl DirEntry {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Table statistics for both stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableStats {
    pub directories: ChainStats,
    pub files: ChainStats,
}

/// A path split into its resolved parent directory and final name.
struct ResolvedPath<'p> {
    parent: Position,
    name: &'p [u8],
}

impl ResolvedPath<'_> {
    fn is_root(&self) -> bool {
        self.parent == INVALID_POSITION
    }

    fn entry_key(&self) -> EntryKey<'_> {
        EntryKey::new(self.parent, self.name)
    }
}

fn lossy_path(path: &[u8]) -> String {
    String::from_utf8_lossy(path).into_owned()
}

/// Hierarchical file table: the directory store, the file store, and path
/// resolution between them.
pub struct HierarchicalRomFileTable<S> {
    directories: DirectoryStore<S>,
    files: FileStore<S>,
}

impl<S> Default for HierarchicalRomFileTable<S> {
    fn default() -> Self {
        Self {
            directories: KeyValueRomStorage::default(),
            files: KeyValueRomStorage::default(),
        }
    }
}

impl<S: Storage> HierarchicalRomFileTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    // =====================================================================
    // Sizing
    // =====================================================================

    pub fn query_directory_entry_bucket_storage_size(bucket_count: u32) -> u64 {
        DirectoryStore::<S>::query_bucket_storage_size(bucket_count)
    }

    pub fn query_directory_entry_size(name_len: usize) -> u64 {
        DirectoryStore::<S>::query_entry_size(name_len)
    }

    pub fn query_file_entry_bucket_storage_size(bucket_count: u32) -> u64 {
        FileStore::<S>::query_bucket_storage_size(bucket_count)
    }

    pub fn query_file_entry_size(name_len: usize) -> u64 {
        FileStore::<S>::query_entry_size(name_len)
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    /// Empties both bucket regions. Bucket counts follow from region sizes.
    pub fn format(directory_buckets: &S, file_buckets: &S) -> Result<()> {
        DirectoryStore::<S>::format(
            directory_buckets,
            DirectoryStore::<S>::query_bucket_count(directory_buckets.size()),
        )?;
        FileStore::<S>::format(
            file_buckets,
            FileStore::<S>::query_bucket_count(file_buckets.size()),
        )
    }

    pub fn initialize(
        &mut self,
        directory_buckets: S,
        directory_entries: S,
        file_buckets: S,
        file_entries: S,
    ) -> Result<()> {
        let dir_count = DirectoryStore::<S>::query_bucket_count(directory_buckets.size());
        let file_count = FileStore::<S>::query_bucket_count(file_buckets.size());
        self.directories
            .initialize(directory_buckets, dir_count, directory_entries)?;
        self.files.initialize(file_buckets, file_count, file_entries)?;
        debug!(
            directory_buckets = dir_count,
            file_buckets = file_count,
            directory_entry_size = self.directories.total_entry_size(),
            file_entry_size = self.files.total_entry_size(),
            "Initialized file table"
        );
        Ok(())
    }

    pub fn finalize(&mut self) {
        self.directories.finalize();
        self.files.finalize();
    }

    pub fn is_initialized(&self) -> bool {
        self.directories.is_initialized() && self.files.is_initialized()
    }

    /// Inserts the root directory; it must be the first directory entry.
    pub fn create_root_directory(&mut self) -> Result<()> {
        let key = EntryKey::new(INVALID_POSITION, &[]);
        let position = self
            .directories
            .add(&key.key, key.hash(), &[], &DirectoryRomEntry::default())
            .map_err(|e| match e {
                RomFsError::AlreadyExists => RomFsError::PathAlreadyExists { path: "/".into() },
                other => other,
            })?;
        if position != ROOT_POSITION {
            return Err(RomFsError::Corrupted(format!(
                "root directory created at {position:#x}"
            )));
        }
        debug!("Created root directory");
        Ok(())
    }

    // =====================================================================
    // Path resolution
    // =====================================================================

    fn check_path(path: &[u8]) -> Result<()> {
        if !is_normalized(path, PathFlags::new())? {
            return Err(PathError::NotNormalized.into());
        }
        Ok(())
    }

    fn ensure_root(&self) -> Result<()> {
        if !self.directories.is_initialized() {
            return Err(RomFsError::NotInitialized);
        }
        if self.directories.total_entry_size() == 0 {
            return Err(RomFsError::DirectoryNotFound { path: "/".into() });
        }
        Ok(())
    }

    fn lookup_directory(&self, parent: Position, name: &[u8]) -> Result<(Position, DirectoryRomEntry)> {
        let key = EntryKey::new(parent, name);
        self.directories.get(&key.key, key.hash(), name)
    }

    /// Walks every directory component except the last one.
    fn resolve<'p>(&self, path: &'p [u8]) -> Result<ResolvedPath<'p>> {
        Self::check_path(path)?;
        self.ensure_root()?;

        if path == b"/" {
            return Ok(ResolvedPath {
                parent: INVALID_POSITION,
                name: &[],
            });
        }

        let mut buffer = Vec::with_capacity(path.len() + 1);
        buffer.extend_from_slice(path);
        buffer.push(0);
        let mut parser = DirectoryPathParser::new(&mut buffer, PathFlags::new())?;

        let mut parent = ROOT_POSITION;
        let mut name_len = 0;
        while let Some(element) = parser.read_next() {
            if element == b"/" {
                continue;
            }
            let component = element.to_vec();
            if parser.is_last() {
                name_len = component.len();
                break;
            }
            parent = match self.lookup_directory(parent, &component) {
                Ok((position, _)) => position,
                Err(RomFsError::KeyNotFound) => {
                    return Err(RomFsError::DirectoryNotFound {
                        path: parser.current_path().to_string(),
                    })
                }
                Err(e) => return Err(e),
            };
            trace!(component = %lossy_path(&component), parent, "Descended");
        }

        if name_len > ENTRY_NAME_LENGTH_MAX {
            return Err(RomFsError::EntryNameTooLong {
                len: name_len,
                max: ENTRY_NAME_LENGTH_MAX,
            });
        }
        Ok(ResolvedPath {
            parent,
            name: &path[path.len() - name_len..],
        })
    }

    // =====================================================================
    // Creation
    // =====================================================================

    /// Creates a directory; its parent must exist. New directories are
    /// linked at the head of the parent's directory chain.
    #[instrument(skip(self, path), fields(path = %lossy_path(path)))]
    pub fn create_directory(&mut self, path: &[u8]) -> Result<DirectoryId> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Err(RomFsError::PathAlreadyExists { path: lossy_path(path) });
        }

        let mut parent_entry = self.directories.get_value_by_position(resolved.parent)?;
        let new_entry = DirectoryRomEntry {
            next: parent_entry.dir,
            ..DirectoryRomEntry::default()
        };

        let key = resolved.entry_key();
        let position = self
            .directories
            .add(&key.key, key.hash(), resolved.name, &new_entry)
            .map_err(|e| match e {
                RomFsError::AlreadyExists => RomFsError::PathAlreadyExists { path: lossy_path(path) },
                other => other,
            })?;

        parent_entry.dir = position;
        self.directories.set_by_position(resolved.parent, &parent_entry)?;

        debug!(position, parent = resolved.parent, "Created directory");
        Ok(position)
    }

    /// Creates a file; its parent must exist.
    ///
    /// Without `cache` the file becomes the head of the parent's file chain.
    /// With `cache` it is appended to the tail, and `cache` is updated to
    /// point at it for the next call.
    #[instrument(skip(self, path, cache), fields(path = %lossy_path(path)))]
    pub fn create_file(
        &mut self,
        path: &[u8],
        info: &RomFileInfo,
        cache: Option<&mut CacheContext>,
    ) -> Result<FileId> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Err(PathError::InvalidPathFormat.into());
        }

        let mut parent_entry = self.directories.get_value_by_position(resolved.parent)?;
        let key = resolved.entry_key();
        let map_exists = |e: RomFsError| match e {
            RomFsError::AlreadyExists => RomFsError::PathAlreadyExists { path: lossy_path(path) },
            other => other,
        };

        let Some(cache) = cache else {
            let entry = FileRomEntry {
                next: parent_entry.file,
                info: *info,
            };
            let position = self
                .files
                .add(&key.key, key.hash(), resolved.name, &entry)
                .map_err(map_exists)?;
            parent_entry.file = position;
            self.directories.set_by_position(resolved.parent, &parent_entry)?;
            debug!(position, parent = resolved.parent, "Created file");
            return Ok(position);
        };

        let tail = self.append_tail(resolved.parent, &parent_entry, cache)?;
        let entry = FileRomEntry {
            next: INVALID_POSITION,
            info: *info,
        };
        let position = self
            .files
            .add(&key.key, key.hash(), resolved.name, &entry)
            .map_err(map_exists)?;

        match tail {
            Some(tail) => {
                let mut tail_entry = self.files.get_value_by_position(tail)?;
                tail_entry.next = position;
                self.files.set_by_position(tail, &tail_entry)?;
            }
            None => {
                parent_entry.file = position;
                self.directories.set_by_position(resolved.parent, &parent_entry)?;
            }
        }

        cache.parent_first_file_position = parent_entry.file;
        cache.parent_last_file_position = position;
        debug!(position, parent = resolved.parent, ?tail, "Appended file");
        Ok(position)
    }

    /// Last file in `parent`'s chain, taken from `cache` when it describes
    /// this parent and found by walking the chain otherwise.
    fn append_tail(
        &self,
        parent: Position,
        parent_entry: &DirectoryRomEntry,
        cache: &CacheContext,
    ) -> Result<Option<FileId>> {
        if parent_entry.file == INVALID_POSITION {
            return Ok(None);
        }

        let last = cache.parent_last_file_position;
        if last != INVALID_POSITION
            && cache.parent_first_file_position == parent_entry.file
            && self.get_parent(last)? == parent
            && self.files.get_value_by_position(last)?.next == INVALID_POSITION
        {
            return Ok(Some(last));
        }

        let limit = self.files.max_entry_count();
        let mut position = parent_entry.file;
        for _ in 0..limit {
            let entry = self.files.get_value_by_position(position)?;
            if entry.next == INVALID_POSITION {
                trace!(parent, tail = position, "Walked file chain to tail");
                return Ok(Some(position));
            }
            position = entry.next;
        }
        Err(RomFsError::Corrupted(format!(
            "cycle in file chain of directory {parent:#x}"
        )))
    }

    /// Parent directory of the file at `file`.
    pub fn get_parent(&self, file: FileId) -> Result<DirectoryId> {
        Ok(self.files.get_key_by_position(file)?.0.parent)
    }

    /// Parent directory of the directory at `directory`; `None` for the root.
    pub fn get_directory_parent(&self, directory: DirectoryId) -> Result<Option<DirectoryId>> {
        let parent = self.directories.get_key_by_position(directory)?.0.parent;
        Ok((parent != INVALID_POSITION).then_some(parent))
    }

    // =====================================================================
    // Lookup
    // =====================================================================

    pub fn convert_path_to_directory_id(&self, path: &[u8]) -> Result<DirectoryId> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Ok(ROOT_POSITION);
        }
        match self.lookup_directory(resolved.parent, resolved.name) {
            Ok((position, _)) => Ok(position),
            Err(RomFsError::KeyNotFound) => Err(RomFsError::DirectoryNotFound { path: lossy_path(path) }),
            Err(e) => Err(e),
        }
    }

    pub fn convert_path_to_file_id(&self, path: &[u8]) -> Result<FileId> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Err(RomFsError::FileNotFound { path: lossy_path(path) });
        }
        let key = resolved.entry_key();
        match self.files.get(&key.key, key.hash(), resolved.name) {
            Ok((position, _)) => Ok(position),
            Err(RomFsError::KeyNotFound) => Err(RomFsError::FileNotFound { path: lossy_path(path) }),
            Err(e) => Err(e),
        }
    }

    pub fn open_file(&self, path: &[u8]) -> Result<RomFileInfo> {
        let id = self.convert_path_to_file_id(path)?;
        self.open_file_by_id(id)
    }

    pub fn open_file_by_id(&self, id: FileId) -> Result<RomFileInfo> {
        Ok(self.files.get_value_by_position(id)?.info)
    }

    /// Name of the entry at `position`.
    pub fn entry_name(&self, kind: EntryKind, position: Position) -> Result<Vec<u8>> {
        match kind {
            EntryKind::Directory => Ok(self.directories.get_key_by_position(position)?.1),
            EntryKind::File => Ok(self.files.get_key_by_position(position)?.1),
        }
    }

    // =====================================================================
    // Listing
    // =====================================================================

    pub fn find_open(&self, path: &[u8]) -> Result<FindPosition> {
        let id = self.convert_path_to_directory_id(path)?;
        self.find_open_by_id(id)
    }

    pub fn find_open_by_id(&self, id: DirectoryId) -> Result<FindPosition> {
        let entry = self.directories.get_value_by_position(id)?;
        Ok(FindPosition {
            next_directory: entry.dir,
            next_file: entry.file,
            visited: 0,
        })
    }

    /// Copies the next child directory's name into `name` and advances.
    ///
    /// Returns the name length, or `None` at the end of the listing. The
    /// name is NUL-terminated when `name` has room for it.
    pub fn find_next_directory(&self, find: &mut FindPosition, name: &mut [u8]) -> Result<Option<usize>> {
        if find.next_directory == INVALID_POSITION {
            return Ok(None);
        }
        self.count_step(find)?;
        let (_, entry, len) = self.directories.get_by_position(find.next_directory, name)?;
        if let Some(terminator) = name.get_mut(len) {
            *terminator = 0;
        }
        find.next_directory = entry.next;
        Ok(Some(len))
    }

    /// Copies the next child file's name into `name` and advances.
    pub fn find_next_file(&self, find: &mut FindPosition, name: &mut [u8]) -> Result<Option<usize>> {
        if find.next_file == INVALID_POSITION {
            return Ok(None);
        }
        self.count_step(find)?;
        let (_, entry, len) = self.files.get_by_position(find.next_file, name)?;
        if let Some(terminator) = name.get_mut(len) {
            *terminator = 0;
        }
        find.next_file = entry.next;
        Ok(Some(len))
    }

    /// Fails once a listing has visited more entries than both arenas hold.
    fn count_step(&self, find: &mut FindPosition) -> Result<()> {
        find.visited += 1;
        let limit = self.directories.max_entry_count() + self.files.max_entry_count();
        if find.visited > limit {
            return Err(RomFsError::Corrupted(format!(
                "sibling chain longer than {limit} entries"
            )));
        }
        Ok(())
    }

    /// Directories then files under `path`, in chain order.
    pub fn read_dir(&self, path: &[u8]) -> Result<Vec<DirEntry>> {
        let mut find = self.find_open(path)?;
        let mut name = vec![0u8; ENTRY_NAME_LENGTH_MAX + 1];
        let mut entries = Vec::new();

        loop {
            let position = find.next_directory;
            let Some(len) = self.find_next_directory(&mut find, &mut name)? else {
                break;
            };
            entries.push(DirEntry {
                kind: EntryKind::Directory,
                name: name[..len].to_vec(),
                position,
            });
        }
        loop {
            let position = find.next_file;
            let Some(len) = self.find_next_file(&mut find, &mut name)? else {
                break;
            };
            entries.push(DirEntry {
                kind: EntryKind::File,
                name: name[..len].to_vec(),
                position,
            });
        }
        Ok(entries)
    }

    // =====================================================================
    // Stats
    // =====================================================================

    pub fn query_rom_file_system_size(&self) -> RomFileSystemSize {
        RomFileSystemSize {
            directory_entry_size: self.directories.total_entry_size(),
            file_entry_size: self.files.total_entry_size(),
        }
    }

    pub fn stats(&self) -> Result<TableStats> {
        Ok(TableStats {
            directories: self.directories.chain_stats()?,
            files: self.files.chain_stats()?,
        })
    }
}
