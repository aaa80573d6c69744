//! Memory-mapped file regions.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{check_range, Result, Storage, StorageError};

enum Mapping {
    ReadWrite(MmapMut),
    ReadOnly(Mmap),
    // zero-length files cannot be mapped
    Empty,
}

impl Mapping {
    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::ReadWrite(map) => &map[..],
            Mapping::ReadOnly(map) => &map[..],
            Mapping::Empty => &[],
        }
    }
}

/// A file mapped into memory. Writes land in the shared mapping and reach
/// disk on [`Storage::flush`] or when the OS writes the pages back.
pub struct FileStorage {
    map: RwLock<Mapping>,
    path: PathBuf,
}

impl FileStorage {
    /// Creates (or truncates) `path` to exactly `size` zero bytes and maps it.
    pub fn create(path: &Path, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        info!(path = %path.display(), size, "Created storage file");

        let map = if size == 0 {
            Mapping::Empty
        } else {
            // SAFETY: the file is opened by us read-write; concurrent external
            // modification of the file is outside this type's contract.
            Mapping::ReadWrite(unsafe { MmapMut::map_mut(&file)? })
        };
        Ok(Self {
            map: RwLock::new(map),
            path: path.to_path_buf(),
        })
    }

    /// Maps an existing file read-write.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            Mapping::Empty
        } else {
            // SAFETY: see `create`.
            Mapping::ReadWrite(unsafe { MmapMut::map_mut(&file)? })
        };
        debug!(path = %path.display(), size = len, "Opened storage file");
        Ok(Self {
            map: RwLock::new(map),
            path: path.to_path_buf(),
        })
    }

    /// Maps an existing file read-only; writes fail with `ReadOnly`.
    pub fn open_readonly(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            Mapping::Empty
        } else {
            // SAFETY: see `create`.
            Mapping::ReadOnly(unsafe { Mmap::map(&file)? })
        };
        debug!(path = %path.display(), size = len, "Opened storage file read-only");
        Ok(Self {
            map: RwLock::new(map),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        matches!(*self.map.read(), Mapping::ReadOnly(_))
    }
}

impl Storage for FileStorage {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let map = self.map.read();
        let data = map.as_slice();
        check_range(offset, buf.len(), data.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut map = self.map.write();
        match &mut *map {
            Mapping::ReadWrite(data) => {
                check_range(offset, buf.len(), data.len() as u64)?;
                let start = offset as usize;
                data[start..start + buf.len()].copy_from_slice(buf);
                Ok(())
            }
            Mapping::ReadOnly(_) => Err(StorageError::ReadOnly),
            Mapping::Empty => check_range(offset, buf.len(), 0),
        }
    }

    fn size(&self) -> u64 {
        self.map.read().as_slice().len() as u64
    }

    fn flush(&self) -> Result<()> {
        if let Mapping::ReadWrite(data) = &*self.map.read() {
            data.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_write_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");

        let storage = FileStorage::create(&path, 32).unwrap();
        assert_eq!(storage.size(), 32);
        storage.write(8, b"romfs").unwrap();
        storage.flush().unwrap();
        drop(storage);

        let reopened = FileStorage::open_readonly(&path).unwrap();
        assert!(reopened.is_read_only());
        let mut buf = [0u8; 5];
        reopened.read(8, &mut buf).unwrap();
        assert_eq!(&buf, b"romfs");
        assert!(matches!(reopened.write(0, b"x"), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        let storage = FileStorage::create(&path, 0).unwrap();
        assert_eq!(storage.size(), 0);
        assert!(storage.write(0, &[]).is_ok());
        assert!(matches!(
            storage.write(0, b"x"),
            Err(StorageError::OutOfRange { .. })
        ));
    }
}
