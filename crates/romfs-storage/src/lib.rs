//! # romfs-storage
//!
//! Byte-addressed storage regions. Tables never see files or buffers
//! directly, only a [`Storage`] that reads and writes at offsets relative to
//! the start of its region.
//!
//! - [`MemoryStorage`]: growable-at-construction heap buffer
//! - [`FileStorage`]: memory-mapped file
//! - [`SubStorage`]: fixed window into another storage

mod file;
mod memory;
mod sub;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sub::SubStorage;

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by storage regions.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("access out of range: offset {offset} + {len} exceeds region size {size}")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    #[error("storage is read-only")]
    ReadOnly,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A fixed-size byte region.
///
/// Methods take `&self`; implementations synchronize internally so regions
/// can be shared between table instances through `Arc`.
pub trait Storage: Send + Sync {
    /// Fills `buf` from `offset`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` at `offset`.
    fn write(&self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Region size in bytes.
    fn size(&self) -> u64;

    /// Persists pending writes. No-op for volatile regions.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects `[offset, offset + len)` unless it lies inside `[0, size)`.
pub fn check_range(offset: u64, len: usize, size: u64) -> Result<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(StorageError::OutOfRange { offset, len, size }),
    }
}

impl<S: Storage + ?Sized> Storage for &S {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        (**self).write(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        (**self).write(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        (**self).write(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 4, 4).is_ok());
        assert!(check_range(4, 0, 4).is_ok());
        assert!(matches!(
            check_range(1, 4, 4),
            Err(StorageError::OutOfRange { offset: 1, len: 4, size: 4 })
        ));
        assert!(check_range(u64::MAX, 1, 4).is_err());
    }

    #[test]
    fn test_blanket_impls_forward() {
        let storage = Arc::new(MemoryStorage::new(8));
        let boxed: Box<dyn Storage> = Box::new(Arc::clone(&storage));
        boxed.write(2, b"hi").unwrap();

        let by_ref = &*storage;
        let mut buf = [0u8; 2];
        Storage::read(&by_ref, 2, &mut buf).unwrap();
        assert_eq!(&buf, b"hi");
        assert_eq!(boxed.size(), 8);
    }
}
