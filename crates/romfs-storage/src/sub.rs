use tracing::trace;

use crate::{check_range, Result, Storage, StorageError};

/// A window `[offset, offset + size)` into a base storage, addressed from 0.
#[derive(Debug, Clone)]
pub struct SubStorage<S> {
    base: S,
    offset: u64,
    size: u64,
}

impl<S: Storage> SubStorage<S> {
    /// Fails with `OutOfRange` if the window does not fit in `base`.
    pub fn new(base: S, offset: u64, size: u64) -> Result<Self> {
        let base_size = base.size();
        match offset.checked_add(size) {
            Some(end) if end <= base_size => {}
            _ => {
                return Err(StorageError::OutOfRange {
                    offset,
                    len: size as usize,
                    size: base_size,
                })
            }
        }
        trace!(offset, size, "SubStorage window");
        Ok(Self { base, offset, size })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn base(&self) -> &S {
        &self.base
    }
}

impl<S: Storage> Storage for SubStorage<S> {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;
        self.base.read(self.offset + offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;
        self.base.write(self.offset + offset, buf)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn flush(&self) -> Result<()> {
        self.base.flush()
    }
}
