use parking_lot::RwLock;

use crate::{check_range, Result, Storage};

/// Heap-backed region of fixed size.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<Vec<u8>>,
}

impl MemoryStorage {
    /// Zero-filled region of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: RwLock::new(vec![0; size]),
        }
    }

    /// Region filled with `byte`.
    pub fn filled(size: usize, byte: u8) -> Self {
        Self {
            data: RwLock::new(vec![byte; size]),
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of the whole region.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.data.read();
        check_range(offset, buf.len(), data.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut data = self.data.write();
        check_range(offset, buf.len(), data.len() as u64)?;
        let start = offset as usize;
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.read().len() as u64
    }
}
