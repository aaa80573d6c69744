//! Single-region RomFS images: header, four table regions, file data.
//!
//! Header layout (0x50 bytes, all little-endian u64):
//! ```text
//! offset  field
//! ------  ----------------------
//! 0x00    header_size            (0x50)
//! 0x08    dir_hash_table_offset
//! 0x10    dir_hash_table_size
//! 0x18    dir_meta_table_offset
//! 0x20    dir_meta_table_size
//! 0x28    file_hash_table_offset
//! 0x30    file_hash_table_size
//! 0x38    file_meta_table_offset
//! 0x40    file_meta_table_size
//! 0x48    file_data_offset
//! ```

use romfs_storage::{Storage, SubStorage};
use tracing::{debug, warn};

use crate::entry::RomFileInfo;
use crate::error::{Result, RomFsError};
use crate::table::{FileId, HierarchicalRomFileTable};

pub const ROMFS_HEADER_SIZE: u64 = 0x50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RomFsHeader {
    pub header_size: u64,
    pub dir_hash_table_offset: u64,
    pub dir_hash_table_size: u64,
    pub dir_meta_table_offset: u64,
    pub dir_meta_table_size: u64,
    pub file_hash_table_offset: u64,
    pub file_hash_table_size: u64,
    pub file_meta_table_offset: u64,
    pub file_meta_table_size: u64,
    pub file_data_offset: u64,
}

impl RomFsHeader {
    fn fields(&self) -> [u64; 10] {
        [
            self.header_size,
            self.dir_hash_table_offset,
            self.dir_hash_table_size,
            self.dir_meta_table_offset,
            self.dir_meta_table_size,
            self.file_hash_table_offset,
            self.file_hash_table_size,
            self.file_meta_table_offset,
            self.file_meta_table_size,
            self.file_data_offset,
        ]
    }

    pub fn encode(&self) -> [u8; ROMFS_HEADER_SIZE as usize] {
        let mut buf = [0u8; ROMFS_HEADER_SIZE as usize];
        for (chunk, value) in buf.chunks_exact_mut(8).zip(self.fields()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ROMFS_HEADER_SIZE as usize {
            return Err(RomFsError::InvalidImage(format!(
                "header needs {ROMFS_HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let mut values = [0u64; 10];
        for (value, chunk) in values.iter_mut().zip(buf.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *value = u64::from_le_bytes(bytes);
        }
        Ok(Self {
            header_size: values[0],
            dir_hash_table_offset: values[1],
            dir_hash_table_size: values[2],
            dir_meta_table_offset: values[3],
            dir_meta_table_size: values[4],
            file_hash_table_offset: values[5],
            file_hash_table_size: values[6],
            file_meta_table_offset: values[7],
            file_meta_table_size: values[8],
            file_data_offset: values[9],
        })
    }

    /// Checks the header against an image of `image_size` bytes.
    pub fn validate(&self, image_size: u64) -> Result<()> {
        if self.header_size != ROMFS_HEADER_SIZE {
            return Err(RomFsError::InvalidImage(format!(
                "header size {:#x}, expected {ROMFS_HEADER_SIZE:#x}",
                self.header_size
            )));
        }
        let regions = [
            ("directory hash table", self.dir_hash_table_offset, self.dir_hash_table_size),
            ("directory meta table", self.dir_meta_table_offset, self.dir_meta_table_size),
            ("file hash table", self.file_hash_table_offset, self.file_hash_table_size),
            ("file meta table", self.file_meta_table_offset, self.file_meta_table_size),
        ];
        for (name, offset, size) in regions {
            let end = offset.checked_add(size);
            if offset < self.header_size || end.map_or(true, |end| end > image_size) {
                return Err(RomFsError::InvalidImage(format!(
                    "{name} [{offset:#x}, +{size:#x}) outside image of {image_size:#x} bytes"
                )));
            }
        }
        if self.dir_hash_table_size % 4 != 0 || self.file_hash_table_size % 4 != 0 {
            return Err(RomFsError::InvalidImage("hash table size not a multiple of 4".into()));
        }
        if self.file_data_offset < self.header_size || self.file_data_offset > image_size {
            return Err(RomFsError::InvalidImage(format!(
                "file data offset {:#x} outside image",
                self.file_data_offset
            )));
        }
        Ok(())
    }
}

/// An opened image: the table plus the file data region.
pub struct RomImage<S> {
    header: RomFsHeader,
    table: HierarchicalRomFileTable<SubStorage<S>>,
    data: SubStorage<S>,
}

impl<S: Storage + Clone> RomImage<S> {
    /// Reads and validates the header, then binds the table to its regions.
    pub fn open(storage: S) -> Result<Self> {
        let image_size = storage.size();
        let mut buf = [0u8; ROMFS_HEADER_SIZE as usize];
        storage.read(0, &mut buf).map_err(|_| {
            RomFsError::InvalidImage(format!("image of {image_size} bytes has no header"))
        })?;
        let header = RomFsHeader::decode(&buf)?;
        header.validate(image_size)?;

        let region = |offset: u64, size: u64| SubStorage::new(storage.clone(), offset, size);
        let mut table = HierarchicalRomFileTable::new();
        table.initialize(
            region(header.dir_hash_table_offset, header.dir_hash_table_size)?,
            region(header.dir_meta_table_offset, header.dir_meta_table_size)?,
            region(header.file_hash_table_offset, header.file_hash_table_size)?,
            region(header.file_meta_table_offset, header.file_meta_table_size)?,
        )?;
        let data = region(header.file_data_offset, image_size - header.file_data_offset)?;

        let used = table.query_rom_file_system_size();
        if used.directory_entry_size != header.dir_meta_table_size
            || used.file_entry_size != header.file_meta_table_size
        {
            warn!(
                dir_meta = header.dir_meta_table_size,
                dir_used = used.directory_entry_size,
                file_meta = header.file_meta_table_size,
                file_used = used.file_entry_size,
                "Meta table sizes differ from recovered entry sizes"
            );
        }
        debug!(image_size, data_size = data.size(), "Opened RomFS image");

        Ok(Self {
            header,
            table,
            data,
        })
    }
}

impl<S: Storage> RomImage<S> {
    pub fn header(&self) -> &RomFsHeader {
        &self.header
    }

    pub fn table(&self) -> &HierarchicalRomFileTable<SubStorage<S>> {
        &self.table
    }

    /// Reads the byte range `info` describes.
    pub fn read_file_info(&self, info: &RomFileInfo) -> Result<Vec<u8>> {
        if info.offset < 0 || info.size < 0 {
            return Err(RomFsError::Corrupted(format!(
                "negative file range {}+{}",
                info.offset, info.size
            )));
        }
        let data_size = self.data.size();
        match info.offset.checked_add(info.size) {
            Some(end) if end as u64 <= data_size => {}
            _ => {
                return Err(RomFsError::Corrupted(format!(
                    "file range {}+{} exceeds data region of {} bytes",
                    info.offset, info.size, data_size
                )))
            }
        }
        let mut buf = vec![0u8; info.size as usize];
        self.data.read(info.offset as u64, &mut buf)?;
        Ok(buf)
    }

    pub fn read_file(&self, path: &[u8]) -> Result<Vec<u8>> {
        let info = self.table.open_file(path)?;
        self.read_file_info(&info)
    }

    pub fn read_file_by_id(&self, id: FileId) -> Result<Vec<u8>> {
        let info = self.table.open_file_by_id(id)?;
        self.read_file_info(&info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romfs_storage::MemoryStorage;

    fn sample_header() -> RomFsHeader {
        RomFsHeader {
            header_size: ROMFS_HEADER_SIZE,
            dir_hash_table_offset: 0x50,
            dir_hash_table_size: 0x0C,
            dir_meta_table_offset: 0x5C,
            dir_meta_table_size: 0x18,
            file_hash_table_offset: 0x74,
            file_hash_table_size: 0x0C,
            file_meta_table_offset: 0x80,
            file_meta_table_size: 0,
            file_data_offset: 0x80,
        }
    }

    #[test]
    fn test_header_layout() {
        let header = sample_header();
        let bytes = header.encode();
        assert_eq!(&bytes[..8], &0x50u64.to_le_bytes());
        assert_eq!(&bytes[0x48..], &0x80u64.to_le_bytes());
        assert_eq!(RomFsHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_validate() {
        let header = sample_header();
        assert!(header.validate(0x80).is_ok());
        assert!(header.validate(0x7F).is_err());

        let bad = RomFsHeader {
            header_size: 0x200,
            ..header
        };
        assert!(matches!(bad.validate(0x1000), Err(RomFsError::InvalidImage(_))));
        assert!(RomFsHeader::decode(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_open_rejects_truncated_image() {
        let storage = MemoryStorage::new(16);
        assert!(matches!(RomImage::open(&storage), Err(RomFsError::InvalidImage(_))));
    }
}
