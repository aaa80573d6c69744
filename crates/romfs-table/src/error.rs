//! Table error taxonomy.

use std::io;

use romfs_path::PathError;
use romfs_storage::StorageError;
use thiserror::Error;

use crate::entry::Position;

/// Errors that can occur during table and image operations
#[derive(Error, Debug)]
pub enum RomFsError {
    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Bucket-store level: no entry with this key.
    #[error("key not found")]
    KeyNotFound,

    /// Bucket-store level: an entry with this key exists.
    #[error("key already exists")]
    AlreadyExists,

    #[error("directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("path already exists: {path}")]
    PathAlreadyExists { path: String },

    /// One path component is longer than an entry name may be.
    #[error("entry name of {len} bytes exceeds {max}")]
    EntryNameTooLong { len: usize, max: usize },

    #[error("entry storage full: need {required} bytes, capacity {capacity}")]
    EntryStorageFull { required: u64, capacity: u64 },

    #[error("name buffer too small: {required} bytes required")]
    NameBufferTooSmall { required: usize },

    #[error("bucket count must be non-zero")]
    ZeroBucketCount,

    #[error("table not initialized")]
    NotInitialized,

    #[error("invalid entry position: {position:#x}")]
    InvalidPosition { position: Position },

    #[error("corrupted table: {0}")]
    Corrupted(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RomFsError {
    /// Missing directory, file, or bucket-store key.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RomFsError::KeyNotFound
                | RomFsError::DirectoryNotFound { .. }
                | RomFsError::FileNotFound { .. }
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            RomFsError::AlreadyExists | RomFsError::PathAlreadyExists { .. }
        )
    }

    /// Malformed, non-normalized or otherwise rejected path.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, RomFsError::Path(_) | RomFsError::EntryNameTooLong { .. })
    }
}

pub type Result<T> = std::result::Result<T, RomFsError>;
