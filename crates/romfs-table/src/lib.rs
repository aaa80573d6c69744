//! # romfs-table
//!
//! ROM-style hierarchical file table persisted over flat storage regions.
//!
//! ## Layers
//!
//! ```text
//! RomImage / RomFsBuilder      one image = header + four table regions + data
//!   HierarchicalRomFileTable   path resolution, sibling chains, listing
//!     KeyValueRomStorage       hash buckets + append-only entry arena
//!       romfs_storage::Storage read/write at region offsets
//! ```
//!
//! Paths handed to the table must be absolute and normalized
//! (see [`romfs_path::normalize`]).

pub mod builder;
pub mod entry;
mod error;
pub mod image;
pub mod kv;
pub mod table;

pub use builder::{suggest_bucket_count, RomFsBuilder, RomFsLayout, DEFAULT_DATA_ALIGNMENT};
pub use entry::{
    DirectoryRomEntry, EntryKey, FileRomEntry, FixedRecord, Position, RomEntryKey, RomEntryName,
    RomFileInfo, INVALID_POSITION, ROOT_POSITION,
};
pub use error::{Result, RomFsError};
pub use image::{RomFsHeader, RomImage, ROMFS_HEADER_SIZE};
pub use kv::{ChainStats, KeyValueRomStorage};
pub use table::{
    CacheContext, DirEntry, DirectoryId, EntryKind, FileId, FindPosition,
    HierarchicalRomFileTable, RomFileSystemSize, TableStats,
};
