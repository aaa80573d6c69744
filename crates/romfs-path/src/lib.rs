//! # romfs-path
//!
//! Path validation and canonicalization for the romfs entry table.
//!
//! Every path handed to the table goes through [`normalize`] or is checked
//! with [`is_normalized`] first. Canonical form:
//!
//! - single `/` separators, no trailing separator except on the root
//! - no `.` components; `..` resolved against the preceding component
//! - `..` above the root fails with [`PathError::DirectoryUnobtainable`]
//!   (UNC and DOS device roots absorb it instead)
//!
//! ## Accepted Forms
//!
//! ```text
//! /dir/file             always
//! rom:/dir/file         allow_mount_name
//! C:/dir                allow_windows_path (drive)
//! \\?\C:/dir            allow_windows_path (DOS device)
//! //host/share/dir      allow_windows_path (UNC, from \\host\share\dir)
//! dir/file  ../x  .     allow_relative_path
//! ```

mod error;
mod flags;
mod formatter;
mod normalizer;
mod parser;
mod path;
pub mod utility;
pub mod windows;

pub use error::{PathError, Result};
pub use flags::PathFlags;
pub use formatter::{is_normalized, normalize, normalize_into, parse_mount_name, root_length};
pub use parser::DirectoryPathParser;
pub use path::Path;
pub use utility::{
    ALT_DIRECTORY_SEPARATOR, DIRECTORY_SEPARATOR, DRIVE_SEPARATOR, ENTRY_NAME_LENGTH_MAX,
    INVALID_CHARACTERS, MOUNT_NAME_LENGTH_MAX,
};
