//! Path error taxonomy.

use thiserror::Error;

/// Errors raised while validating or normalizing a path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// Malformed path syntax (missing root, empty path, bad prefix).
    #[error("invalid path format")]
    InvalidPathFormat,

    /// A disallowed character appeared in a component.
    #[error("invalid character in path")]
    InvalidCharacter,

    /// A `..` component tried to climb above the root.
    #[error("directory unobtainable: path escapes its root")]
    DirectoryUnobtainable,

    /// The output buffer could not hold the normalized path.
    ///
    /// `written` bytes of truncated (and unusable) output precede the NUL
    /// terminator in the caller's buffer.
    #[error("path too long ({written} bytes written before overflow)")]
    TooLongPath { written: usize },

    /// The mount name exceeds the mount-name length limit.
    #[error("invalid mount name")]
    InvalidMountName,

    /// A path that was required to be in canonical form was not.
    #[error("path is not normalized")]
    NotNormalized,
}

pub type Result<T> = std::result::Result<T, PathError>;
