//! Owned, always-normalized paths.

use std::fmt;

use crate::error::{PathError, Result};
use crate::flags::PathFlags;
use crate::formatter::{is_normalized, normalize, root_length};
use crate::utility::{
    check_entry_name, is_any_separator, trim_nul, DIRECTORY_SEPARATOR, DOT, NUL,
};

/// A normalized byte path together with the flags it was validated under.
///
/// The root element (mount name, Windows prefix and root separator) spans
/// the first `root_len` bytes; relative and empty paths have no root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    bytes: Vec<u8>,
    root_len: usize,
    flags: PathFlags,
}

impl Path {
    /// Normalizes `raw` under `flags`.
    pub fn new(raw: impl AsRef<[u8]>, flags: PathFlags) -> Result<Self> {
        let bytes = normalize(raw.as_ref(), flags)?;
        let root_len = root_length(&bytes, flags)?;
        Ok(Self {
            bytes,
            root_len,
            flags,
        })
    }

    /// The plain root path `/`.
    pub fn root() -> Self {
        Self {
            bytes: vec![DIRECTORY_SEPARATOR],
            root_len: 1,
            flags: PathFlags::new(),
        }
    }

    /// Wraps bytes that must already be in canonical form.
    pub fn from_normalized(raw: impl AsRef<[u8]>, flags: PathFlags) -> Result<Self> {
        let raw = trim_nul(raw.as_ref());
        if !is_normalized(raw, flags)? {
            return Err(PathError::NotNormalized);
        }
        Ok(Self {
            bytes: raw.to_vec(),
            root_len: root_length(raw, flags)?,
            flags,
        })
    }

    pub(crate) fn from_parts(bytes: Vec<u8>, root_len: usize, flags: PathFlags) -> Self {
        Self {
            bytes,
            root_len,
            flags,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The path as UTF-8, if it is.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// NUL-terminated copy, as consumed by [`crate::DirectoryPathParser`].
    pub fn to_nul_terminated(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bytes.len() + 1);
        buf.extend_from_slice(&self.bytes);
        buf.push(NUL);
        buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn flags(&self) -> PathFlags {
        self.flags
    }

    /// Bytes of the root element, empty for relative paths.
    pub fn root_bytes(&self) -> &[u8] {
        &self.bytes[..self.root_len]
    }

    pub fn is_absolute(&self) -> bool {
        self.root_len > 0
    }

    pub fn is_root(&self) -> bool {
        self.root_len > 0 && self.bytes.len() == self.root_len
    }

    fn is_current_directory(&self) -> bool {
        self.root_len == 0 && self.bytes == [DOT]
    }

    /// Appends a single entry name.
    pub fn join(&self, name: impl AsRef<[u8]>) -> Result<Self> {
        let name = name.as_ref();
        if self.flags.are_all_characters_allowed() {
            if name.is_empty() || name == b"." || name == b".." {
                return Err(PathError::InvalidPathFormat);
            }
            if name.iter().any(|&c| is_any_separator(c) || c == NUL) {
                return Err(PathError::InvalidCharacter);
            }
        } else {
            check_entry_name(name)?;
        }

        if self.is_empty() || self.is_current_directory() {
            if !self.flags.is_relative_path_allowed() {
                return Err(PathError::InvalidPathFormat);
            }
            return Ok(Self::from_parts(name.to_vec(), 0, self.flags));
        }

        let mut bytes = Vec::with_capacity(self.bytes.len() + name.len() + 1);
        bytes.extend_from_slice(&self.bytes);
        if !self.is_root() {
            bytes.push(DIRECTORY_SEPARATOR);
        }
        bytes.extend_from_slice(name);
        Ok(Self::from_parts(bytes, self.root_len, self.flags))
    }

    /// The containing directory, or `None` at the root and for relative
    /// paths that cannot be resolved further (`.`, `..`).
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() || self.is_empty() || self.is_current_directory() {
            return None;
        }
        if self.file_name().is_none() {
            return None;
        }

        let body = &self.bytes[self.root_len..];
        match body.iter().rposition(|&c| c == DIRECTORY_SEPARATOR) {
            Some(idx) => Some(Self::from_parts(
                self.bytes[..self.root_len + idx].to_vec(),
                self.root_len,
                self.flags,
            )),
            None if self.root_len > 0 => Some(Self::from_parts(
                self.bytes[..self.root_len].to_vec(),
                self.root_len,
                self.flags,
            )),
            None => Some(Self::from_parts(vec![DOT], 0, self.flags)),
        }
    }

    /// Last component, `None` for roots, `.` and a trailing `..`.
    pub fn file_name(&self) -> Option<&[u8]> {
        let body = &self.bytes[self.root_len..];
        let name = match body.iter().rposition(|&c| c == DIRECTORY_SEPARATOR) {
            Some(idx) => &body[idx + 1..],
            None => body,
        };
        match name {
            b"" | b"." | b".." => None,
            _ => Some(name),
        }
    }

    /// Components after the root element.
    pub fn components(&self) -> impl Iterator<Item = &[u8]> {
        let body: &[u8] = if self.is_current_directory() {
            &[]
        } else {
            &self.bytes[self.root_len..]
        };
        body.split(|&c| c == DIRECTORY_SEPARATOR)
            .filter(|component| !component.is_empty())
    }

    /// Prefix match on component boundaries: `/a/bc` does not start with `/a/b`.
    pub fn starts_with_path(&self, other: &Path) -> bool {
        if !self.bytes.starts_with(&other.bytes) {
            return false;
        }
        if self.bytes.len() == other.bytes.len() || other.is_root() {
            return true;
        }
        if other.is_current_directory() && self.root_len == 0 {
            return true;
        }
        self.bytes[other.bytes.len()] == DIRECTORY_SEPARATOR
    }
}

impl AsRef<[u8]> for Path {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}
