//! Windows path prefixes: drive letters, UNC shares and DOS device paths.
//!
//! ```text
//! C:\dir          drive            copied verbatim
//! \\?\C:\dir      DOS device       copied verbatim
//! \\host\share    UNC              canonical form //host/share
//! ```

use crate::error::{PathError, Result};
use crate::utility::{at, check_invalid_character, is_any_separator, DRIVE_SEPARATOR, NUL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsPrefixKind {
    Drive,
    DosDevice,
    Unc,
}

/// A parsed Windows prefix at the start of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsPrefix<'a> {
    pub kind: WindowsPrefixKind,
    /// Bytes of the source path the prefix spans.
    pub len: usize,
    host: &'a [u8],
    share: &'a [u8],
    canonical: bool,
}

impl<'a> WindowsPrefix<'a> {
    /// Whether the source bytes already use the canonical spelling.
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// UNC roots and DOS devices tolerate `..` at their root; drive roots do not.
    pub fn tolerates_root_escape(&self) -> bool {
        self.kind != WindowsPrefixKind::Drive
    }

    /// Length of the canonical spelling.
    pub fn canonical_len(&self) -> usize {
        match self.kind {
            WindowsPrefixKind::Unc => 3 + self.host.len() + self.share.len(),
            _ => self.len,
        }
    }

    /// Emits the canonical spelling of the prefix through `push`.
    pub(crate) fn write_canonical<E>(
        &self,
        source: &[u8],
        mut push: impl FnMut(&[u8]) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        match self.kind {
            WindowsPrefixKind::Unc => {
                push(b"//")?;
                push(self.host)?;
                push(b"/")?;
                push(self.share)
            }
            _ => push(&source[..self.len]),
        }
    }
}

#[inline]
fn is_ascii_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// `X:` at the start of the path.
pub fn is_windows_drive(path: &[u8]) -> bool {
    is_ascii_alpha(at(path, 0)) && at(path, 1) == DRIVE_SEPARATOR
}

/// `\\.\X:` or `\\?\X:` at the start of the path.
pub fn is_dos_device_path(path: &[u8]) -> bool {
    at(path, 0) == b'\\'
        && at(path, 1) == b'\\'
        && matches!(at(path, 2), b'.' | b'?')
        && at(path, 3) == b'\\'
        && is_windows_drive(&path[4.min(path.len())..])
}

/// Two leading separators that are not a DOS device path.
pub fn is_unc_path(path: &[u8]) -> bool {
    is_any_separator(at(path, 0)) && is_any_separator(at(path, 1)) && !is_dos_device_path(path)
}

pub fn is_windows_path(path: &[u8]) -> bool {
    is_windows_drive(path) || is_dos_device_path(path) || is_unc_path(path)
}

/// Length of the Windows prefix of an already-normalized path, 0 if none.
pub fn windows_skip_length(path: &[u8]) -> usize {
    match parse_prefix(path) {
        Ok(Some(prefix)) => prefix.len,
        _ => 0,
    }
}

fn check_unc_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name == b"." || name == b".." {
        return Err(PathError::InvalidPathFormat);
    }
    name.iter().try_for_each(|&c| check_invalid_character(c))
}

/// Parses a Windows prefix, returning `None` when the path has none.
///
/// A malformed UNC prefix (missing share, `.`/`..` names, invalid
/// characters) is an error rather than `None`.
pub fn parse_prefix(path: &[u8]) -> Result<Option<WindowsPrefix<'_>>> {
    if is_dos_device_path(path) {
        return Ok(Some(WindowsPrefix {
            kind: WindowsPrefixKind::DosDevice,
            len: 6,
            host: &[],
            share: &[],
            canonical: true,
        }));
    }

    if is_windows_drive(path) {
        return Ok(Some(WindowsPrefix {
            kind: WindowsPrefixKind::Drive,
            len: 2,
            host: &[],
            share: &[],
            canonical: true,
        }));
    }

    if !is_unc_path(path) {
        return Ok(None);
    }

    let component_end = |start: usize| {
        let mut end = start;
        while end < path.len() && path[end] != NUL && !is_any_separator(path[end]) {
            end += 1;
        }
        end
    };

    let host_end = component_end(2);
    let host = &path[2..host_end];
    check_unc_name(host)?;

    if !is_any_separator(at(path, host_end)) {
        return Err(PathError::InvalidPathFormat);
    }

    let share_start = host_end + 1;
    let share_end = component_end(share_start);
    let share = &path[share_start..share_end];
    check_unc_name(share)?;

    let canonical = path[0] == b'/' && path[1] == b'/' && path[host_end] == b'/';

    Ok(Some(WindowsPrefix {
        kind: WindowsPrefixKind::Unc,
        len: share_end,
        host,
        share,
        canonical,
    }))
}
