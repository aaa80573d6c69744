//! Byte-level helpers shared by the normalizer, the formatter and the parser.
//!
//! Paths are handled as raw bytes. A NUL byte terminates a path early, so a
//! caller may hand over a whole fixed-size buffer.

use crate::error::{PathError, Result};

pub const DIRECTORY_SEPARATOR: u8 = b'/';
pub const ALT_DIRECTORY_SEPARATOR: u8 = b'\\';
pub const DRIVE_SEPARATOR: u8 = b':';
pub const DOT: u8 = b'.';
pub const NUL: u8 = 0;

/// Longest accepted mount name, excluding the trailing `:`.
pub const MOUNT_NAME_LENGTH_MAX: usize = 15;

/// Longest single component name the table layer stores.
pub const ENTRY_NAME_LENGTH_MAX: usize = 0x300;

/// Characters rejected inside path components.
pub const INVALID_CHARACTERS: &[u8] = b":*?<>|";

/// Byte at `index`, or NUL when out of range.
#[inline]
pub fn at(path: &[u8], index: usize) -> u8 {
    path.get(index).copied().unwrap_or(NUL)
}

/// The path up to (not including) its first NUL.
#[inline]
pub fn trim_nul(path: &[u8]) -> &[u8] {
    match path.iter().position(|&c| c == NUL) {
        Some(end) => &path[..end],
        None => path,
    }
}

#[inline]
pub fn is_separator(c: u8) -> bool {
    c == DIRECTORY_SEPARATOR
}

#[inline]
pub fn is_any_separator(c: u8) -> bool {
    c == DIRECTORY_SEPARATOR || c == ALT_DIRECTORY_SEPARATOR
}

/// True if `path` starts with a `.` component (`.` or `./...`).
pub fn is_current_directory(path: &[u8]) -> bool {
    at(path, 0) == DOT && matches!(at(path, 1), NUL | DIRECTORY_SEPARATOR)
}

/// True if `path` starts with a `..` component (`..` or `../...`).
pub fn is_parent_directory(path: &[u8]) -> bool {
    at(path, 0) == DOT && at(path, 1) == DOT && matches!(at(path, 2), NUL | DIRECTORY_SEPARATOR)
}

pub fn check_invalid_character(c: u8) -> Result<()> {
    if INVALID_CHARACTERS.contains(&c) {
        return Err(PathError::InvalidCharacter);
    }
    Ok(())
}

/// Rejects a component containing any of `: * ? < > |`.
pub fn check_component_characters(component: &[u8]) -> Result<()> {
    component.iter().try_for_each(|&c| check_invalid_character(c))
}

pub fn contains_backslash(path: &[u8]) -> bool {
    trim_nul(path).contains(&ALT_DIRECTORY_SEPARATOR)
}

/// Validates a single directory-entry name: non-empty, no separator, not a dot entry.
pub fn check_entry_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name == b"." || name == b".." {
        return Err(PathError::InvalidPathFormat);
    }
    if name.iter().any(|&c| is_any_separator(c) || c == NUL) {
        return Err(PathError::InvalidCharacter);
    }
    check_component_characters(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_past_end_is_nul() {
        assert_eq!(at(b"ab", 1), b'b');
        assert_eq!(at(b"ab", 2), NUL);
    }

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul(b"/a\0garbage"), b"/a");
        assert_eq!(trim_nul(b"/a"), b"/a");
    }

    #[test]
    fn test_dot_detection() {
        assert!(is_current_directory(b"."));
        assert!(is_current_directory(b"./x"));
        assert!(!is_current_directory(b".x"));
        assert!(is_parent_directory(b".."));
        assert!(is_parent_directory(b"../x"));
        assert!(!is_parent_directory(b"..x"));
        assert!(!is_parent_directory(b"."));
    }

    #[test]
    fn test_invalid_characters() {
        for c in INVALID_CHARACTERS {
            assert_eq!(check_invalid_character(*c), Err(PathError::InvalidCharacter));
        }
        assert!(check_invalid_character(b'a').is_ok());
        assert!(check_component_characters(b"file.bin").is_ok());
        assert!(check_component_characters(b"a?b").is_err());
    }

    #[test]
    fn test_check_entry_name() {
        assert!(check_entry_name(b"data").is_ok());
        assert_eq!(check_entry_name(b""), Err(PathError::InvalidPathFormat));
        assert_eq!(check_entry_name(b".."), Err(PathError::InvalidPathFormat));
        assert_eq!(check_entry_name(b"a/b"), Err(PathError::InvalidCharacter));
        assert_eq!(check_entry_name(b"a|b"), Err(PathError::InvalidCharacter));
    }
}
