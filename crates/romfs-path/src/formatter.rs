//! Full-path normalization: mount name, Windows prefix, then the body.

use tracing::trace;

use crate::error::{PathError, Result};
use crate::flags::PathFlags;
use crate::normalizer::{
    is_absolute_body_normalized, is_relative_body_normalized, normalize_body, BodyMode,
    BodyOptions, Writer,
};
use crate::utility::{
    at, check_invalid_character, contains_backslash, is_any_separator, trim_nul,
    ALT_DIRECTORY_SEPARATOR, DIRECTORY_SEPARATOR, DOT, DRIVE_SEPARATOR, MOUNT_NAME_LENGTH_MAX,
};
use crate::windows::{self, WindowsPrefix};

/// Length of a leading `name:` mount prefix (including the `:`), if any.
///
/// A `:` at index 1 is a drive letter, not a mount name.
pub fn parse_mount_name(path: &[u8]) -> Result<Option<usize>> {
    let path = trim_nul(path);
    for (i, &c) in path.iter().enumerate() {
        if c == DRIVE_SEPARATOR {
            if i < 2 {
                return Ok(None);
            }
            if i > MOUNT_NAME_LENGTH_MAX {
                return Err(PathError::InvalidMountName);
            }
            for &m in &path[..i] {
                if m == DOT {
                    return Err(PathError::InvalidCharacter);
                }
                check_invalid_character(m)?;
            }
            return Ok(Some(i + 1));
        }
        if is_any_separator(c) {
            return Ok(None);
        }
    }
    Ok(None)
}

/// Classified shape of a path after its prefixes.
struct Layout<'p> {
    mount_len: usize,
    windows: Option<WindowsPrefix<'p>>,
    body: &'p [u8],
    body_start: usize,
}

fn split_prefixes<'p>(path: &'p [u8], flags: PathFlags) -> Result<Layout<'p>> {
    let mut mount_len = 0;
    if flags.is_mount_name_allowed() {
        if let Some(len) = parse_mount_name(path)? {
            mount_len = len;
        }
    }

    let rest = &path[mount_len..];
    let mut windows = None;
    if flags.is_windows_path_allowed() {
        windows = windows::parse_prefix(rest)?;
        if windows.is_some() && mount_len != 0 {
            return Err(PathError::InvalidPathFormat);
        }
    }

    let body_start = mount_len + windows.map_or(0, |w| w.len);
    Ok(Layout {
        mount_len,
        windows,
        body: &path[body_start..],
        body_start,
    })
}

fn body_options(layout: &Layout<'_>, flags: PathFlags) -> Result<BodyOptions> {
    let allow_all_characters = flags.are_all_characters_allowed();

    if let Some(prefix) = layout.windows {
        if !layout.body.is_empty() && !is_any_separator(layout.body[0]) {
            // e.g. `C:abc`, a drive-relative path
            return Err(PathError::InvalidPathFormat);
        }
        return Ok(BodyOptions {
            mode: BodyMode::Absolute {
                tolerate_root_escape: prefix.tolerates_root_escape(),
            },
            backslash_is_separator: true,
            allow_all_characters,
        });
    }

    let backslash_is_separator = flags.is_backslash_allowed();
    if !backslash_is_separator && contains_backslash(layout.body) {
        return Err(PathError::InvalidCharacter);
    }

    let first = at(layout.body, 0);
    let rooted = first == DIRECTORY_SEPARATOR
        || (backslash_is_separator && first == ALT_DIRECTORY_SEPARATOR)
        || (layout.body.is_empty() && layout.mount_len != 0);

    let mode = if rooted {
        BodyMode::Absolute {
            tolerate_root_escape: false,
        }
    } else if flags.is_relative_path_allowed() && layout.mount_len == 0 {
        BodyMode::Relative
    } else {
        return Err(PathError::InvalidPathFormat);
    };

    Ok(BodyOptions {
        mode,
        backslash_is_separator,
        allow_all_characters,
    })
}

/// Normalizes `path` into `out`, NUL-terminated, returning the length.
///
/// On `TooLongPath` the buffer holds a truncated, terminated and unusable
/// prefix of the result.
pub fn normalize_into(out: &mut [u8], path: &[u8], flags: PathFlags) -> Result<usize> {
    let path = trim_nul(path);
    let mut writer = Writer::new(out);

    if path.is_empty() {
        if !flags.is_empty_path_allowed() {
            return Err(PathError::InvalidPathFormat);
        }
        return writer.finish();
    }

    let layout = split_prefixes(path, flags)?;
    let options = body_options(&layout, flags)?;

    writer.push(&path[..layout.mount_len])?;
    if let Some(prefix) = layout.windows {
        prefix.write_canonical(&path[layout.mount_len..], |bytes| writer.push(bytes))?;
    }
    normalize_body(&mut writer, layout.body, options)?;
    let len = writer.finish()?;

    trace!(
        input_len = path.len(),
        output_len = len,
        body_start = layout.body_start,
        "normalized path"
    );

    let normalized = is_normalized(&out[..len], flags)?;
    debug_assert!(normalized, "normalizer produced a non-canonical path");
    if !normalized {
        return Err(PathError::NotNormalized);
    }
    Ok(len)
}

/// Allocating form of [`normalize_into`].
pub fn normalize(path: &[u8], flags: PathFlags) -> Result<Vec<u8>> {
    let path = trim_nul(path);
    // Canonical form is at most two bytes longer than its source (`C:` -> `C:/`,
    // `mount:` -> `mount:/`, `` -> `.`), plus the terminator.
    let mut buf = vec![0u8; path.len() + 3];
    let len = normalize_into(&mut buf, path, flags)?;
    buf.truncate(len);
    Ok(buf)
}

/// Whether `path` is already canonical under `flags`.
///
/// Malformed input is an error; well-formed but non-canonical input is `Ok(false)`.
pub fn is_normalized(path: &[u8], flags: PathFlags) -> Result<bool> {
    let path = trim_nul(path);

    if path.is_empty() {
        if flags.is_empty_path_allowed() {
            return Ok(true);
        }
        return Err(PathError::InvalidPathFormat);
    }

    let layout = split_prefixes(path, flags)?;
    let allow_all_characters = flags.are_all_characters_allowed();

    if let Some(prefix) = layout.windows {
        if !prefix.is_canonical() || layout.body.is_empty() {
            return Ok(false);
        }
        if !is_any_separator(layout.body[0]) {
            return Err(PathError::InvalidPathFormat);
        }
        return is_absolute_body_normalized(layout.body, true, allow_all_characters);
    }

    let backslash_tolerated = flags.is_backslash_allowed();
    match at(layout.body, 0) {
        0 if layout.mount_len != 0 => Ok(false),
        DIRECTORY_SEPARATOR => {
            is_absolute_body_normalized(layout.body, backslash_tolerated, allow_all_characters)
        }
        ALT_DIRECTORY_SEPARATOR => {
            if backslash_tolerated {
                Ok(false)
            } else {
                Err(PathError::InvalidCharacter)
            }
        }
        _ if flags.is_relative_path_allowed() && layout.mount_len == 0 => {
            is_relative_body_normalized(layout.body, backslash_tolerated, allow_all_characters)
        }
        _ => Err(PathError::InvalidPathFormat),
    }
}

/// Length of the root element of a normalized path: prefixes plus the root
/// separator. Zero for relative and empty paths.
pub fn root_length(path: &[u8], flags: PathFlags) -> Result<usize> {
    let path = trim_nul(path);
    if path.is_empty() {
        return Ok(0);
    }
    let layout = split_prefixes(path, flags)?;
    if at(layout.body, 0) == DIRECTORY_SEPARATOR {
        Ok(layout.body_start + 1)
    } else {
        Ok(0)
    }
}
