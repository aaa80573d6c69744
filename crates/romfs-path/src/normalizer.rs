//! Canonicalization of the path body, i.e. everything after any mount name or
//! Windows prefix.
//!
//! Normalization walks the source one component at a time and writes into a
//! fixed output buffer, backtracking the write cursor on `..`. Validation is
//! a single forward pass over a six-state machine and never allocates.

use crate::error::{PathError, Result};
use crate::utility::{
    check_component_characters, check_invalid_character, ALT_DIRECTORY_SEPARATOR,
    DIRECTORY_SEPARATOR, DOT, NUL,
};

/// Bounded output cursor. One byte of the buffer is always kept for the
/// NUL terminator.
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    /// Appends `bytes`; on overflow copies what fits, terminates and fails.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let available = self.capacity().saturating_sub(self.len);
        if bytes.len() > available {
            self.buf[self.len..self.len + available].copy_from_slice(&bytes[..available]);
            self.len += available;
            return Err(self.overflow());
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    fn overflow(&mut self) -> PathError {
        if let Some(slot) = self.buf.get_mut(self.len) {
            *slot = NUL;
        }
        PathError::TooLongPath { written: self.len }
    }

    /// Moves the cursor back over the last component and its separator,
    /// never below `floor`.
    fn pop_component(&mut self, floor: usize) {
        let mut n = self.len;
        while n > floor && self.buf[n - 1] != DIRECTORY_SEPARATOR {
            n -= 1;
        }
        self.len = if n > floor { n - 1 } else { floor };
    }

    fn truncate(&mut self, len: usize) {
        self.len = len;
    }

    /// NUL-terminates the output and returns its length.
    pub(crate) fn finish(mut self) -> Result<usize> {
        if self.buf.is_empty() {
            return Err(PathError::TooLongPath { written: 0 });
        }
        if self.len > self.capacity() {
            return Err(self.overflow());
        }
        self.buf[self.len] = NUL;
        Ok(self.len)
    }
}

/// How the body is rooted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyMode {
    /// Starts at a root separator. `tolerate_root_escape` lets `..` at the
    /// root move the cursor above the root marker instead of failing.
    Absolute { tolerate_root_escape: bool },
    /// No root; unresolvable leading `..` components are kept.
    Relative,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyOptions {
    pub mode: BodyMode,
    pub backslash_is_separator: bool,
    pub allow_all_characters: bool,
}

impl BodyOptions {
    #[inline]
    fn is_separator(&self, c: u8) -> bool {
        c == DIRECTORY_SEPARATOR || (self.backslash_is_separator && c == ALT_DIRECTORY_SEPARATOR)
    }
}

/// Splits `src` into non-empty components, collapsing separator runs.
fn components<'s>(src: &'s [u8], options: &BodyOptions) -> impl Iterator<Item = &'s [u8]> + 's {
    let options = *options;
    src.split(move |&c| options.is_separator(c))
        .filter(|component| !component.is_empty())
}

/// Writes the canonical form of `src` through `out`.
pub(crate) fn normalize_body(out: &mut Writer<'_>, src: &[u8], options: BodyOptions) -> Result<()> {
    match options.mode {
        BodyMode::Absolute {
            tolerate_root_escape,
        } => normalize_absolute(out, src, &options, tolerate_root_escape),
        BodyMode::Relative => normalize_relative(out, src, &options),
    }
}

fn normalize_absolute(
    out: &mut Writer<'_>,
    src: &[u8],
    options: &BodyOptions,
    tolerate_root_escape: bool,
) -> Result<()> {
    let root_start = out.len();
    out.push(&[DIRECTORY_SEPARATOR])?;
    let root_end = out.len();

    for component in components(src, options) {
        match component {
            b"." => {}
            b".." => {
                if out.len() <= root_end {
                    if !tolerate_root_escape {
                        return Err(PathError::DirectoryUnobtainable);
                    }
                    // Above the root marker; it is re-emitted before the next
                    // component or at the end.
                    out.truncate(root_start);
                } else {
                    out.pop_component(root_end);
                }
            }
            name => {
                if !options.allow_all_characters {
                    check_component_characters(name)?;
                }
                if out.len() != root_end {
                    out.push(&[DIRECTORY_SEPARATOR])?;
                }
                out.push(name)?;
            }
        }
    }

    if out.len() == root_start {
        out.push(&[DIRECTORY_SEPARATOR])?;
    }
    Ok(())
}

fn normalize_relative(out: &mut Writer<'_>, src: &[u8], options: &BodyOptions) -> Result<()> {
    let base = out.len();
    let mut floor = base;

    for component in components(src, options) {
        match component {
            b"." => {}
            b".." => {
                if out.len() > floor {
                    out.pop_component(floor);
                } else {
                    if out.len() > base {
                        out.push(&[DIRECTORY_SEPARATOR])?;
                    }
                    out.push(b"..")?;
                    floor = out.len();
                }
            }
            name => {
                if !options.allow_all_characters {
                    check_component_characters(name)?;
                }
                if out.len() > base {
                    out.push(&[DIRECTORY_SEPARATOR])?;
                }
                out.push(name)?;
            }
        }
    }

    if out.len() == base {
        out.push(&[DOT])?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Normal,
    FirstSeparator,
    Separator,
    Dot,
    DoubleDot,
}

/// Checks an absolute body (starting with `/`) for canonical form.
///
/// `backslash_tolerated` decides whether a `\` merely means "not normalized"
/// (it is a separator the normalizer would rewrite) or is an invalid character.
pub(crate) fn is_absolute_body_normalized(
    src: &[u8],
    backslash_tolerated: bool,
    allow_all_characters: bool,
) -> Result<bool> {
    let mut state = State::Initial;

    for &c in src {
        if c == NUL {
            break;
        }

        if c == ALT_DIRECTORY_SEPARATOR {
            if backslash_tolerated {
                return Ok(false);
            }
            return Err(PathError::InvalidCharacter);
        }

        if !allow_all_characters && state != State::Initial {
            check_invalid_character(c)?;
        }

        state = match state {
            State::Initial => {
                if c != DIRECTORY_SEPARATOR {
                    return Err(PathError::InvalidPathFormat);
                }
                State::FirstSeparator
            }
            State::Normal => {
                if c == DIRECTORY_SEPARATOR {
                    State::Separator
                } else {
                    State::Normal
                }
            }
            State::FirstSeparator | State::Separator => match c {
                DIRECTORY_SEPARATOR => return Ok(false),
                DOT => State::Dot,
                _ => State::Normal,
            },
            State::Dot => match c {
                DIRECTORY_SEPARATOR => return Ok(false),
                DOT => State::DoubleDot,
                _ => State::Normal,
            },
            State::DoubleDot => match c {
                DIRECTORY_SEPARATOR => return Ok(false),
                _ => State::Normal,
            },
        };
    }

    match state {
        State::Initial => Err(PathError::InvalidPathFormat),
        State::Normal | State::FirstSeparator => Ok(true),
        State::Separator | State::Dot | State::DoubleDot => Ok(false),
    }
}

/// Checks a relative body for canonical form: single separators, no `.`
/// components (except the lone `.`), `..` only in the leading run.
pub(crate) fn is_relative_body_normalized(
    src: &[u8],
    backslash_tolerated: bool,
    allow_all_characters: bool,
) -> Result<bool> {
    if src == b"." {
        return Ok(true);
    }

    let mut leading = true;
    for component in src.split(|&c| c == DIRECTORY_SEPARATOR) {
        if component.contains(&ALT_DIRECTORY_SEPARATOR) {
            if backslash_tolerated {
                return Ok(false);
            }
            return Err(PathError::InvalidCharacter);
        }
        match component {
            b"" | b"." => return Ok(false),
            b".." => {
                if !leading {
                    return Ok(false);
                }
            }
            name => {
                leading = false;
                if !allow_all_characters {
                    check_component_characters(name)?;
                }
            }
        }
    }
    Ok(true)
}
