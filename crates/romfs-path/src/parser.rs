//! In-place component tokenizer over a normalized path buffer.

use crate::error::{PathError, Result};
use crate::flags::PathFlags;
use crate::formatter::{is_normalized, root_length};
use crate::path::Path;
use crate::utility::{DIRECTORY_SEPARATOR, NUL};

/// Walks a NUL-terminated normalized path one component at a time.
///
/// Each yielded component is terminated in the buffer by temporarily
/// overwriting the separator after it with NUL. The separator is put back on
/// the next call and on drop, so the caller's buffer is unchanged once the
/// parser is gone.
///
/// ```
/// use romfs_path::{DirectoryPathParser, PathFlags};
///
/// let mut buf = *b"/a/b\0";
/// let mut parser = DirectoryPathParser::new(&mut buf, PathFlags::new()).unwrap();
/// assert_eq!(parser.read_next(), Some(&b"/"[..]));
/// assert_eq!(parser.read_next(), Some(&b"a"[..]));
/// assert_eq!(parser.read_next(), Some(&b"b"[..]));
/// assert_eq!(parser.read_next(), None);
/// drop(parser);
/// assert_eq!(&buf, b"/a/b\0");
/// ```
pub struct DirectoryPathParser<'a> {
    buffer: &'a mut [u8],
    len: usize,
    root_len: usize,
    flags: PathFlags,
    started: bool,
    cursor: usize,
    current_end: usize,
    replaced: Option<(usize, u8)>,
}

impl<'a> DirectoryPathParser<'a> {
    /// Binds the parser to `buffer`, which must hold a normalized path.
    pub fn new(buffer: &'a mut [u8], flags: PathFlags) -> Result<Self> {
        let len = buffer.iter().position(|&c| c == NUL).unwrap_or(buffer.len());
        if !is_normalized(&buffer[..len], flags)? {
            return Err(PathError::NotNormalized);
        }
        let root_len = root_length(&buffer[..len], flags)?;
        Ok(Self {
            buffer,
            len,
            root_len,
            flags,
            started: false,
            cursor: 0,
            current_end: 0,
            replaced: None,
        })
    }

    fn restore(&mut self) {
        if let Some((index, byte)) = self.replaced.take() {
            self.buffer[index] = byte;
        }
    }

    /// Next element: the root element first (for absolute paths), then each
    /// component. `None` once the path is exhausted.
    pub fn read_next(&mut self) -> Option<&[u8]> {
        self.restore();

        if !self.started {
            self.started = true;
            if self.root_len > 0 {
                self.cursor = self.root_len;
                self.current_end = self.root_len;
                return Some(&self.buffer[..self.root_len]);
            }
        }

        if self.cursor >= self.len {
            return None;
        }

        let start = self.cursor;
        let end = self.buffer[start..self.len]
            .iter()
            .position(|&c| c == DIRECTORY_SEPARATOR)
            .map_or(self.len, |offset| start + offset);

        if end < self.len {
            self.replaced = Some((end, self.buffer[end]));
            self.buffer[end] = NUL;
            self.cursor = end + 1;
        } else {
            self.cursor = self.len;
        }
        self.current_end = end;

        Some(&self.buffer[start..end])
    }

    /// Path up to and including the most recently yielded element.
    pub fn current_path(&self) -> Path {
        Path::from_parts(
            self.buffer[..self.current_end].to_vec(),
            self.root_len.min(self.current_end),
            self.flags,
        )
    }

    /// Whether the last yielded element is the final one.
    pub fn is_last(&self) -> bool {
        self.started && self.cursor >= self.len
    }
}

impl Drop for DirectoryPathParser<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(buf: &mut [u8], flags: PathFlags) -> Vec<Vec<u8>> {
        let mut parser = DirectoryPathParser::new(buf, flags).unwrap();
        let mut out = Vec::new();
        while let Some(element) = parser.read_next() {
            out.push(element.to_vec());
        }
        out
    }

    #[test]
    fn test_yields_root_then_components() {
        let mut buf = b"/dir/sub/file\0".to_vec();
        assert_eq!(
            collect(&mut buf, PathFlags::new()),
            vec![b"/".to_vec(), b"dir".to_vec(), b"sub".to_vec(), b"file".to_vec()]
        );
        assert_eq!(buf, b"/dir/sub/file\0");
    }

    #[test]
    fn test_separator_replaced_while_yielded() {
        let mut buf = b"/a/b\0".to_vec();
        let mut parser = DirectoryPathParser::new(&mut buf, PathFlags::new()).unwrap();
        parser.read_next();
        parser.read_next();
        assert_eq!(&parser.buffer[..], b"/a\0b\0");
        assert_eq!(parser.current_path().as_bytes(), b"/a");
        assert!(!parser.is_last());
        parser.read_next();
        assert_eq!(&parser.buffer[..], b"/a/b\0");
        assert!(parser.is_last());
        assert_eq!(parser.read_next(), None);
    }

    #[test]
    fn test_drop_restores_buffer() {
        let mut buf = b"/a/b/c\0".to_vec();
        {
            let mut parser = DirectoryPathParser::new(&mut buf, PathFlags::new()).unwrap();
            parser.read_next();
            parser.read_next();
            parser.read_next();
        }
        assert_eq!(buf, b"/a/b/c\0");
    }

    #[test]
    fn test_root_only() {
        let mut buf = b"/\0".to_vec();
        let mut parser = DirectoryPathParser::new(&mut buf, PathFlags::new()).unwrap();
        assert_eq!(parser.read_next(), Some(&b"/"[..]));
        assert!(parser.current_path().is_root());
        assert_eq!(parser.read_next(), None);
    }

    #[test]
    fn test_windows_prefix_is_one_element() {
        let mut buf = b"//host/share/x\0".to_vec();
        let flags = PathFlags::new().allow_windows_path();
        assert_eq!(
            collect(&mut buf, flags),
            vec![b"//host/share/".to_vec(), b"x".to_vec()]
        );
    }

    #[test]
    fn test_relative_has_no_root_element() {
        let mut buf = b"../a\0".to_vec();
        let flags = PathFlags::new().allow_relative_path();
        assert_eq!(collect(&mut buf, flags), vec![b"..".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn test_rejects_non_normalized_buffer() {
        let mut buf = b"/a//b\0".to_vec();
        assert!(matches!(
            DirectoryPathParser::new(&mut buf, PathFlags::new()),
            Err(PathError::NotNormalized)
        ));
    }
}
