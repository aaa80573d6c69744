//! Fixed-size records stored in the entry arenas, and the transient lookup key.
//!
//! All integers are little-endian. Records carry no implicit padding; the
//! arena pads each whole element (record + name) to 4 bytes instead.

/// Byte offset into an entry arena.
pub type Position = u32;

/// "No entry" / end of a chain.
pub const INVALID_POSITION: Position = 0xFFFF_FFFF;

/// The root directory is always the first directory entry.
pub const ROOT_POSITION: Position = 0;

/// A record with a fixed little-endian encoding.
pub trait FixedRecord: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Writes the record into `buf[..Self::SIZE]`.
    fn encode(&self, buf: &mut [u8]);

    /// Reads the record from `buf[..Self::SIZE]`.
    fn decode(buf: &[u8]) -> Self;
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn read_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_i64(buf: &mut [u8], offset: usize, value: i64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// RomEntryKey: 4 bytes
// ---------------------------------------------------------------------------

/// Fixed part of a table key: the parent directory's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RomEntryKey {
    pub parent: Position,
}

impl RomEntryKey {
    pub const fn new(parent: Position) -> Self {
        Self { parent }
    }

    /// Key of the root directory.
    pub const fn root() -> Self {
        Self {
            parent: INVALID_POSITION,
        }
    }

    /// Full key equality: same parent, then byte-equal names.
    pub fn is_same(&self, name: &[u8], other: &RomEntryKey, other_name: &[u8]) -> bool {
        self.parent == other.parent && name.len() == other_name.len() && name == other_name
    }
}

impl FixedRecord for RomEntryKey {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.parent);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            parent: read_u32(buf, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// DirectoryRomEntry: 12 bytes
// ---------------------------------------------------------------------------

/// Directory value.
///
/// ```text
/// offset  field  size
/// ------  -----  ----
///  0      next    4   next sibling directory
///  4      dir     4   first child directory
///  8      file    4   first child file
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRomEntry {
    pub next: Position,
    pub dir: Position,
    pub file: Position,
}

impl Default for DirectoryRomEntry {
    fn default() -> Self {
        Self {
            next: INVALID_POSITION,
            dir: INVALID_POSITION,
            file: INVALID_POSITION,
        }
    }
}

impl FixedRecord for DirectoryRomEntry {
    const SIZE: usize = 12;

    fn encode(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.next);
        write_u32(buf, 4, self.dir);
        write_u32(buf, 8, self.file);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            next: read_u32(buf, 0),
            dir: read_u32(buf, 4),
            file: read_u32(buf, 8),
        }
    }
}

// ---------------------------------------------------------------------------
// RomFileInfo / FileRomEntry: 16 / 20 bytes
// ---------------------------------------------------------------------------

/// Byte range of a file's contents in the data region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RomFileInfo {
    pub offset: i64,
    pub size: i64,
}

impl RomFileInfo {
    pub const fn new(offset: i64, size: i64) -> Self {
        Self { offset, size }
    }
}

impl FixedRecord for RomFileInfo {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        write_i64(buf, 0, self.offset);
        write_i64(buf, 8, self.size);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            offset: read_i64(buf, 0),
            size: read_i64(buf, 8),
        }
    }
}

/// File value.
///
/// ```text
/// offset  field        size
/// ------  -----------  ----
///  0      next          4   next sibling file
///  4      info.offset   8
/// 12      info.size     8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRomEntry {
    pub next: Position,
    pub info: RomFileInfo,
}

impl FixedRecord for FileRomEntry {
    const SIZE: usize = 20;

    fn encode(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.next);
        self.info.encode(&mut buf[4..]);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            next: read_u32(buf, 0),
            info: RomFileInfo::decode(&buf[4..]),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup keys
// ---------------------------------------------------------------------------

/// Borrowed entry name. Never stored beyond the call that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomEntryName<'a>(&'a [u8]);

impl<'a> RomEntryName<'a> {
    pub const fn new(name: &'a [u8]) -> Self {
        Self(name)
    }

    /// The root directory's (empty) name.
    pub const fn root() -> Self {
        Self(&[])
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parent position plus borrowed name; the full lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKey<'a> {
    pub key: RomEntryKey,
    pub name: RomEntryName<'a>,
}

impl<'a> EntryKey<'a> {
    pub const fn new(parent: Position, name: &'a [u8]) -> Self {
        Self {
            key: RomEntryKey::new(parent),
            name: RomEntryName::new(name),
        }
    }

    /// Bucket hash. Part of the on-storage format: changing it breaks every
    /// existing table.
    pub fn hash(&self) -> u32 {
        self.name
            .as_bytes()
            .iter()
            .fold(123_456_789u32 ^ self.key.parent, |hash, &c| {
                u32::from(c) ^ hash.rotate_left(27)
            })
    }

    pub fn is_same(&self, stored: &RomEntryKey, stored_name: &[u8]) -> bool {
        self.key.is_same(self.name.as_bytes(), stored, stored_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(RomEntryKey::SIZE, 4);
        assert_eq!(DirectoryRomEntry::SIZE, 12);
        assert_eq!(RomFileInfo::SIZE, 16);
        assert_eq!(FileRomEntry::SIZE, 20);
    }

    #[test]
    fn test_file_entry_layout() {
        let entry = FileRomEntry {
            next: 0x0403_0201,
            info: RomFileInfo::new(0x10, -1),
        };
        let mut buf = [0u8; FileRomEntry::SIZE];
        entry.encode(&mut buf);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf[4..12], &[0x10, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[12..], &[0xFF; 8]);
        assert_eq!(FileRomEntry::decode(&buf), entry);
    }

    #[test]
    fn test_directory_default_is_unlinked() {
        let mut buf = [0u8; DirectoryRomEntry::SIZE];
        DirectoryRomEntry::default().encode(&mut buf);
        assert_eq!(buf, [0xFF; 12]);
    }

    #[test]
    fn test_hash_matches_reference_mixing() {
        let reference = |parent: u32, name: &[u8]| {
            let mut hash = 123_456_789u32 ^ parent;
            for &c in name {
                hash = (c as u32) ^ ((hash << 27) | (hash >> 5));
            }
            hash
        };
        for (parent, name) in [(0u32, &b"a"[..]), (INVALID_POSITION, b""), (0x40, b"file.bin")] {
            assert_eq!(EntryKey::new(parent, name).hash(), reference(parent, name));
        }
        assert_eq!(EntryKey::new(INVALID_POSITION, b"").hash(), 123_456_789 ^ INVALID_POSITION);
    }

    #[test]
    fn test_is_same_compares_parent_then_name() {
        let key = EntryKey::new(4, b"abc");
        assert!(key.is_same(&RomEntryKey::new(4), b"abc"));
        assert!(!key.is_same(&RomEntryKey::new(8), b"abc"));
        assert!(!key.is_same(&RomEntryKey::new(4), b"ab"));
        assert!(!key.is_same(&RomEntryKey::new(4), b"abd"));
    }
}
