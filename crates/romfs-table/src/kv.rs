//! Separate-chaining hash table persisted in two storage regions.
//!
//! ```text
//! bucket region:  [Position; bucket_count]       0xFFFFFFFF = empty
//! entry region:   element element element ...    append-only
//!
//! element:  key | value | next: u32 | size: u32 | name[size] | pad to 4
//! ```
//!
//! Each bucket heads a singly linked chain threaded through `next`. New
//! elements are pushed at the head of their bucket's chain.

use std::marker::PhantomData;

use romfs_storage::Storage;
use tracing::{debug, trace};

use crate::entry::{read_u32, write_u32, FixedRecord, Position, INVALID_POSITION};
use crate::error::{Result, RomFsError};

const POSITION_SIZE: u64 = std::mem::size_of::<Position>() as u64;
const FORMAT_CHUNK: usize = 4096;

#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Bucket occupancy and chain lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainStats {
    pub bucket_count: u32,
    pub entry_count: usize,
    pub used_buckets: u32,
    pub max_chain: usize,
    pub avg_chain: f64,
    pub load_factor: f64,
}

struct Element<K, V> {
    key: K,
    value: V,
    next: Position,
    size: u32,
}

struct Regions<S> {
    buckets: S,
    entries: S,
    bucket_count: u32,
    total_entry_size: u64,
}

/// Key/value store over a bucket region and an entry region.
///
/// `K` is the fixed key, compared together with the element's variable
/// "extra key" bytes; `V` is the fixed value, rewritable in place.
pub struct KeyValueRomStorage<K, V, S> {
    regions: Option<Regions<S>>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, S> Default for KeyValueRomStorage<K, V, S> {
    fn default() -> Self {
        Self {
            regions: None,
            _marker: PhantomData,
        }
    }
}

impl<K, V, S> KeyValueRomStorage<K, V, S>
where
    K: FixedRecord + PartialEq,
    V: FixedRecord,
    S: Storage,
{
    const ELEMENT_SIZE: usize = K::SIZE + V::SIZE + 8;
    const NEXT_OFFSET: usize = K::SIZE + V::SIZE;

    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Sizing
    // ---------------------------------------------------------------------

    pub fn query_bucket_count(bucket_storage_size: u64) -> u32 {
        (bucket_storage_size / POSITION_SIZE).min(u64::from(u32::MAX)) as u32
    }

    pub fn query_bucket_storage_size(bucket_count: u32) -> u64 {
        u64::from(bucket_count) * POSITION_SIZE
    }

    /// Arena bytes taken by one element with an `extra_key_len`-byte name.
    pub fn query_entry_size(extra_key_len: usize) -> u64 {
        align_up((Self::ELEMENT_SIZE + extra_key_len) as u64, 4)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Marks all `bucket_count` buckets empty.
    pub fn format<B: Storage + ?Sized>(bucket_storage: &B, bucket_count: u32) -> Result<()> {
        if bucket_count == 0 {
            return Err(RomFsError::ZeroBucketCount);
        }
        let total = Self::query_bucket_storage_size(bucket_count);
        let chunk = [0xFFu8; FORMAT_CHUNK];
        let mut offset = 0u64;
        while offset < total {
            let len = (total - offset).min(FORMAT_CHUNK as u64) as usize;
            bucket_storage.write(offset, &chunk[..len])?;
            offset += len as u64;
        }
        debug!(bucket_count, "Formatted bucket storage");
        Ok(())
    }

    /// Binds the store to its regions and recovers the arena end from the
    /// bucket chains.
    pub fn initialize(&mut self, buckets: S, bucket_count: u32, entries: S) -> Result<()> {
        if bucket_count == 0 {
            return Err(RomFsError::ZeroBucketCount);
        }
        let required = Self::query_bucket_storage_size(bucket_count);
        if buckets.size() < required {
            return Err(RomFsError::Corrupted(format!(
                "bucket storage holds {} bytes, {} buckets need {}",
                buckets.size(),
                bucket_count,
                required
            )));
        }

        let mut regions = Regions {
            buckets,
            entries,
            bucket_count,
            total_entry_size: 0,
        };
        regions.total_entry_size = Self::recover_total_entry_size(&regions)?;
        debug!(
            bucket_count,
            total_entry_size = regions.total_entry_size,
            "Initialized key-value storage"
        );
        self.regions = Some(regions);
        Ok(())
    }

    /// Unbinds the regions; the storage itself is left untouched.
    pub fn finalize(&mut self) -> Option<(S, S)> {
        self.regions.take().map(|r| (r.buckets, r.entries))
    }

    pub fn is_initialized(&self) -> bool {
        self.regions.is_some()
    }

    fn regions(&self) -> Result<&Regions<S>> {
        self.regions.as_ref().ok_or(RomFsError::NotInitialized)
    }

    fn max_chain_len(regions: &Regions<S>) -> u64 {
        regions.entries.size() / Self::ELEMENT_SIZE as u64 + 1
    }

    fn recover_total_entry_size(regions: &Regions<S>) -> Result<u64> {
        let mut end = 0u64;
        let limit = Self::max_chain_len(regions);
        for bucket in 0..regions.bucket_count {
            let mut position = Self::read_bucket(regions, bucket)?;
            let mut steps = 0u64;
            while position != INVALID_POSITION {
                let element = Self::read_element(regions, position)?;
                end = end.max(u64::from(position) + Self::query_entry_size(element.size as usize));
                position = element.next;
                steps += 1;
                if steps > limit {
                    return Err(RomFsError::Corrupted(format!("cycle in bucket {bucket}")));
                }
            }
        }
        Ok(end)
    }

    // ---------------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------------

    fn read_bucket(regions: &Regions<S>, bucket: u32) -> Result<Position> {
        let mut buf = [0u8; 4];
        regions
            .buckets
            .read(u64::from(bucket) * POSITION_SIZE, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_bucket(regions: &Regions<S>, bucket: u32, position: Position) -> Result<()> {
        regions
            .buckets
            .write(u64::from(bucket) * POSITION_SIZE, &position.to_le_bytes())?;
        Ok(())
    }

    fn read_element(regions: &Regions<S>, position: Position) -> Result<Element<K, V>> {
        let offset = u64::from(position);
        if offset + Self::ELEMENT_SIZE as u64 > regions.entries.size() {
            return Err(RomFsError::InvalidPosition { position });
        }
        let mut buf = vec![0u8; Self::ELEMENT_SIZE];
        regions.entries.read(offset, &mut buf)?;
        Ok(Element {
            key: K::decode(&buf),
            value: V::decode(&buf[K::SIZE..]),
            next: read_u32(&buf, Self::NEXT_OFFSET),
            size: read_u32(&buf, Self::NEXT_OFFSET + 4),
        })
    }

    fn read_extra_key(
        regions: &Regions<S>,
        position: Position,
        size: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        let offset = u64::from(position) + Self::ELEMENT_SIZE as u64;
        regions.entries.read(offset, &mut buf[..size as usize])?;
        Ok(())
    }

    /// Walks the bucket chain for `(key, extra_key)`.
    fn find(
        regions: &Regions<S>,
        key: &K,
        hash: u32,
        extra_key: &[u8],
    ) -> Result<Option<(Position, Element<K, V>)>> {
        let bucket = hash % regions.bucket_count;
        let mut position = Self::read_bucket(regions, bucket)?;
        let limit = Self::max_chain_len(regions);
        let mut name = Vec::new();
        let mut steps = 0u64;

        while position != INVALID_POSITION {
            let element = Self::read_element(regions, position)?;
            if element.key == *key && element.size as usize == extra_key.len() {
                name.resize(extra_key.len(), 0);
                Self::read_extra_key(regions, position, element.size, &mut name)?;
                if name == extra_key {
                    trace!(bucket, position, steps, "Chain hit");
                    return Ok(Some((position, element)));
                }
            }
            position = element.next;
            steps += 1;
            if steps > limit {
                return Err(RomFsError::Corrupted(format!("cycle in bucket {bucket}")));
            }
        }
        trace!(bucket, steps, "Chain miss");
        Ok(None)
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Inserts a new element and returns its position.
    ///
    /// Fails with `AlreadyExists` when the key is present; storage is then
    /// unchanged.
    pub fn add(&mut self, key: &K, hash: u32, extra_key: &[u8], value: &V) -> Result<Position> {
        let regions = self.regions.as_mut().ok_or(RomFsError::NotInitialized)?;

        if Self::find(regions, key, hash, extra_key)?.is_some() {
            return Err(RomFsError::AlreadyExists);
        }

        let entry_size = Self::query_entry_size(extra_key.len());
        let position = regions.total_entry_size;
        let end = position + entry_size;
        let capacity = regions.entries.size();
        if end > capacity || position >= u64::from(INVALID_POSITION) {
            return Err(RomFsError::EntryStorageFull {
                required: end,
                capacity,
            });
        }
        let position = position as Position;

        let bucket = hash % regions.bucket_count;
        let head = Self::read_bucket(regions, bucket)?;

        let mut buf = vec![0u8; entry_size as usize];
        key.encode(&mut buf);
        value.encode(&mut buf[K::SIZE..]);
        write_u32(&mut buf, Self::NEXT_OFFSET, head);
        write_u32(&mut buf, Self::NEXT_OFFSET + 4, extra_key.len() as u32);
        buf[Self::ELEMENT_SIZE..Self::ELEMENT_SIZE + extra_key.len()].copy_from_slice(extra_key);

        // element first, then the bucket head that publishes it
        regions.entries.write(u64::from(position), &buf)?;
        Self::write_bucket(regions, bucket, position)?;
        regions.total_entry_size = end;

        debug!(position, bucket, entry_size, "Added entry");
        Ok(position)
    }

    /// Looks up `(key, extra_key)`, returning its position and value.
    pub fn get(&self, key: &K, hash: u32, extra_key: &[u8]) -> Result<(Position, V)> {
        let regions = self.regions()?;
        match Self::find(regions, key, hash, extra_key)? {
            Some((position, element)) => Ok((position, element.value)),
            None => Err(RomFsError::KeyNotFound),
        }
    }

    /// Reads the element at `position`, copying its extra key into
    /// `extra_key` and returning the key, value and extra-key length.
    pub fn get_by_position(&self, position: Position, extra_key: &mut [u8]) -> Result<(K, V, usize)> {
        let regions = self.regions()?;
        let element = Self::read_element(regions, position)?;
        let size = element.size as usize;
        if extra_key.len() < size {
            return Err(RomFsError::NameBufferTooSmall { required: size });
        }
        Self::read_extra_key(regions, position, element.size, extra_key)?;
        Ok((element.key, element.value, size))
    }

    /// Key and owned extra key of the element at `position`.
    pub fn get_key_by_position(&self, position: Position) -> Result<(K, Vec<u8>)> {
        let regions = self.regions()?;
        let element = Self::read_element(regions, position)?;
        let mut name = vec![0u8; element.size as usize];
        Self::read_extra_key(regions, position, element.size, &mut name)?;
        Ok((element.key, name))
    }

    pub fn get_value_by_position(&self, position: Position) -> Result<V> {
        let regions = self.regions()?;
        Ok(Self::read_element(regions, position)?.value)
    }

    /// Overwrites only the value bytes of the element at `position`.
    pub fn set_by_position(&mut self, position: Position, value: &V) -> Result<()> {
        let regions = self.regions.as_ref().ok_or(RomFsError::NotInitialized)?;
        if u64::from(position) + Self::ELEMENT_SIZE as u64 > regions.total_entry_size {
            return Err(RomFsError::InvalidPosition { position });
        }
        let mut buf = vec![0u8; V::SIZE];
        value.encode(&mut buf);
        regions
            .entries
            .write(u64::from(position) + K::SIZE as u64, &buf)?;
        Ok(())
    }

    /// Bytes of the entry arena in use.
    pub fn total_entry_size(&self) -> u64 {
        self.regions.as_ref().map_or(0, |r| r.total_entry_size)
    }

    /// Upper bound on the number of elements in the arena; any walk over
    /// linked elements longer than this has hit a cycle.
    pub fn max_entry_count(&self) -> u64 {
        self.total_entry_size() / Self::ELEMENT_SIZE as u64
    }

    pub fn bucket_count(&self) -> u32 {
        self.regions.as_ref().map_or(0, |r| r.bucket_count)
    }

    /// Bucket occupancy and chain length statistics.
    pub fn chain_stats(&self) -> Result<ChainStats> {
        let regions = self.regions()?;
        let limit = Self::max_chain_len(regions);
        let mut stats = ChainStats {
            bucket_count: regions.bucket_count,
            ..ChainStats::default()
        };

        for bucket in 0..regions.bucket_count {
            let mut position = Self::read_bucket(regions, bucket)?;
            let mut chain = 0usize;
            while position != INVALID_POSITION {
                position = Self::read_element(regions, position)?.next;
                chain += 1;
                if chain as u64 > limit {
                    return Err(RomFsError::Corrupted(format!("cycle in bucket {bucket}")));
                }
            }
            if chain > 0 {
                stats.used_buckets += 1;
                stats.entry_count += chain;
                stats.max_chain = stats.max_chain.max(chain);
            }
        }

        if stats.used_buckets > 0 {
            stats.avg_chain = stats.entry_count as f64 / f64::from(stats.used_buckets);
        }
        stats.load_factor = stats.entry_count as f64 / f64::from(regions.bucket_count);
        Ok(stats)
    }
}
