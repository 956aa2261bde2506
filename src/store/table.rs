//! # Table Hash Engine
//!
//! Tables are open-addressing hash maps keyed by [`HString`], stored inline in
//! the heap:
//!
//! ```text
//! +--------+--------+-----------------------+------+----------------------+------+
//! | cap|ns | cnt|hn  | values[0..cap]        | null | keys[0..cap]         | null |
//! +--------+--------+-----------------------+------+----------------------+------+
//!   header             DataNode per bucket     ^      HString id per bucket   ^
//!                                              only present with null storage
//! ```
//!
//! Key id 0 (the empty string) marks an empty bucket, so the empty-string key
//! cannot live in a bucket. It gets the optional hidden slot after each run
//! instead, added on first use.
//!
//! ## Anti-Clustering Insert
//!
//! A new key whose home bucket holds an entry that is *not* at its own home
//! takes the bucket, and the evicted entry is reinserted by linear probing
//! from its home. Otherwise the new key probes linearly. As many entries as
//! possible sit at home, so probe runs stay short.
//!
//! ## Erase
//!
//! Backward-shift deletion: after clearing a bucket, every following entry up
//! to the next empty bucket that is not at home is reinserted from its home.
//!
//! ## Growth
//!
//! Once `count + 1` reaches `capacity × 0.75` (truncated), the table moves to
//! fresh storage of `next_pow2(capacity + 2)` buckets and every pair is
//! reinserted, the null pair first. At least one bucket is always empty, which
//! is what terminates every probe.

use eyre::{bail, eyre, Result};
use std::ops::{Deref, DerefMut};

use super::DataStore;
use crate::config::{CONTAINER_HEADER_SLOTS, TABLE_LOAD_FACTOR};
use crate::heap::{next_pow2, Container};
use crate::node::{DataNode, NodeType};
use crate::strings::HString;

/// Slots used by a table with `total_capacity` buckets (null slot included).
///
/// Computed in `u64`: a corrupted header can claim 2^31 buckets.
#[inline]
pub(crate) fn table_slots(total_capacity: u32) -> u64 {
    CONTAINER_HEADER_SLOTS as u64 + 2 * total_capacity as u64
}

/// [`table_slots`] narrowed to an allocation size.
fn allocation_slots(total_capacity: u32) -> Result<u32> {
    u32::try_from(table_slots(total_capacity))
        .map_err(|_| eyre!("table with {} buckets does not fit in the heap", total_capacity))
}

/// View over one table's heap region, header included.
///
/// Works over `&[u32]` for lookups and `&mut [u32]` for mutation. Every
/// probe loop is bounded by the capacity so a corrupted region cannot spin.
pub(crate) struct Buckets<S> {
    header: Container,
    region: S,
}

impl<S: Deref<Target = [u32]>> Buckets<S> {
    /// Wraps `region` if it starts with a table header whose layout fits.
    pub(crate) fn new(region: S) -> Option<Self> {
        let header = Container::read(&region, 0)?;
        let slots = table_slots(header.total_capacity());
        (region.len() as u64 >= slots).then_some(Buckets { header, region })
    }

    #[inline]
    pub(crate) fn header(&self) -> Container {
        self.header
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.header.capacity()
    }

    #[inline]
    fn mask(&self) -> u32 {
        self.capacity().wrapping_sub(1)
    }

    #[inline]
    fn key_slot(&self, i: u32) -> usize {
        CONTAINER_HEADER_SLOTS as usize + self.header.total_capacity() as usize + i as usize
    }

    #[inline]
    fn value_slot(&self, i: u32) -> usize {
        (CONTAINER_HEADER_SLOTS + i) as usize
    }

    #[inline]
    pub(crate) fn key(&self, i: u32) -> HString {
        HString::from_raw(self.region[self.key_slot(i)])
    }

    #[inline]
    pub(crate) fn value(&self, i: u32) -> DataNode {
        DataNode::from_raw(self.region[self.value_slot(i)])
    }

    /// Value of the empty-string key, if set.
    pub(crate) fn null_value(&self) -> Option<DataNode> {
        (self.header.has_null() && self.header.has_null_storage()).then(|| self.value(self.capacity()))
    }

    #[inline]
    pub(crate) fn home(&self, key: HString) -> u32 {
        key.hash_value() & self.mask()
    }

    /// Live pairs, the null pair included.
    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.header.count() + self.header.has_null_bit()
    }

    /// Bucket holding `key`. `key` must not be the empty string.
    pub(crate) fn find(&self, key: HString) -> Option<u32> {
        let cap = self.capacity();
        if cap == 0 || self.header.count() == 0 {
            return None;
        }
        let mut i = self.home(key);
        for _ in 0..cap {
            let k = self.key(i);
            if k == key {
                return Some(i);
            }
            if k.is_empty() {
                return None;
            }
            i = (i + 1) & self.mask();
        }
        None
    }

    /// Value stored for `key`, the empty string included.
    pub(crate) fn get(&self, key: HString) -> Option<DataNode> {
        if key.is_empty() {
            self.null_value()
        } else {
            self.find(key).map(|i| self.value(i))
        }
    }
}

impl<S: DerefMut<Target = [u32]>> Buckets<S> {
    #[inline]
    fn set_count(&mut self, count: u32) {
        self.header.set_count(count);
        self.header.write(&mut self.region, 0);
    }

    #[inline]
    pub(crate) fn set_value(&mut self, i: u32, value: DataNode) {
        let v = self.value_slot(i);
        self.region[v] = value.raw();
    }

    /// Writes a pair without touching the count.
    #[inline]
    pub(crate) fn seat(&mut self, i: u32, key: HString, value: DataNode) {
        let (k, v) = (self.key_slot(i), self.value_slot(i));
        self.region[k] = key.id();
        self.region[v] = value.raw();
    }

    #[inline]
    fn clear(&mut self, i: u32) {
        self.seat(i, HString::EMPTY, DataNode::NULL);
    }

    /// First empty bucket at or after `start`, wrapping.
    pub(crate) fn first_empty_from(&self, start: u32) -> Option<u32> {
        let mut i = start & self.mask();
        for _ in 0..self.capacity() {
            if self.key(i).is_empty() {
                return Some(i);
            }
            i = (i + 1) & self.mask();
        }
        None
    }

    /// Linear probe from `start`. Overwrites a matching key and returns
    /// `false`, or fills the first empty bucket, bumps the count and returns
    /// `true`.
    fn probe_insert(&mut self, key: HString, value: DataNode, start: u32) -> bool {
        let mut i = start & self.mask();
        for _ in 0..self.capacity() {
            let k = self.key(i);
            if k == key {
                self.set_value(i, value);
                return false;
            }
            if k.is_empty() {
                self.seat(i, key, value);
                self.set_count(self.header.count() + 1);
                return true;
            }
            i = (i + 1) & self.mask();
        }
        debug_assert!(false, "table probe found no empty bucket");
        false
    }

    /// Anti-clustering insert of a key that is not yet present. The table
    /// must have at least one empty bucket.
    pub(crate) fn insert_new(&mut self, key: HString, value: DataNode) {
        debug_assert!(!key.is_empty() && self.capacity() > 0);
        let home = self.home(key);
        let occupant = self.key(home);

        if occupant.is_empty() {
            self.seat(home, key, value);
            self.set_count(self.header.count() + 1);
            return;
        }

        let occupant_home = self.home(occupant);
        if occupant_home != home {
            let displaced = self.value(home);
            self.seat(home, key, value);
            self.probe_insert(occupant, displaced, occupant_home);
        } else {
            self.probe_insert(key, value, home);
        }
    }

    /// Stores the value of the empty-string key. Null storage must exist.
    pub(crate) fn set_null_value(&mut self, value: DataNode) {
        debug_assert!(self.header.has_null_storage());
        let cap = self.capacity();
        self.seat(cap, HString::EMPTY, value);
        self.header.set_has_null(true);
        self.header.write(&mut self.region, 0);
    }

    /// Removes `key`, shifting later displaced entries back toward home.
    pub(crate) fn erase(&mut self, key: HString) -> bool {
        if self.len() == 0 {
            return false;
        }

        if key.is_empty() {
            if !self.header.has_null() || !self.header.has_null_storage() {
                return false;
            }
            let cap = self.capacity();
            self.clear(cap);
            self.header.set_has_null(false);
            self.header.write(&mut self.region, 0);
            return true;
        }

        let Some(found) = self.find(key) else {
            return false;
        };
        self.clear(found);
        self.set_count(self.header.count() - 1);

        let mut i = (found + 1) & self.mask();
        for _ in 0..self.capacity() {
            let k = self.key(i);
            if k.is_empty() {
                break;
            }
            let home = self.home(k);
            if home != i {
                self.set_count(self.header.count() - 1);
                let v = self.value(i);
                if self.probe_insert(k, v, home) {
                    self.clear(i);
                } else {
                    self.set_count(self.header.count() + 1);
                }
            }
            i = (i + 1) & self.mask();
        }
        true
    }
}

impl DataStore {
    /// Allocates an empty table with `next_pow2(initial_capacity)` buckets.
    pub(crate) fn make_table_node(&mut self, initial_capacity: u32) -> Result<DataNode> {
        let cap = next_pow2(initial_capacity);
        let handle = self.allocate(allocation_slots(cap)?)?;
        let offset = self
            .heap
            .resolve(handle)
            .ok_or_else(|| eyre!("freshly allocated table handle {:?} does not resolve", handle))?;
        Container::new(cap, 0).write(&mut self.heap.data, offset);
        Ok(DataNode::by_reference(NodeType::Table, handle))
    }

    /// Offset and bucket view of a table node, if it resolves and fits.
    pub(crate) fn table_buckets(&self, table: DataNode) -> Option<(u32, Buckets<&[u32]>)> {
        if !table.is_table() {
            return None;
        }
        let offset = self.heap.resolve(table.handle())?;
        let region = self.heap.data.get(offset as usize..)?;
        Some((offset, Buckets::new(region)?))
    }

    fn table_buckets_mut(&mut self, table: DataNode) -> Option<Buckets<&mut [u32]>> {
        if !table.is_table() {
            return None;
        }
        let offset = self.heap.resolve(table.handle())?;
        let region = self.heap.data.get_mut(offset as usize..)?;
        Buckets::new(region)
    }

    /// Bucket count, excluding the hidden null slot.
    pub fn table_capacity(&self, table: DataNode) -> Option<u32> {
        self.table_buckets(table).map(|(_, b)| b.capacity())
    }

    /// Number of key/value pairs, the empty-string key included.
    pub fn table_count(&self, table: DataNode) -> Option<u32> {
        self.table_buckets(table).map(|(_, b)| b.len())
    }

    /// Value stored under `key`.
    pub fn table_value(&self, table: DataNode, key: impl Into<HString>) -> Option<DataNode> {
        let key = key.into();
        let (_, buckets) = self.table_buckets(table)?;
        buckets.get(key)
    }

    pub fn table_contains_key(&self, table: DataNode, key: impl Into<HString>) -> bool {
        self.table_value(table, key).is_some()
    }

    /// Removes `key` from `table`. Fails if the key is absent.
    pub fn erase_value_from_table(&mut self, table: DataNode, key: impl Into<HString>) -> Result<()> {
        let key = key.into();
        let Some(mut buckets) = self.table_buckets_mut(table) else {
            bail!("erase_value_from_table: {:?} is not a valid table", table);
        };
        if !buckets.erase(key) {
            bail!("erase_value_from_table: key {:?} not found", key.as_str());
        }
        Ok(())
    }

    /// Inserts or overwrites `key`. Runs with GC suppressed, since `value`
    /// may not be reachable from the root yet.
    pub(crate) fn set_table_value(&mut self, table: DataNode, key: HString, value: DataNode) -> Result<()> {
        Self::ensure_kind(table, NodeType::Table, "set_table_value")?;
        let mut store = self.suppress_gc();
        store.table_insert(table, key, value)
    }

    fn table_insert(&mut self, table: DataNode, key: HString, value: DataNode) -> Result<()> {
        let Some(mut buckets) = self.table_buckets_mut(table) else {
            bail!("set_table_value: {:?} is not a valid table", table);
        };

        if key.is_empty() {
            if !buckets.header().has_null_storage() {
                self.add_null_storage(table)?;
                buckets = self
                    .table_buckets_mut(table)
                    .ok_or_else(|| eyre!("table {:?} lost after adding null storage", table))?;
            }
            buckets.set_null_value(value);
            return Ok(());
        }

        if let Some(i) = buckets.find(key) {
            buckets.set_value(i, value);
            return Ok(());
        }

        let header = buckets.header();
        let threshold = (header.capacity() as f32 * TABLE_LOAD_FACTOR) as u32;
        if header.count() + 1 >= threshold {
            self.grow_table(table, next_pow2(header.capacity() + 2))?;
        }

        let Some(mut buckets) = self.table_buckets_mut(table) else {
            bail!("table {:?} lost during growth", table);
        };
        buckets.insert_new(key, value);
        Ok(())
    }

    /// Adds the hidden null-key slot pair, shifting the key run up by one.
    fn add_null_storage(&mut self, table: DataNode) -> Result<()> {
        let Some((_, buckets)) = self.table_buckets(table) else {
            bail!("add_null_storage: {:?} is not a valid table", table);
        };
        let header = buckets.header();
        let cap = header.capacity();
        let old_slots = allocation_slots(header.total_capacity())?;
        let new_slots = allocation_slots(header.total_capacity() + 1)?;
        let offset = self.reallocate(table.handle(), old_slots, new_slots)?;

        let keys = (offset + CONTAINER_HEADER_SLOTS + cap) as usize;
        self.heap.data.copy_within(keys..keys + cap as usize, keys + 1);
        self.heap.data[keys] = DataNode::NULL.raw();
        self.heap.data[keys + 1 + cap as usize] = HString::EMPTY.id();

        let mut header = header;
        header.set_has_null_storage(true);
        header.write(&mut self.heap.data, offset);
        Ok(())
    }

    /// Moves `table` to fresh storage with `new_capacity` buckets.
    fn grow_table(&mut self, table: DataNode, new_capacity: u32) -> Result<()> {
        let Some((_, old)) = self.table_buckets(table) else {
            bail!("grow_table: {:?} is not a valid table", table);
        };
        let old_capacity = old.capacity();
        if new_capacity <= old_capacity {
            return Ok(());
        }

        let null_value = old.null_value();
        let pairs: Vec<(HString, DataNode)> = (0..old_capacity)
            .filter(|&i| !old.key(i).is_empty())
            .map(|i| (old.key(i), old.value(i)))
            .collect();

        let has_null = null_value.is_some();
        let offset = self.allocate_raw(allocation_slots(new_capacity + has_null as u32)?)?;
        let mut header = Container::new(new_capacity, 0);
        header.set_has_null_storage(has_null);
        header.write(&mut self.heap.data, offset);
        self.heap.repoint(table.handle(), offset);

        let region = &mut self.heap.data[offset as usize..];
        let Some(mut buckets) = Buckets::new(region) else {
            bail!("grow_table: new region at {} does not fit", offset);
        };
        if let Some(v) = null_value {
            buckets.set_null_value(v);
        }
        for (k, v) in pairs {
            buckets.insert_new(k, v);
        }

        tracing::trace!(
            old_capacity,
            new_capacity,
            count = buckets.len(),
            "grew table"
        );
        Ok(())
    }
}
