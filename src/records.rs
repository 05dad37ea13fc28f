//! Sorted variable-length records packed inside one page
//!
//! A record is the key encoding immediately followed by the value encoding.
//! Records are contiguous from [`RECORDS_START`] up to the free index, whose
//! location in the header depends on the node type.

use crate::codec::{decode_prefix, Codec};
use crate::error::{Error, Result};
use crate::page::{Page, NODE_HEADER_LEN};
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Offset of the first record in a node page
pub const RECORDS_START: usize = NODE_HEADER_LEN;

/// Result of a mutation that may not fit the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Fit {
    /// The mutation was applied in place
    Stored,
    /// Nothing was changed; the mutation needs a page of `required` bytes
    Overflow {
        /// Page length that would hold the result
        required: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    key_len: usize,
    value_len: usize,
}

impl Slot {
    #[inline]
    fn len(&self) -> usize {
        self.key_len + self.value_len
    }

    #[inline]
    fn value_offset(&self) -> usize {
        self.offset + self.key_len
    }
}

enum Lookup {
    Found(Slot),
    Vacant(usize),
}

/// Ordered (key, value) records inside a page
#[derive(Debug, Clone)]
pub struct RecordPage<K, V> {
    page: Page,
    free_offset: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: Codec + Ord, V: Codec> RecordPage<K, V> {
    /// Wrap a page whose free index lives at `free_offset`
    pub fn new(page: Page, free_offset: usize) -> Self {
        Self { page, free_offset, _marker: PhantomData }
    }

    /// Wrap a page and reset it to hold no records
    pub fn empty(page: Page, free_offset: usize) -> Self {
        let mut records = Self::new(page, free_offset);
        records.set_free_index(RECORDS_START);
        records
    }

    /// Check that the free index read from storage is plausible
    pub fn validate(&self) -> Result<()> {
        let raw = self.page.read_i32(self.free_offset);
        match usize::try_from(raw) {
            Ok(free) if (RECORDS_START..=self.page.len()).contains(&free) => Ok(()),
            _ => Err(Error::corrupt(format!("free index {} out of bounds", raw), None)),
        }
    }

    /// Underlying page
    #[inline]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Underlying page, mutable
    #[inline]
    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// Offset one past the last record
    #[inline]
    pub fn free_index(&self) -> usize {
        self.page.read_i32(self.free_offset) as usize
    }

    #[inline]
    fn set_free_index(&mut self, free: usize) {
        self.page.write_i32(self.free_offset, free as i32);
    }

    /// Bytes used by records
    #[inline]
    pub fn used(&self) -> usize {
        self.free_index() - RECORDS_START
    }

    /// Bytes available for records
    #[inline]
    pub fn usable(&self) -> usize {
        self.page.len() - RECORDS_START
    }

    /// Percentage of the record area in use
    pub fn load_factor(&self) -> usize {
        self.used() * 100 / self.usable()
    }

    /// Whether the page holds no records
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free_index() == RECORDS_START
    }

    /// Middle of the used area, the target of a split
    pub fn halfway(&self) -> usize {
        self.used() / 2 + RECORDS_START
    }

    fn slot_at(&self, offset: usize) -> Result<(K, Slot)> {
        let body = &self.page.as_bytes()[..self.free_index()];
        let (key, key_len) = decode_prefix::<K>(&body[offset..])?;
        let value_len = V::encoded_len_at(&body[offset + key_len..])?;
        Ok((key, Slot { offset, key_len, value_len }))
    }

    fn lookup(&self, key: &K) -> Result<Lookup> {
        let free = self.free_index();
        let mut offset = RECORDS_START;
        while offset < free {
            let (current, slot) = self.slot_at(offset)?;
            match current.cmp(key) {
                Ordering::Equal => return Ok(Lookup::Found(slot)),
                Ordering::Greater => return Ok(Lookup::Vacant(offset)),
                Ordering::Less => offset += slot.len(),
            }
        }
        Ok(Lookup::Vacant(free))
    }

    fn decode_value(&self, slot: &Slot) -> Result<V> {
        let start = slot.value_offset();
        V::decode(&self.page.as_bytes()[start..start + slot.value_len])
    }

    /// Value stored under `key`
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        match self.lookup(key)? {
            Lookup::Found(slot) => self.decode_value(&slot).map(Some),
            Lookup::Vacant(_) => Ok(None),
        }
    }

    /// Insert a new record in key order
    pub fn add(&mut self, key: &K, value: &V) -> Result<Fit> {
        let at = match self.lookup(key)? {
            Lookup::Found(_) => return Err(Error::DuplicateKey),
            Lookup::Vacant(at) => at,
        };

        let key_len = key.encoded_len();
        let len = key_len + value.encoded_len();
        let free = self.free_index();
        if free + len > self.page.len() {
            return Ok(Fit::Overflow { required: free + len });
        }

        self.page.open_gap(at, len);
        let bytes = self.page.as_bytes_mut();
        key.encode(&mut bytes[at..at + key_len]);
        value.encode(&mut bytes[at + key_len..at + len]);
        self.set_free_index(free + len);
        Ok(Fit::Stored)
    }

    /// Replace the value stored under `key`, resizing the record in place
    pub fn update(&mut self, key: &K, value: &V) -> Result<Fit> {
        let slot = match self.lookup(key)? {
            Lookup::Found(slot) => slot,
            Lookup::Vacant(_) => return Err(Error::NotFound),
        };

        let free = self.free_index();
        let new_len = value.encoded_len();
        let at = slot.value_offset();
        match new_len.cmp(&slot.value_len) {
            Ordering::Greater => {
                let grow = new_len - slot.value_len;
                if free + grow > self.page.len() {
                    return Ok(Fit::Overflow { required: free + grow });
                }
                self.page.open_gap(at, grow);
                self.set_free_index(free + grow);
            }
            Ordering::Less => {
                let shrink = slot.value_len - new_len;
                self.page.erase_and_compact(at, at + shrink - 1);
                self.set_free_index(free - shrink);
            }
            Ordering::Equal => {}
        }

        value.encode(&mut self.page.as_bytes_mut()[at..at + new_len]);
        Ok(Fit::Stored)
    }

    /// Remove the record stored under `key`
    pub fn remove(&mut self, key: &K) -> Result<()> {
        let slot = match self.lookup(key)? {
            Lookup::Found(slot) => slot,
            Lookup::Vacant(_) => return Err(Error::NotFound),
        };
        let free = self.free_index();
        self.page.erase_and_compact(slot.offset, slot.offset + slot.len() - 1);
        self.set_free_index(free - slot.len());
        Ok(())
    }

    /// Append a record after the last one; the caller keeps key order
    pub fn push(&mut self, key: &K, value: &V) -> Result<()> {
        let key_len = key.encoded_len();
        let len = key_len + value.encoded_len();
        let free = self.free_index();
        if free + len > self.page.len() {
            return Err(Error::corrupt("appended record does not fit the page", None));
        }
        let bytes = self.page.as_bytes_mut();
        key.encode(&mut bytes[free..free + key_len]);
        value.encode(&mut bytes[free + key_len..free + len]);
        self.set_free_index(free + len);
        Ok(())
    }

    /// Append already encoded records after the last one
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let free = self.free_index();
        if free + bytes.len() > self.page.len() {
            return Err(Error::corrupt("record range does not fit the page", None));
        }
        self.page.as_bytes_mut()[free..free + bytes.len()].copy_from_slice(bytes);
        self.set_free_index(free + bytes.len());
        Ok(())
    }

    /// Encoded bytes of `[from, to)`
    #[inline]
    pub fn raw(&self, from: usize, to: usize) -> &[u8] {
        &self.page.as_bytes()[from..to]
    }

    /// Encoded bytes of every record
    #[inline]
    pub fn raw_records(&self) -> &[u8] {
        self.raw(RECORDS_START, self.free_index())
    }

    /// Start offset of every record followed by the free index
    pub fn offsets(&self) -> Result<Vec<usize>> {
        let free = self.free_index();
        let mut offsets = Vec::new();
        let mut offset = RECORDS_START;
        while offset < free {
            offsets.push(offset);
            offset += self.slot_at(offset)?.1.len();
        }
        offsets.push(free);
        Ok(offsets)
    }

    /// Record decoded at `offset`
    pub fn record_at(&self, offset: usize) -> Result<(K, V)> {
        let (key, slot) = self.slot_at(offset)?;
        Ok((key, self.decode_value(&slot)?))
    }

    /// Smallest key
    pub fn first_key(&self) -> Result<Option<K>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.slot_at(RECORDS_START).map(|(key, _)| Some(key))
    }

    /// Number of records
    pub fn len(&self) -> Result<usize> {
        Ok(self.offsets()?.len() - 1)
    }

    /// Copy of these records in a page of at least `size` bytes
    pub fn resized(&self, size: usize) -> Self {
        let mut page = Page::new(size.max(self.page.len()));
        self.page.copy_to(&mut page);
        Self::new(page, self.free_offset)
    }

    /// Records in ascending key order; call again to restart
    pub fn iter(&self) -> Records<'_, K, V> {
        Records { records: self, offset: RECORDS_START, done: false }
    }
}

/// Index of the first offset at or past `halfway`
pub fn boundary_after(offsets: &[usize], halfway: usize) -> usize {
    offsets.iter().position(|o| *o >= halfway).unwrap_or(offsets.len() - 1)
}

/// Index of the record boundary closest to `halfway`, ties going right
pub fn nearest_boundary(offsets: &[usize], halfway: usize) -> usize {
    let i = boundary_after(offsets, halfway);
    if i == 0 {
        return 0;
    }
    let (prev, cur) = (offsets[i - 1], offsets[i]);
    if halfway - prev < cur - halfway {
        i - 1
    } else {
        i
    }
}

/// Iterator over the records of a [`RecordPage`]
pub struct Records<'a, K, V> {
    records: &'a RecordPage<K, V>,
    offset: usize,
    done: bool,
}

impl<'a, K: Codec + Ord, V: Codec> Iterator for Records<'a, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.records.free_index() {
            return None;
        }
        match self.records.slot_at(self.offset) {
            Ok((key, slot)) => {
                self.offset += slot.len();
                Some(self.records.decode_value(&slot).map(|value| (key, value)))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
