//! Page management and structures
//!
//! Pages are the fundamental unit of storage and allocation. A page is a
//! fixed-capacity byte buffer; node pages start with a 12 byte header:
//!
//! ```text
//! offset 0 : i32 type tag (1 = leaf, 2 = inner)
//! offset 4 : i32 leaf: next sibling     | inner: free index
//! offset 8 : i32 leaf: free index       | inner: leftmost child
//! offset 12: records, packed in ascending key order
//! ```

use byteorder::{ByteOrder, LittleEndian};
use static_assertions::const_assert;
use std::fmt;

/// Type tag of a leaf node page
pub const LEAF_TAG: i32 = 1;

/// Type tag of an inner node page
pub const INNER_TAG: i32 = 2;

/// Width of every integer field in a node header
pub const INT_LEN: usize = 4;

/// Length of the node header; records start here
pub const NODE_HEADER_LEN: usize = 3 * INT_LEN;

/// Smallest page size a tree can be configured with
pub const MIN_PAGE_SIZE: usize = 64;

/// Largest page size a tree can be configured with
pub const MAX_PAGE_SIZE: usize = 1 << 20;

const_assert!(NODE_HEADER_LEN == 12);
const_assert!(MIN_PAGE_SIZE > 2 * NODE_HEADER_LEN);
const_assert!(MAX_PAGE_SIZE <= i32::MAX as usize);

/// Fixed-capacity mutable byte buffer
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Create a zero-filled page
    pub fn new(size: usize) -> Self {
        Self { data: vec![0u8; size].into_boxed_slice() }
    }

    /// Create a page holding a copy of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes.into() }
    }

    /// Capacity in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the page has zero capacity
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw contents
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw mutable contents
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte at `index`
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.data[index]
    }

    /// Set the byte at `index`
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        self.data[index] = value;
    }

    /// Open `size` bytes of space at `at`, shifting `[at, len - size)` right.
    ///
    /// The trailing `size` bytes of the page are overwritten, so the caller
    /// must know they hold no live data.
    ///
    /// # Panics
    /// Panics if `at + size` exceeds the page capacity.
    pub fn open_gap(&mut self, at: usize, size: usize) {
        let len = self.len();
        assert!(
            at.checked_add(size).map_or(false, |end| end <= len),
            "gap of {} bytes at {} exceeds page capacity {}",
            size,
            at,
            len
        );
        self.data.copy_within(at..len - size, at + size);
    }

    /// Remove the inclusive range `[from, to]`, shifting the remainder left.
    ///
    /// # Panics
    /// Panics if the range is inverted or out of bounds.
    pub fn erase_and_compact(&mut self, from: usize, to: usize) {
        let len = self.len();
        assert!(from <= to && to < len, "invalid erase range [{}, {}] for page of {}", from, to, len);
        self.data.copy_within(to + 1..len, from);
    }

    /// Copy the whole page into `other`, which must be at least as large
    pub fn copy_to(&self, other: &mut Page) {
        assert!(
            other.len() >= self.len(),
            "cannot copy a page of {} bytes into {} bytes",
            self.len(),
            other.len()
        );
        other.data[..self.len()].copy_from_slice(&self.data);
    }

    /// Read a little-endian i32 at `offset`
    #[inline]
    pub fn read_i32(&self, offset: usize) -> i32 {
        LittleEndian::read_i32(&self.data[offset..offset + INT_LEN])
    }

    /// Write a little-endian i32 at `offset`
    #[inline]
    pub fn write_i32(&mut self, offset: usize, value: i32) {
        LittleEndian::write_i32(&mut self.data[offset..offset + INT_LEN], value);
    }

    /// Node type tag stored at offset 0
    #[inline]
    pub fn tag(&self) -> i32 {
        self.read_i32(0)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.data[..self.len().min(NODE_HEADER_LEN)];
        f.debug_struct("Page").field("len", &self.len()).field("head", &head).finish()
    }
}
