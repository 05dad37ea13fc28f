//! Bitmap of reusable logical pages
//!
//! One bit per logical page, eight pages per byte, least significant bit
//! first. A set bit means the page is free; clear bits, including positions
//! never allocated, mean occupied.

use crate::page::Page;

/// Free page bitmap held in a single page
#[derive(Debug, Clone)]
pub struct FreePageMap {
    page: Page,
}

impl FreePageMap {
    /// Empty map (every position occupied) for the given page size
    pub fn new(page_size: usize) -> Self {
        Self { page: Page::new(page_size) }
    }

    /// Wrap a bitmap page read from storage
    pub fn from_page(page: Page) -> Self {
        Self { page }
    }

    /// The backing page, for persisting
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Number of logical pages the map can address
    #[inline]
    pub fn capacity(&self) -> usize {
        self.page.len() * 8
    }

    /// Whether `pos` is marked free. Positions past capacity are occupied.
    pub fn is_free(&self, pos: u32) -> bool {
        let pos = pos as usize;
        if pos >= self.capacity() {
            return false;
        }
        self.page.get(pos / 8) & (1 << (pos % 8)) != 0
    }

    /// Mark `pos` free
    pub fn make_free(&mut self, pos: u32) {
        let (byte, mask) = self.locate(pos);
        self.page.set(byte, self.page.get(byte) | mask);
    }

    /// Mark `pos` occupied
    pub fn make_occupied(&mut self, pos: u32) {
        let (byte, mask) = self.locate(pos);
        self.page.set(byte, self.page.get(byte) & !mask);
    }

    /// Lowest free position
    pub fn first_free(&self) -> Option<u32> {
        let bytes = self.page.as_bytes();
        let byte = bytes.iter().position(|b| *b != 0)?;
        Some((byte * 8) as u32 + bytes[byte].trailing_zeros())
    }

    /// Lowest occupied position below `limit`
    pub fn first_occupied(&self, limit: u32) -> Option<u32> {
        (0..limit).find(|pos| !self.is_free(*pos))
    }

    /// Lowest occupied position after `pos` and below `limit`
    pub fn next_occupied(&self, pos: u32, limit: u32) -> Option<u32> {
        (pos.saturating_add(1)..limit).find(|p| !self.is_free(*p))
    }

    /// Number of free positions below `limit`
    pub fn free_count(&self, limit: u32) -> u32 {
        (0..limit).filter(|pos| self.is_free(*pos)).count() as u32
    }

    fn locate(&self, pos: u32) -> (usize, u8) {
        let pos = pos as usize;
        assert!(pos < self.capacity(), "position {} outside bitmap of {}", pos, self.capacity());
        (pos / 8, 1 << (pos % 8))
    }
}
