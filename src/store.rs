//! Recycling page store
//!
//! Composes a [`PageFile`] with a [`FreePageMap`]. Physical page 0 holds the
//! bitmap; logical page `n` lives at physical page `n + 1`. Released pages
//! are handed out again before the file grows.

use crate::error::{Error, PageId, Result};
use crate::file::PageFile;
use crate::freemap::FreePageMap;
use crate::io::IoBackend;
use crate::page::Page;
use std::cell::Cell;
use tracing::debug;

const BITMAP_PAGE: u32 = 0;

/// Counters of the page traffic a store has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Logical pages read
    pub page_reads: u64,
    /// Logical pages written, including appends with content
    pub page_writes: u64,
    /// Bitmap page rewrites
    pub bitmap_writes: u64,
    /// Pages handed out by reserve/append
    pub allocations: u64,
    /// Pages released
    pub releases: u64,
}

/// Page store that recycles released pages
#[derive(Debug)]
pub struct PageStore<B> {
    file: PageFile<B>,
    free: FreePageMap,
    stats: Cell<IoStats>,
}

impl<B: IoBackend> PageStore<B> {
    /// Open a store. `initializer` runs once, when the store is created.
    pub fn open<F>(backend: B, page_size: usize, initializer: F) -> Result<Self>
    where
        F: FnOnce(&mut PageStore<B>) -> Result<()>,
    {
        let file = PageFile::open(backend, page_size, |file| {
            file.append(&Page::new(file.page_size())).map(|_| ())
        })?;
        let free = FreePageMap::from_page(file.read(BITMAP_PAGE)?);
        let just_created = file.just_created();

        let mut store = Self { file, free, stats: Cell::new(IoStats::default()) };
        if just_created {
            initializer(&mut store)?;
            store.file.sync()?;
        }
        Ok(store)
    }

    /// Page size in bytes
    #[inline]
    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Number of logical pages ever allocated, free or not
    #[inline]
    fn logical_len(&self) -> u32 {
        self.file.page_count() - 1
    }

    /// Number of occupied logical pages
    pub fn page_count(&self) -> u32 {
        let len = self.logical_len();
        len - self.free.free_count(len)
    }

    /// Lowest occupied logical page
    pub fn first_occupied(&self) -> Option<PageId> {
        self.free.first_occupied(self.logical_len()).map(PageId)
    }

    /// Next occupied logical page after `pos`
    pub fn next_occupied(&self, pos: PageId) -> Option<PageId> {
        self.free.next_occupied(pos.0, self.logical_len()).map(PageId)
    }

    /// Logical pages the bitmap can track
    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    /// Pages that can still be allocated, free ones included
    pub fn available(&self) -> usize {
        let len = self.logical_len();
        self.free.free_count(len) as usize + self.free.capacity().saturating_sub(len as usize)
    }

    /// Whether `pos` has been released and not reallocated
    pub fn is_free(&self, pos: PageId) -> bool {
        self.free.is_free(pos.0)
    }

    /// Allocate a page without writing content
    pub fn reserve(&mut self) -> Result<PageId> {
        self.allocate(None)
    }

    /// Allocate a page and write `page` into it
    pub fn append(&mut self, page: &Page) -> Result<PageId> {
        self.allocate(Some(page))
    }

    /// Return `pos` to the free pool. The contents are left in place.
    pub fn release(&mut self, pos: PageId) -> Result<()> {
        self.check_occupied(pos)?;
        self.free.make_free(pos.0);
        self.persist_map()?;
        self.bump(|s| s.releases += 1);
        debug!(page = %pos, "store.release");
        Ok(())
    }

    /// Read logical page `pos`
    pub fn read(&self, pos: PageId) -> Result<Page> {
        self.check_occupied(pos)?;
        self.bump(|s| s.page_reads += 1);
        self.file.read(pos.0 + 1)
    }

    /// Read logical page `pos` into `page`
    pub fn read_into(&self, pos: PageId, page: &mut Page) -> Result<()> {
        self.check_occupied(pos)?;
        self.bump(|s| s.page_reads += 1);
        self.file.read_into(pos.0 + 1, page)
    }

    /// Overwrite logical page `pos`
    pub fn write(&mut self, pos: PageId, page: &Page) -> Result<()> {
        self.check_occupied(pos)?;
        self.bump(|s| s.page_writes += 1);
        self.file.write(pos.0 + 1, page)
    }

    /// Flush to durable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    /// Traffic counters since open or the last reset
    pub fn stats(&self) -> IoStats {
        self.stats.get()
    }

    /// Zero the traffic counters
    pub fn reset_stats(&self) {
        self.stats.set(IoStats::default());
    }

    fn allocate(&mut self, content: Option<&Page>) -> Result<PageId> {
        let pos = match self.free.first_free() {
            Some(pos) => {
                self.free.make_occupied(pos);
                let pos = PageId(pos);
                if let Some(page) = content {
                    self.write(pos, page)?;
                }
                pos
            }
            None => {
                let pos = self.logical_len();
                if pos as usize >= self.free.capacity() {
                    return Err(Error::StoreFull { capacity: self.free.capacity() });
                }
                match content {
                    Some(page) => {
                        self.file.append(page)?;
                        self.bump(|s| s.page_writes += 1);
                    }
                    None => {
                        self.file.append(&Page::new(self.page_size()))?;
                    }
                }
                PageId(pos)
            }
        };

        self.persist_map()?;
        self.bump(|s| s.allocations += 1);
        debug!(page = %pos, "store.allocate");
        Ok(pos)
    }

    fn persist_map(&mut self) -> Result<()> {
        self.file.write(BITMAP_PAGE, self.free.page())?;
        self.bump(|s| s.bitmap_writes += 1);
        Ok(())
    }

    fn check_occupied(&self, pos: PageId) -> Result<()> {
        if pos.0 >= self.logical_len() {
            return Err(Error::InvalidPageId(pos));
        }
        if self.free.is_free(pos.0) {
            return Err(Error::corrupt("access to a released page", Some(pos)));
        }
        Ok(())
    }

    #[inline]
    fn bump(&self, f: impl FnOnce(&mut IoStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}
