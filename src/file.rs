//! Sequential storage of fixed-size pages

use crate::error::{Error, PageId, Result};
use crate::io::IoBackend;
use crate::page::Page;

/// Fixed-size page storage over an [`IoBackend`]
///
/// Positions here are physical page numbers.
#[derive(Debug)]
pub struct PageFile<B> {
    backend: B,
    page_size: usize,
    page_count: u32,
    just_created: bool,
}

impl<B: IoBackend> PageFile<B> {
    /// Open a page file. `initializer` runs exactly once, when the backend
    /// held no pages yet.
    pub fn open<F>(backend: B, page_size: usize, initializer: F) -> Result<Self>
    where
        F: FnOnce(&mut PageFile<B>) -> Result<()>,
    {
        if page_size == 0 {
            return Err(Error::InvalidParameter("page size must be non-zero"));
        }

        let len = backend.len()?;
        if len % page_size as u64 != 0 {
            return Err(Error::corrupt(
                format!("file length {} is not a multiple of page size {}", len, page_size),
                None,
            ));
        }

        let page_count = u32::try_from(len / page_size as u64)
            .map_err(|_| Error::corrupt("page file has too many pages", None))?;

        let mut file = Self { backend, page_size, page_count, just_created: len == 0 };
        if file.just_created {
            initializer(&mut file)?;
            file.backend.sync()?;
        }
        Ok(file)
    }

    /// Page size in bytes
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently stored
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Whether this open created the file
    #[inline]
    pub fn just_created(&self) -> bool {
        self.just_created
    }

    /// Read page `pos`
    pub fn read(&self, pos: u32) -> Result<Page> {
        let mut page = Page::new(self.page_size);
        self.read_into(pos, &mut page)?;
        Ok(page)
    }

    /// Read page `pos` into an existing buffer of page size
    pub fn read_into(&self, pos: u32, page: &mut Page) -> Result<()> {
        self.check_pos(pos)?;
        self.check_len(page)?;
        self.backend.read_at(self.offset(pos), page.as_bytes_mut())
    }

    /// Overwrite page `pos`
    pub fn write(&mut self, pos: u32, page: &Page) -> Result<()> {
        self.check_pos(pos)?;
        self.check_len(page)?;
        self.backend.write_at(self.offset(pos), page.as_bytes())
    }

    /// Add `page` at the end, returning its position
    pub fn append(&mut self, page: &Page) -> Result<u32> {
        self.check_len(page)?;
        let pos = self.page_count;
        self.backend.write_at(self.offset(pos), page.as_bytes())?;
        self.page_count += 1;
        Ok(pos)
    }

    /// Flush the backend
    pub fn sync(&mut self) -> Result<()> {
        self.backend.sync()
    }

    #[inline]
    fn offset(&self, pos: u32) -> u64 {
        pos as u64 * self.page_size as u64
    }

    fn check_pos(&self, pos: u32) -> Result<()> {
        if pos >= self.page_count {
            return Err(Error::InvalidPageId(PageId(pos)));
        }
        Ok(())
    }

    fn check_len(&self, page: &Page) -> Result<()> {
        if page.len() != self.page_size {
            return Err(Error::InvalidParameter("page length differs from the file's page size"));
        }
        Ok(())
    }
}
