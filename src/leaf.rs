//! Leaf nodes: sorted records plus a forward sibling pointer

use crate::codec::Codec;
use crate::error::{Error, PageId, Result};
use crate::node::{Node, Outcome, Split, UNDERFLOW_THRESHOLD};
use crate::page::{Page, LEAF_TAG};
use crate::records::{nearest_boundary, Fit, RecordPage, RECORDS_START};
use tracing::trace;

const NEXT_OFFSET: usize = 4;
const FREE_OFFSET: usize = 8;
const NO_PAGE: i32 = -1;

/// Leaf page view
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    records: RecordPage<K, V>,
}

impl<K: Codec + Ord, V: Codec> LeafNode<K, V> {
    /// Empty leaf with no sibling
    pub fn new(page_size: usize) -> Self {
        let mut page = Page::new(page_size);
        page.write_i32(0, LEAF_TAG);
        page.write_i32(NEXT_OFFSET, NO_PAGE);
        Self { records: RecordPage::empty(page, FREE_OFFSET) }
    }

    /// Wrap a page tagged as a leaf
    pub fn from_page(page: Page) -> Result<Self> {
        let records = RecordPage::new(page, FREE_OFFSET);
        records.validate()?;
        Ok(Self { records })
    }

    /// Underlying page
    pub fn page(&self) -> &Page {
        self.records.page()
    }

    /// Records held by this leaf
    pub fn records(&self) -> &RecordPage<K, V> {
        &self.records
    }

    /// Forward sibling
    pub fn next(&self) -> Option<PageId> {
        PageId::from_raw(self.page().read_i32(NEXT_OFFSET))
    }

    /// Set the forward sibling
    pub fn set_next(&mut self, next: Option<PageId>) {
        let raw = next.map_or(NO_PAGE, PageId::to_raw);
        self.records.page_mut().write_i32(NEXT_OFFSET, raw);
    }

    /// Percentage of the record area in use
    pub fn load_factor(&self) -> usize {
        self.records.load_factor()
    }

    /// Value stored under `key`
    pub fn search(&self, key: &K) -> Result<Option<V>> {
        self.records.get(key)
    }

    pub(crate) fn insert(&mut self, key: &K, value: &V) -> Result<Outcome<K, V>> {
        match self.records.add(key, value)? {
            Fit::Stored => Ok(Outcome::Changed),
            Fit::Overflow { required } => {
                let mut oversized = self.resized(required);
                let fit = oversized.records.add(key, value)?;
                oversized.escalate(fit)
            }
        }
    }

    pub(crate) fn update(&mut self, key: &K, value: &V) -> Result<Outcome<K, V>> {
        match self.records.update(key, value)? {
            Fit::Stored => Ok(Outcome::Changed),
            Fit::Overflow { required } => {
                let mut oversized = self.resized(required);
                let fit = oversized.records.update(key, value)?;
                oversized.escalate(fit)
            }
        }
    }

    pub(crate) fn delete(&mut self, key: &K) -> Result<Outcome<K, V>> {
        self.records.remove(key)?;
        Ok(Outcome::Changed)
    }

    fn resized(&self, size: usize) -> Self {
        Self { records: self.records.resized(size) }
    }

    fn escalate(self, fit: Fit) -> Result<Outcome<K, V>> {
        match fit {
            Fit::Stored => Ok(Outcome::Overflow(Node::Leaf(self))),
            Fit::Overflow { required } => Err(Error::corrupt(
                format!("oversized leaf still needs {} bytes", required),
                None,
            )),
        }
    }

    /// Split at the record boundary nearest the middle of the used bytes.
    ///
    /// The first key of the right half is promoted and stays in the right half.
    pub(crate) fn split(&self, right_pos: PageId, page_size: usize) -> Result<Split<K, V>> {
        let offsets = self.records.offsets()?;
        let count = offsets.len() - 1;
        if count < 2 {
            return Err(Error::corrupt("cannot split a leaf with fewer than two records", None));
        }
        let at = nearest_boundary(&offsets, self.records.halfway()).clamp(1, count - 1);

        let mut left = Self::new(page_size);
        left.records.append_raw(self.records.raw(RECORDS_START, offsets[at]))?;
        left.set_next(Some(right_pos));

        let mut right = Self::new(page_size);
        right.records.append_raw(self.records.raw(offsets[at], offsets[count]))?;
        right.set_next(self.next());

        let promoted = right
            .records
            .first_key()?
            .ok_or_else(|| Error::corrupt("right half of a leaf split is empty", None))?;

        trace!(right = %right_pos, at, count, "leaf.split");
        Ok(Split { left: Node::Leaf(left), right: Node::Leaf(right), promoted })
    }

    pub(crate) fn try_merge(left: &Self, right: &Self, page_size: usize) -> Result<Option<Self>> {
        if left.records.used() + right.records.used() > page_size - RECORDS_START {
            return Ok(None);
        }
        let mut merged = Self::new(page_size);
        merged.records.append_raw(left.records.raw_records())?;
        merged.records.append_raw(right.records.raw_records())?;
        merged.set_next(right.next());
        trace!(used = merged.records.used(), "leaf.merge");
        Ok(Some(merged))
    }

    pub(crate) fn try_balance(left: &Self, right: &Self, page_size: usize) -> Result<Option<Split<K, V>>> {
        let right_pos = left
            .next()
            .ok_or_else(|| Error::corrupt("left sibling leaf has no next pointer", None))?;

        let combined = left.records.used() + right.records.used();
        let mut scratch = Self::new(page_size.max(RECORDS_START + combined));
        scratch.records.append_raw(left.records.raw_records())?;
        scratch.records.append_raw(right.records.raw_records())?;
        scratch.set_next(right.next());
        if scratch.records.len()? < 2 {
            return Ok(None);
        }

        let split = scratch.split(right_pos, page_size)?;
        if split.left.load_factor() < UNDERFLOW_THRESHOLD
            || split.right.load_factor() < UNDERFLOW_THRESHOLD
        {
            return Ok(None);
        }
        trace!(right = %right_pos, "leaf.balance");
        Ok(Some(split))
    }
}
