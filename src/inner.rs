//! Inner nodes: a leftmost child pointer followed by (key, right child) pairs
//!
//! For `n` keys there are `n + 1` children. The child for a key `k` is the
//! pointer just left of the first stored key greater than `k`.

use crate::codec::Codec;
use crate::error::{Error, PageId, Result};
use crate::io::IoBackend;
use crate::node::{Node, Outcome, Split, UNDERFLOW_THRESHOLD};
use crate::page::{Page, INNER_TAG, INT_LEN};
use crate::records::{boundary_after, Fit, RecordPage, RECORDS_START};
use crate::store::PageStore;
use std::marker::PhantomData;
use tracing::trace;

const FREE_OFFSET: usize = 4;
const LEFTMOST_OFFSET: usize = 8;

/// Child chosen for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Child index, 0 being the leftmost pointer
    pub index: usize,
    /// Logical page of the child
    pub child: PageId,
}

/// Inner page view
#[derive(Debug, Clone)]
pub struct InnerNode<K, V> {
    pairs: RecordPage<K, PageId>,
    _marker: PhantomData<fn() -> V>,
}

impl<K: Codec + Ord, V: Codec> InnerNode<K, V> {
    /// Inner node with no keys and a single child
    pub fn new(page_size: usize, leftmost: PageId) -> Self {
        let mut page = Page::new(page_size);
        page.write_i32(0, INNER_TAG);
        page.write_i32(LEFTMOST_OFFSET, leftmost.to_raw());
        Self { pairs: RecordPage::empty(page, FREE_OFFSET), _marker: PhantomData }
    }

    /// Root over the two halves of a split
    pub fn with_children(page_size: usize, left: PageId, key: &K, right: PageId) -> Result<Self> {
        let mut node = Self::new(page_size, left);
        node.pairs.push(key, &right)?;
        Ok(node)
    }

    /// Wrap a page tagged as inner
    pub fn from_page(page: Page) -> Result<Self> {
        let pairs = RecordPage::new(page, FREE_OFFSET);
        pairs.validate()?;
        let node = Self { pairs, _marker: PhantomData };
        if PageId::from_raw(node.page().read_i32(LEFTMOST_OFFSET)).is_none() {
            return Err(Error::corrupt("inner node without a leftmost child", None));
        }
        Ok(node)
    }

    /// Underlying page
    pub fn page(&self) -> &Page {
        self.pairs.page()
    }

    /// First child pointer
    pub fn leftmost(&self) -> PageId {
        // validated in from_page and only ever written from a PageId
        PageId(self.page().read_i32(LEFTMOST_OFFSET) as u32)
    }

    /// Percentage of the pair area in use
    pub fn load_factor(&self) -> usize {
        self.pairs.load_factor()
    }

    /// Number of keys
    pub fn key_count(&self) -> Result<usize> {
        self.pairs.len()
    }

    /// Keys with their right child pointers, in order
    pub fn entries(&self) -> Result<Vec<(K, PageId)>> {
        self.pairs.iter().collect()
    }

    /// Every child pointer, leftmost first
    pub fn children(&self) -> Result<Vec<PageId>> {
        let mut children = vec![self.leftmost()];
        for pair in self.pairs.iter() {
            children.push(pair?.1);
        }
        Ok(children)
    }

    /// Child responsible for `key`
    pub fn route(&self, key: &K) -> Result<Route> {
        let mut route = Route { index: 0, child: self.leftmost() };
        for pair in self.pairs.iter() {
            let (separator, right) = pair?;
            if separator > *key {
                break;
            }
            route = Route { index: route.index + 1, child: right };
        }
        Ok(route)
    }

    pub(crate) fn search<B: IoBackend>(&self, store: &PageStore<B>, key: &K) -> Result<Option<V>> {
        let route = self.route(key)?;
        Node::<K, V>::load(store, route.child)?.search(store, key)
    }

    pub(crate) fn insert<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        key: &K,
        value: &V,
    ) -> Result<Outcome<K, V>> {
        let route = self.route(key)?;
        let mut child = Node::<K, V>::load(store, route.child)?;
        match child.insert(store, key, value)? {
            Outcome::Unchanged => Ok(Outcome::Unchanged),
            Outcome::Changed => {
                store.write(route.child, child.page())?;
                Ok(Outcome::Unchanged)
            }
            Outcome::Overflow(oversized) => self.absorb_overflow(store, route.child, oversized),
        }
    }

    pub(crate) fn update<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        key: &K,
        value: &V,
    ) -> Result<Outcome<K, V>> {
        let route = self.route(key)?;
        let mut child = Node::<K, V>::load(store, route.child)?;
        match child.update(store, key, value)? {
            Outcome::Unchanged => Ok(Outcome::Unchanged),
            Outcome::Changed => self.settle_child(store, route, child),
            Outcome::Overflow(oversized) => self.absorb_overflow(store, route.child, oversized),
        }
    }

    pub(crate) fn delete<B: IoBackend>(&mut self, store: &mut PageStore<B>, key: &K) -> Result<Outcome<K, V>> {
        let route = self.route(key)?;
        let mut child = Node::<K, V>::load(store, route.child)?;
        match child.delete(store, key)? {
            Outcome::Unchanged => Ok(Outcome::Unchanged),
            Outcome::Changed => self.settle_child(store, route, child),
            Outcome::Overflow(oversized) => self.absorb_overflow(store, route.child, oversized),
        }
    }

    /// Split an oversized child into its own page and a fresh one, then adopt the promoted key
    fn absorb_overflow<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        child_pos: PageId,
        oversized: Node<K, V>,
    ) -> Result<Outcome<K, V>> {
        let sibling = store.reserve()?;
        let split = oversized.split(sibling, store.page_size())?;
        store.write(child_pos, split.left.page())?;
        store.write(sibling, split.right.page())?;
        self.insert_key(&split.promoted, sibling)
    }

    /// Add a separator with its right child pointer
    pub(crate) fn insert_key(&mut self, key: &K, right: PageId) -> Result<Outcome<K, V>> {
        match self.pairs.add(key, &right)? {
            Fit::Stored => Ok(Outcome::Changed),
            Fit::Overflow { required } => {
                let mut oversized = Self { pairs: self.pairs.resized(required), _marker: PhantomData };
                match oversized.pairs.add(key, &right)? {
                    Fit::Stored => Ok(Outcome::Overflow(Node::Inner(oversized))),
                    Fit::Overflow { required } => Err(Error::corrupt(
                        format!("oversized inner node still needs {} bytes", required),
                        None,
                    )),
                }
            }
        }
    }

    /// Persist a changed child, first rebalancing it if it fell below half full
    fn settle_child<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        route: Route,
        child: Node<K, V>,
    ) -> Result<Outcome<K, V>> {
        if child.load_factor() < UNDERFLOW_THRESHOLD {
            if let Some(outcome) = self.resolve_underflow(store, route, &child)? {
                return Ok(outcome);
            }
        }
        store.write(route.child, child.page())?;
        Ok(Outcome::Unchanged)
    }

    /// Balance with the left sibling, then the right, then merge with the
    /// left, then the right. `None` when the child has to stay as it is.
    fn resolve_underflow<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        route: Route,
        child: &Node<K, V>,
    ) -> Result<Option<Outcome<K, V>>> {
        let entries = self.entries()?;
        let page_size = store.page_size();
        let index = route.index;

        let left = match index {
            0 => None,
            1 => Some(self.leftmost()),
            _ => Some(entries[index - 2].1),
        };
        let left = match left {
            Some(pos) => Some((pos, Node::<K, V>::load(store, pos)?, &entries[index - 1].0)),
            None => None,
        };
        let right = match entries.get(index) {
            Some((separator, pos)) => Some((*pos, Node::<K, V>::load(store, *pos)?, separator)),
            None => None,
        };

        if let Some((left_pos, left, separator)) = &left {
            if let Some(split) = Node::try_balance(left, child, separator, page_size)? {
                store.write(*left_pos, split.left.page())?;
                store.write(route.child, split.right.page())?;
                trace!(left = %left_pos, child = %route.child, "inner.balance_left");
                return self.replace_separator(separator, &split.promoted, route.child).map(Some);
            }
        }

        if let Some((right_pos, right, separator)) = &right {
            if let Some(split) = Node::try_balance(child, right, separator, page_size)? {
                store.write(route.child, split.left.page())?;
                store.write(*right_pos, split.right.page())?;
                trace!(child = %route.child, right = %right_pos, "inner.balance_right");
                return self.replace_separator(separator, &split.promoted, *right_pos).map(Some);
            }
        }

        if let Some((left_pos, left, separator)) = &left {
            if let Some(merged) = Node::try_merge(left, child, separator, page_size)? {
                store.write(*left_pos, merged.page())?;
                store.release(route.child)?;
                self.pairs.remove(separator)?;
                trace!(survivor = %left_pos, released = %route.child, "inner.merge_left");
                return Ok(Some(Outcome::Changed));
            }
        }

        if let Some((right_pos, right, separator)) = &right {
            if let Some(merged) = Node::try_merge(child, right, separator, page_size)? {
                store.write(route.child, merged.page())?;
                store.release(*right_pos)?;
                self.pairs.remove(separator)?;
                trace!(survivor = %route.child, released = %right_pos, "inner.merge_right");
                return Ok(Some(Outcome::Changed));
            }
        }

        Ok(None)
    }

    fn replace_separator(&mut self, old: &K, new: &K, right: PageId) -> Result<Outcome<K, V>> {
        self.pairs.remove(old)?;
        self.insert_key(new, right)
    }

    /// Split around the pair spanning the middle of the used bytes.
    ///
    /// That pair's key is promoted and removed; its pointer becomes the
    /// leftmost child of the right half.
    pub(crate) fn split(&self, page_size: usize) -> Result<Split<K, V>> {
        let offsets = self.pairs.offsets()?;
        let count = offsets.len() - 1;
        if count < 3 {
            return Err(Error::corrupt("cannot split an inner node with fewer than three keys", None));
        }
        let at = boundary_after(&offsets, self.pairs.halfway())
            .saturating_sub(1)
            .clamp(1, count - 2);
        let (promoted, right_leftmost) = self.pairs.record_at(offsets[at])?;

        let mut left = Self::new(page_size, self.leftmost());
        left.pairs.append_raw(self.pairs.raw(RECORDS_START, offsets[at]))?;

        let mut right = Self::new(page_size, right_leftmost);
        right.pairs.append_raw(self.pairs.raw(offsets[at + 1], offsets[count]))?;

        trace!(at, count, "inner.split");
        Ok(Split { left: Node::Inner(left), right: Node::Inner(right), promoted })
    }

    /// Left pairs, then `middle` pointing at right's leftmost child, then right pairs
    fn concat(left: &Self, right: &Self, middle: &K, page_size: usize) -> Result<Self> {
        let mut node = Self::new(page_size, left.leftmost());
        node.pairs.append_raw(left.pairs.raw_records())?;
        node.pairs.push(middle, &right.leftmost())?;
        node.pairs.append_raw(right.pairs.raw_records())?;
        Ok(node)
    }

    fn combined_len(left: &Self, right: &Self, middle: &K) -> usize {
        left.pairs.used() + right.pairs.used() + middle.encoded_len() + INT_LEN
    }

    pub(crate) fn try_merge(left: &Self, right: &Self, middle: &K, page_size: usize) -> Result<Option<Self>> {
        if Self::combined_len(left, right, middle) > page_size - RECORDS_START {
            return Ok(None);
        }
        Self::concat(left, right, middle, page_size).map(Some)
    }

    pub(crate) fn try_balance(
        left: &Self,
        right: &Self,
        middle: &K,
        page_size: usize,
    ) -> Result<Option<Split<K, V>>> {
        let size = page_size.max(RECORDS_START + Self::combined_len(left, right, middle));
        let scratch = Self::concat(left, right, middle, size)?;
        if scratch.key_count()? < 3 {
            return Ok(None);
        }

        let split = scratch.split(page_size)?;
        if split.left.load_factor() < UNDERFLOW_THRESHOLD
            || split.right.load_factor() < UNDERFLOW_THRESHOLD
        {
            return Ok(None);
        }
        Ok(Some(split))
    }

    pub(crate) fn try_replace_empty_element(&self) -> Option<PageId> {
        if self.pairs.is_empty() {
            Some(self.leftmost())
        } else {
            None
        }
    }
}
