//! Tree container and its builder
//!
//! The root always lives at logical page 0. When the root overflows, its
//! halves move to two fresh pages and a new inner root is written at 0;
//! when an inner root loses its last key, its only child is copied to 0
//! and the child's page is released.

use crate::codec::Codec;
use crate::error::{Error, PageId, Result};
use crate::inner::InnerNode;
use crate::io::{FileBackend, IoBackend, MemoryBackend};
use crate::node::{Node, Outcome};
use crate::page::{INT_LEN, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::records::RECORDS_START;
use crate::store::{IoStats, PageStore};
use crate::tree_utils::{self, TreeStats};
use crate::DEFAULT_PAGE_SIZE;
use std::fmt::Debug;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Logical page of the root node
pub const ROOT_PAGE: PageId = PageId(0);

/// Builder for opening a [`BPlusTree`]
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    page_size: usize,
}

impl TreeBuilder {
    /// Create a builder with the default page size
    pub fn new() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }

    /// Set the page size. Must match on every reopen of the same store.
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Open or create a file-backed tree
    pub fn open<K, V>(self, path: impl AsRef<Path>) -> Result<BPlusTree<K, V, FileBackend>>
    where
        K: Codec + Ord,
        V: Codec,
    {
        self.validate()?;
        BPlusTree::with_backend(FileBackend::open(path)?, self.page_size)
    }

    /// Create a tree in memory
    pub fn open_in_memory<K, V>(self) -> Result<BPlusTree<K, V, MemoryBackend>>
    where
        K: Codec + Ord,
        V: Codec,
    {
        self.open_backend(MemoryBackend::new())
    }

    /// Open or create a tree over any backend
    pub fn open_backend<K, V, B>(self, backend: B) -> Result<BPlusTree<K, V, B>>
    where
        K: Codec + Ord,
        V: Codec,
        B: IoBackend,
    {
        self.validate()?;
        BPlusTree::with_backend(backend, self.page_size)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(Error::InvalidParameter("page size below minimum"));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidParameter("page size above maximum"));
        }
        Ok(())
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistent ordered key/value store
#[derive(Debug)]
pub struct BPlusTree<K, V, B = FileBackend> {
    store: PageStore<B>,
    root: Node<K, V>,
    depth: usize,
}

impl<K: Codec + Ord, V: Codec> BPlusTree<K, V, FileBackend> {
    /// Open or create a file-backed tree with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        TreeBuilder::new().open(path)
    }
}

impl<K: Codec + Ord, V: Codec, B: IoBackend> BPlusTree<K, V, B> {
    fn with_backend(backend: B, page_size: usize) -> Result<Self> {
        let store = PageStore::open(backend, page_size, |store| {
            let root = store.append(Node::<K, V>::empty_leaf(page_size).page())?;
            debug_assert_eq!(root, ROOT_PAGE);
            Ok(())
        })?;
        let root = Node::load(&store, ROOT_PAGE)?;
        let depth = Self::measure_depth(&store, &root)?;
        debug!(page_size, depth, pages = store.page_count(), "tree.open");
        Ok(Self { store, root, depth })
    }

    fn measure_depth(store: &PageStore<B>, root: &Node<K, V>) -> Result<usize> {
        let mut depth = 1;
        let mut next = match root {
            Node::Inner(inner) => Some(inner.leftmost()),
            Node::Leaf(_) => None,
        };
        while let Some(pos) = next {
            depth += 1;
            next = match Node::<K, V>::load(store, pos)? {
                Node::Inner(inner) => Some(inner.leftmost()),
                Node::Leaf(_) => None,
            };
        }
        Ok(depth)
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Largest accepted encoded record (key plus value)
    pub fn max_record_len(&self) -> usize {
        (self.page_size() - RECORDS_START) / 2
    }

    /// Insert a new key. Fails with [`Error::DuplicateKey`] if present.
    pub fn add(&mut self, key: &K, value: &V) -> Result<()> {
        self.check_record(key, value)?;
        self.check_capacity()?;
        let outcome = self.root.insert(&mut self.store, key, value)?;
        self.settle_root(outcome)
    }

    /// Replace the value of an existing key. Fails with [`Error::NotFound`] if absent.
    pub fn update(&mut self, key: &K, value: &V) -> Result<()> {
        self.check_record(key, value)?;
        self.check_capacity()?;
        let outcome = self.root.update(&mut self.store, key, value)?;
        self.settle_root(outcome)
    }

    /// Remove a key. Fails with [`Error::NotFound`] if absent.
    pub fn delete(&mut self, key: &K) -> Result<()> {
        let outcome = self.root.delete(&mut self.store, key)?;
        self.settle_root(outcome)
    }

    /// Value stored under `key`
    pub fn search(&self, key: &K) -> Result<Option<V>> {
        self.root.search(&self.store, key)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// Call `f` on every record in ascending key order
    pub fn inspect<F: FnMut(&K, &V)>(&self, mut f: F) -> Result<()> {
        self.root.visit(&self.store, &mut f)
    }

    /// Every record in ascending key order
    pub fn entries(&self) -> Result<Vec<(K, V)>>
    where
        K: Clone,
        V: Clone,
    {
        let mut entries = Vec::new();
        self.inspect(|k, v| entries.push((k.clone(), v.clone())))?;
        Ok(entries)
    }

    /// Number of records
    pub fn len(&self) -> Result<usize> {
        let mut len = 0;
        self.inspect(|_, _| len += 1)?;
        Ok(len)
    }

    /// Whether the tree holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root.is_leaf() && self.len()? == 0)
    }

    /// Write an indented description of every node
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()>
    where
        K: Debug,
        V: Debug,
    {
        self.root.dump(&self.store, out, 0)
    }

    /// Shape and fill statistics
    pub fn stats(&self) -> Result<TreeStats> {
        tree_utils::collect_stats(&self.store, &self.root)
    }

    /// Check ordering, separator bounds, leaf depth and the sibling chain
    pub fn validate(&self) -> Result<()> {
        tree_utils::validate_tree(&self.store, &self.root)
    }

    /// Page traffic since open or the last reset
    pub fn io_stats(&self) -> IoStats {
        self.store.stats()
    }

    /// Zero the page traffic counters
    pub fn reset_io_stats(&self) {
        self.store.reset_stats();
    }

    /// The underlying page store
    pub fn store(&self) -> &PageStore<B> {
        &self.store
    }

    /// Flush to durable storage
    pub fn sync(&mut self) -> Result<()> {
        self.store.sync()
    }

    fn check_record(&self, key: &K, value: &V) -> Result<()> {
        let max = self.max_record_len();
        let size = key.encoded_len() + value.encoded_len();
        if size > max {
            return Err(Error::RecordTooLarge { size, max });
        }
        let separator = key.encoded_len() + INT_LEN;
        if separator > max {
            return Err(Error::RecordTooLarge { size: separator, max });
        }
        Ok(())
    }

    /// A split on every level plus a new root takes `depth + 1` pages
    fn check_capacity(&self) -> Result<()> {
        if self.store.available() <= self.depth {
            return Err(Error::StoreFull { capacity: self.store.capacity() });
        }
        Ok(())
    }

    fn settle_root(&mut self, outcome: Outcome<K, V>) -> Result<()> {
        match outcome {
            Outcome::Unchanged => Ok(()),
            Outcome::Changed => {
                if !self.collapse_root()? {
                    self.store.write(ROOT_PAGE, self.root.page())?;
                }
                Ok(())
            }
            Outcome::Overflow(oversized) => self.grow_root(oversized),
        }
    }

    fn grow_root(&mut self, oversized: Node<K, V>) -> Result<()> {
        let page_size = self.page_size();
        let left = self.store.reserve()?;
        let right = match self.store.reserve() {
            Ok(right) => right,
            Err(e) => {
                self.store.release(left)?;
                return Err(e);
            }
        };
        let split = oversized.split(right, page_size)?;
        self.store.write(left, split.left.page())?;
        self.store.write(right, split.right.page())?;

        let root = Node::Inner(InnerNode::with_children(page_size, left, &split.promoted, right)?);
        self.store.write(ROOT_PAGE, root.page())?;
        self.root = root;
        self.depth += 1;
        debug!(left = %left, right = %right, "tree.grow_root");
        Ok(())
    }

    /// Replace a key-less inner root by its only child
    fn collapse_root(&mut self) -> Result<bool> {
        let child = match self.root.try_replace_empty_element() {
            Some(child) => child,
            None => return Ok(false),
        };
        let node = Node::load(&self.store, child)?;
        self.store.release(child)?;
        self.store.write(ROOT_PAGE, node.page())?;
        self.root = node;
        self.depth -= 1;
        debug!(released = %child, "tree.collapse_root");
        Ok(true)
    }
}
