//! Node protocol shared by inner and leaf pages
//!
//! A [`Node`] is an in-memory copy of exactly one page. Children are only
//! referenced by logical page number and materialized on demand through
//! [`Node::load`], so at most one root plus the transient nodes along the
//! current path are ever alive.

use crate::codec::Codec;
use crate::error::{Error, PageId, Result};
use crate::inner::InnerNode;
use crate::io::IoBackend;
use crate::leaf::LeafNode;
use crate::page::{Page, INNER_TAG, LEAF_TAG};
use crate::store::PageStore;
use std::fmt::Debug;
use std::io::Write;

/// Load factor below which a non-root node is rebalanced
pub const UNDERFLOW_THRESHOLD: usize = 50;

/// A B+ tree node: one page viewed as either variant
#[derive(Debug, Clone)]
pub enum Node<K, V> {
    /// Routing node holding keys and child pointers
    Inner(InnerNode<K, V>),
    /// Terminal node holding records
    Leaf(LeafNode<K, V>),
}

/// What a mutating operation did to the node it was called on
#[derive(Debug)]
#[must_use]
pub enum Outcome<K, V> {
    /// The node's own page is unchanged
    Unchanged,
    /// The node's own page changed and must be persisted by the caller
    Changed,
    /// The node outgrew its page; the oversized copy must be split by the caller
    Overflow(Node<K, V>),
}

/// Two right-sized halves of a split node and the key separating them
#[derive(Debug)]
pub struct Split<K, V> {
    /// Half holding the smaller keys, written back to the original position
    pub left: Node<K, V>,
    /// Half holding the larger keys
    pub right: Node<K, V>,
    /// Key to insert into the parent with a pointer to `right`
    pub promoted: K,
}

fn mismatched() -> Error {
    Error::corrupt("sibling nodes of different kinds", None)
}

impl<K: Codec + Ord, V: Codec> Node<K, V> {
    /// Build the variant matching the page's type tag
    pub fn from_page(page: Page) -> Result<Self> {
        match page.tag() {
            LEAF_TAG => LeafNode::from_page(page).map(Node::Leaf),
            INNER_TAG => InnerNode::from_page(page).map(Node::Inner),
            tag => Err(Error::corrupt(format!("unknown node tag {}", tag), None)),
        }
    }

    /// Read logical page `pos` and build its node
    pub fn load<B: IoBackend>(store: &PageStore<B>, pos: PageId) -> Result<Self> {
        Self::from_page(store.read(pos)?).map_err(|err| match err {
            Error::CorruptPage { details, page_id: None } => {
                Error::CorruptPage { details, page_id: Some(pos) }
            }
            other => other,
        })
    }

    /// An empty leaf, the root of a fresh tree
    pub fn empty_leaf(page_size: usize) -> Self {
        Node::Leaf(LeafNode::new(page_size))
    }

    /// The page this node views
    pub fn page(&self) -> &Page {
        match self {
            Node::Inner(inner) => inner.page(),
            Node::Leaf(leaf) => leaf.page(),
        }
    }

    /// Whether this is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Percentage of the record area in use
    pub fn load_factor(&self) -> usize {
        match self {
            Node::Inner(inner) => inner.load_factor(),
            Node::Leaf(leaf) => leaf.load_factor(),
        }
    }

    /// Value stored under `key` in this subtree
    pub fn search<B: IoBackend>(&self, store: &PageStore<B>, key: &K) -> Result<Option<V>> {
        match self {
            Node::Inner(inner) => inner.search(store, key),
            Node::Leaf(leaf) => leaf.search(key),
        }
    }

    /// Insert a new record into this subtree
    pub fn insert<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        key: &K,
        value: &V,
    ) -> Result<Outcome<K, V>> {
        match self {
            Node::Inner(inner) => inner.insert(store, key, value),
            Node::Leaf(leaf) => leaf.insert(key, value),
        }
    }

    /// Replace the value of an existing record in this subtree
    pub fn update<B: IoBackend>(
        &mut self,
        store: &mut PageStore<B>,
        key: &K,
        value: &V,
    ) -> Result<Outcome<K, V>> {
        match self {
            Node::Inner(inner) => inner.update(store, key, value),
            Node::Leaf(leaf) => leaf.update(key, value),
        }
    }

    /// Remove a record from this subtree
    pub fn delete<B: IoBackend>(&mut self, store: &mut PageStore<B>, key: &K) -> Result<Outcome<K, V>> {
        match self {
            Node::Inner(inner) => inner.delete(store, key),
            Node::Leaf(leaf) => leaf.delete(key),
        }
    }

    /// Split into two pages of `page_size`; `right_pos` is where the right half will live
    pub fn split(&self, right_pos: PageId, page_size: usize) -> Result<Split<K, V>> {
        match self {
            Node::Inner(inner) => inner.split(page_size),
            Node::Leaf(leaf) => leaf.split(right_pos, page_size),
        }
    }

    /// Combine two adjacent siblings into one page, if they fit
    pub fn try_merge(left: &Self, right: &Self, middle: &K, page_size: usize) -> Result<Option<Self>> {
        match (left, right) {
            (Node::Leaf(l), Node::Leaf(r)) => Ok(LeafNode::try_merge(l, r, page_size)?.map(Node::Leaf)),
            (Node::Inner(l), Node::Inner(r)) => {
                Ok(InnerNode::try_merge(l, r, middle, page_size)?.map(Node::Inner))
            }
            _ => Err(mismatched()),
        }
    }

    /// Redistribute two adjacent siblings so both end up at least half full
    pub fn try_balance(left: &Self, right: &Self, middle: &K, page_size: usize) -> Result<Option<Split<K, V>>> {
        match (left, right) {
            (Node::Leaf(l), Node::Leaf(r)) => LeafNode::try_balance(l, r, page_size),
            (Node::Inner(l), Node::Inner(r)) => InnerNode::try_balance(l, r, middle, page_size),
            _ => Err(mismatched()),
        }
    }

    /// The only child of a key-less inner node
    pub fn try_replace_empty_element(&self) -> Option<PageId> {
        match self {
            Node::Inner(inner) => inner.try_replace_empty_element(),
            Node::Leaf(_) => None,
        }
    }

    /// Call `f` on every record of this subtree in ascending key order
    pub fn visit<B, F>(&self, store: &PageStore<B>, f: &mut F) -> Result<()>
    where
        B: IoBackend,
        F: FnMut(&K, &V),
    {
        match self {
            Node::Leaf(leaf) => {
                for record in leaf.records().iter() {
                    let (key, value) = record?;
                    f(&key, &value);
                }
            }
            Node::Inner(inner) => {
                for child in inner.children()? {
                    Self::load(store, child)?.visit(store, f)?;
                }
            }
        }
        Ok(())
    }

    /// Write an indented description of this subtree
    pub fn dump<B, W>(&self, store: &PageStore<B>, out: &mut W, depth: usize) -> Result<()>
    where
        B: IoBackend,
        W: Write,
        K: Debug,
        V: Debug,
    {
        let indent = "  ".repeat(depth);
        match self {
            Node::Leaf(leaf) => {
                let next = leaf.next().map_or_else(|| "-".to_string(), |p| p.to_string());
                writeln!(out, "{}LEAF ({}%) next: {}", indent, leaf.load_factor(), next)?;
                for record in leaf.records().iter() {
                    let (key, value) = record?;
                    writeln!(out, "{}  {:?} => {:?}", indent, key, value)?;
                }
            }
            Node::Inner(inner) => {
                writeln!(out, "{}INNER ({}%)", indent, inner.load_factor())?;
                Self::load(store, inner.leftmost())?.dump(store, out, depth + 1)?;
                for (key, child) in inner.entries()? {
                    writeln!(out, "{}  key {:?}", indent, key)?;
                    Self::load(store, child)?.dump(store, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}
