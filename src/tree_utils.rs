//! Tree traversal utilities for statistics and structural checks

use crate::codec::Codec;
use crate::error::{Error, PageId, Result};
use crate::io::IoBackend;
use crate::node::Node;
use crate::store::PageStore;
use crate::tree::ROOT_PAGE;
use std::collections::HashSet;

/// Shape and fill of a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels, 1 for a lone leaf root
    pub depth: usize,
    /// Inner nodes, root included
    pub inner_nodes: usize,
    /// Leaf nodes, root included
    pub leaf_nodes: usize,
    /// Records stored in leaves
    pub entries: usize,
    /// Lowest load factor among nodes other than the root
    pub min_non_root_load_factor: Option<usize>,
}

/// Depth-first pre-order walk, children left to right
fn walk<K, V, B, F>(store: &PageStore<B>, node: &Node<K, V>, pos: PageId, level: usize, f: &mut F) -> Result<()>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
    F: FnMut(PageId, &Node<K, V>, usize) -> Result<()>,
{
    f(pos, node, level)?;
    if let Node::Inner(inner) = node {
        for child in inner.children()? {
            let child_node = Node::<K, V>::load(store, child)?;
            walk(store, &child_node, child, level + 1, f)?;
        }
    }
    Ok(())
}

/// Every page reachable from the root, in pre-order
pub fn collect_tree_pages<K, V, B>(store: &PageStore<B>, root: &Node<K, V>) -> Result<Vec<PageId>>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
{
    let mut pages = Vec::new();
    walk(store, root, ROOT_PAGE, 0, &mut |pos, _, _| {
        pages.push(pos);
        Ok(())
    })?;
    Ok(pages)
}

/// Gather [`TreeStats`]
pub fn collect_stats<K, V, B>(store: &PageStore<B>, root: &Node<K, V>) -> Result<TreeStats>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
{
    let mut stats = TreeStats::default();
    walk(store, root, ROOT_PAGE, 0, &mut |pos, node, level| {
        stats.depth = stats.depth.max(level + 1);
        match node {
            Node::Inner(_) => stats.inner_nodes += 1,
            Node::Leaf(leaf) => {
                stats.leaf_nodes += 1;
                stats.entries += leaf.records().len()?;
            }
        }
        if pos != ROOT_PAGE {
            let lf = node.load_factor();
            stats.min_non_root_load_factor =
                Some(stats.min_non_root_load_factor.map_or(lf, |min| min.min(lf)));
        }
        Ok(())
    })?;
    Ok(stats)
}

struct Validation {
    seen: HashSet<PageId>,
    leaf_level: Option<usize>,
    leaves: Vec<(PageId, Option<PageId>)>,
}

fn check_bounds<K: Ord>(key: &K, lo: Option<&K>, hi: Option<&K>) -> bool {
    lo.map_or(true, |lo| key >= lo) && hi.map_or(true, |hi| key < hi)
}

fn check_node<K, V, B>(
    store: &PageStore<B>,
    node: &Node<K, V>,
    pos: PageId,
    level: usize,
    lo: Option<&K>,
    hi: Option<&K>,
    state: &mut Validation,
) -> Result<()>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
{
    if !state.seen.insert(pos) {
        return Err(Error::corrupt("page reachable twice", Some(pos)));
    }

    match node {
        Node::Leaf(leaf) => {
            match state.leaf_level {
                Some(expected) if expected != level => {
                    return Err(Error::corrupt(
                        format!("leaf at level {}, expected {}", level, expected),
                        Some(pos),
                    ));
                }
                _ => state.leaf_level = Some(level),
            }

            let mut previous: Option<K> = None;
            for record in leaf.records().iter() {
                let (key, _) = record?;
                if previous.as_ref().map_or(false, |p| *p >= key) {
                    return Err(Error::corrupt("leaf keys out of order", Some(pos)));
                }
                if !check_bounds(&key, lo, hi) {
                    return Err(Error::corrupt("leaf key outside parent bounds", Some(pos)));
                }
                previous = Some(key);
            }
            state.leaves.push((pos, leaf.next()));
        }
        Node::Inner(inner) => {
            let entries = inner.entries()?;
            if entries.is_empty() && pos == ROOT_PAGE {
                return Err(Error::corrupt("inner root without keys", Some(pos)));
            }
            for (i, (key, _)) in entries.iter().enumerate() {
                if i > 0 && entries[i - 1].0 >= *key {
                    return Err(Error::corrupt("inner keys out of order", Some(pos)));
                }
                if !check_bounds(key, lo, hi) {
                    return Err(Error::corrupt("inner key outside parent bounds", Some(pos)));
                }
            }

            let children = inner.children()?;
            for (i, child) in children.iter().enumerate() {
                let child_lo = if i == 0 { lo } else { Some(&entries[i - 1].0) };
                let child_hi = entries.get(i).map(|(key, _)| key).or(hi);
                let child_node = Node::<K, V>::load(store, *child)?;
                check_node(store, &child_node, *child, level + 1, child_lo, child_hi, state)?;
            }
        }
    }
    Ok(())
}

/// Check key order, separator bounds, uniform leaf depth, the leaf sibling
/// chain, and that every occupied store page is reachable from the root
pub fn validate_tree<K, V, B>(store: &PageStore<B>, root: &Node<K, V>) -> Result<()>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
{
    let mut state = Validation { seen: HashSet::new(), leaf_level: None, leaves: Vec::new() };
    check_node(store, root, ROOT_PAGE, 0, None, None, &mut state)?;

    for pair in state.leaves.windows(2) {
        let (pos, next) = pair[0];
        if next != Some(pair[1].0) {
            return Err(Error::corrupt(
                format!("leaf sibling pointer {:?}, expected {}", next, pair[1].0),
                Some(pos),
            ));
        }
    }
    if let Some((pos, Some(next))) = state.leaves.last() {
        return Err(Error::corrupt(format!("last leaf points to {}", next), Some(*pos)));
    }

    let occupied = store.page_count() as usize;
    if occupied != state.seen.len() {
        return Err(Error::corrupt(
            format!("{} pages occupied but {} reachable", occupied, state.seen.len()),
            None,
        ));
    }
    Ok(())
}
