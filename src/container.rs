//! Associative container contract

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::io::IoBackend;
use crate::tree::BPlusTree;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Ordered key/value container with strict add/update semantics
pub trait AssociativeContainer<K, V> {
    /// Insert a new key; [`Error::DuplicateKey`] if present
    fn add(&mut self, key: &K, value: &V) -> Result<()>;

    /// Replace an existing value; [`Error::NotFound`] if absent
    fn update(&mut self, key: &K, value: &V) -> Result<()>;

    /// Remove a key; [`Error::NotFound`] if absent
    fn delete(&mut self, key: &K) -> Result<()>;

    /// Value stored under `key`
    fn search(&self, key: &K) -> Result<Option<V>>;

    /// Visit every record in ascending key order
    fn inspect(&self, f: &mut dyn FnMut(&K, &V)) -> Result<()>;
}

impl<K, V, B> AssociativeContainer<K, V> for BPlusTree<K, V, B>
where
    K: Codec + Ord,
    V: Codec,
    B: IoBackend,
{
    fn add(&mut self, key: &K, value: &V) -> Result<()> {
        BPlusTree::add(self, key, value)
    }

    fn update(&mut self, key: &K, value: &V) -> Result<()> {
        BPlusTree::update(self, key, value)
    }

    fn delete(&mut self, key: &K) -> Result<()> {
        BPlusTree::delete(self, key)
    }

    fn search(&self, key: &K) -> Result<Option<V>> {
        BPlusTree::search(self, key)
    }

    fn inspect(&self, f: &mut dyn FnMut(&K, &V)) -> Result<()> {
        BPlusTree::inspect(self, f)
    }
}

/// In-memory reference container
impl<K: Ord + Clone, V: Clone> AssociativeContainer<K, V> for BTreeMap<K, V> {
    fn add(&mut self, key: &K, value: &V) -> Result<()> {
        match self.entry(key.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(())
            }
        }
    }

    fn update(&mut self, key: &K, value: &V) -> Result<()> {
        match self.get_mut(key) {
            Some(slot) => {
                *slot = value.clone();
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    fn delete(&mut self, key: &K) -> Result<()> {
        self.remove(key).map(|_| ()).ok_or(Error::NotFound)
    }

    fn search(&self, key: &K) -> Result<Option<V>> {
        Ok(self.get(key).cloned())
    }

    fn inspect(&self, f: &mut dyn FnMut(&K, &V)) -> Result<()> {
        for (key, value) in self {
            f(key, value);
        }
        Ok(())
    }
}
