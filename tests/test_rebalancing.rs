//! Load factor floor after deletes
//!
//! u64 keys and values make 16 byte records, so a 4096 byte leaf splits
//! into two halves of 128 records. With at most two levels every underflow
//! is then resolved by a balance or a merge; deeper trees may keep inner
//! nodes below half full when neither fits.

use bplusdb::{BPlusTree, MemoryBackend, TreeBuilder};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn assert_floor(tree: &BPlusTree<u64, u64, MemoryBackend>) -> Result<(), Box<dyn std::error::Error>> {
    let stats = tree.stats()?;
    assert!(stats.depth <= 2, "depth {}", stats.depth);
    if let Some(min) = stats.min_non_root_load_factor {
        assert!(min >= 50, "non-root load factor {}", min);
    }
    Ok(())
}

#[test]
fn test_load_factor_floor_after_deletes() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut keys: Vec<u64> = (0..20_000).map(|k| k * 7).collect();
    keys.shuffle(&mut rng);

    let mut tree = TreeBuilder::new().open_in_memory::<u64, u64>()?;
    for key in &keys {
        tree.add(key, &(key ^ 0xFF))?;
    }
    assert_eq!(tree.stats()?.depth, 2);
    assert_floor(&tree)?;

    keys.shuffle(&mut rng);
    let (deleted, kept) = keys.split_at(12_000);
    for (i, key) in deleted.iter().enumerate() {
        tree.delete(key)?;
        if i % 1000 == 0 {
            assert_floor(&tree)?;
        }
    }

    assert_floor(&tree)?;
    tree.validate()?;
    for key in kept {
        assert_eq!(tree.search(key)?, Some(key ^ 0xFF));
    }
    for key in deleted.iter().take(500) {
        assert_eq!(tree.search(key)?, None);
    }
    Ok(())
}

#[test]
fn test_shrinking_updates_rebalance() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(512).open_in_memory::<u32, Vec<u8>>()?;
    for key in 0..400u32 {
        tree.add(&key, &vec![1u8; 100])?;
    }
    let before = tree.stats()?;

    for key in 0..400u32 {
        tree.update(&key, &vec![2u8; 4])?;
    }
    let after = tree.stats()?;
    assert!(after.leaf_nodes < before.leaf_nodes, "{:?} -> {:?}", before, after);
    tree.validate()?;
    assert!(tree.entries()?.iter().all(|(_, v)| v == &vec![2u8; 4]));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_floor_holds_for_random_deletes(
        keys in proptest::collection::hash_set(any::<u64>(), 600..1500),
        mask in proptest::collection::vec(any::<bool>(), 1500),
    ) {
        let mut tree = TreeBuilder::new().open_in_memory::<u64, u64>().unwrap();
        let keys: Vec<u64> = keys.into_iter().collect();
        for key in &keys {
            tree.add(key, key).unwrap();
        }

        let mut expected = Vec::new();
        for (key, delete) in keys.iter().zip(&mask) {
            if *delete {
                tree.delete(key).unwrap();
            } else {
                expected.push(*key);
            }
        }
        expected.sort_unstable();

        let stats = tree.stats().unwrap();
        prop_assert!(stats.depth <= 2);
        if let Some(min) = stats.min_non_root_load_factor {
            prop_assert!(min >= 50, "non-root load factor {}", min);
        }
        let found: Vec<u64> = tree.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(found, expected);
        prop_assert!(tree.validate().is_ok());
    }

    #[test]
    fn prop_traversal_sorted_and_unique(keys in proptest::collection::vec(any::<u16>(), 0..400)) {
        let mut tree = TreeBuilder::new().page_size(128).open_in_memory::<u16, u32>().unwrap();
        let mut model = std::collections::BTreeSet::new();
        for key in &keys {
            let result = tree.add(key, &(*key as u32));
            prop_assert_eq!(result.is_ok(), model.insert(*key));
        }

        let found: Vec<u16> = tree.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(found, model.into_iter().collect::<Vec<_>>());
        prop_assert!(tree.validate().is_ok());
    }
}
