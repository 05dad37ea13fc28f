//! Test B+Tree deletion behavior

use bplusdb::{MemoryBackend, PageId, TreeBuilder};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[test]
fn test_delete_even_entries() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(256).open_in_memory::<String, Vec<u8>>()?;
    let num_entries = 400;
    for i in 0..num_entries {
        tree.add(&format!("key_{:03}", i), &vec![i as u8; 20])?;
    }

    for i in (0..num_entries).step_by(2) {
        tree.delete(&format!("key_{:03}", i))?;
    }

    tree.validate()?;
    let remaining: Vec<String> = tree.entries()?.into_iter().map(|(k, _)| k).collect();
    let expected: Vec<String> = (1..num_entries).step_by(2).map(|i| format!("key_{:03}", i)).collect();
    assert_eq!(remaining, expected);
    Ok(())
}

#[test]
fn test_root_collapse_releases_page() -> Result<(), Box<dyn std::error::Error>> {
    let backend = MemoryBackend::new();
    let mut tree = TreeBuilder::new().page_size(128).open_backend::<u32, u32, _>(backend.clone())?;
    for key in 0..15u32 {
        tree.add(&key, &key)?;
    }
    assert_eq!(tree.stats()?.depth, 2);
    assert_eq!(tree.store().page_count(), 3);

    // the left leaf underflows and merges with its sibling, leaving the root keyless
    tree.delete(&0)?;
    let stats = tree.stats()?;
    assert_eq!(stats.depth, 1);
    assert_eq!(stats.entries, 14);
    assert_eq!(tree.store().page_count(), 1);
    assert!(tree.store().is_free(PageId(1)));
    assert!(tree.store().is_free(PageId(2)));
    tree.validate()?;

    // growing again reuses the released pages instead of extending the file
    let bytes_before = backend.to_vec().len();
    tree.add(&100, &100)?;
    assert_eq!(tree.stats()?.depth, 2);
    assert_eq!(backend.to_vec().len(), bytes_before);
    assert_eq!(tree.store().next_occupied(PageId(0)), Some(PageId(1)));
    assert_eq!(tree.store().next_occupied(PageId(1)), Some(PageId(2)));
    assert_eq!(tree.store().next_occupied(PageId(2)), None);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_delete_everything() -> Result<(), Box<dyn std::error::Error>> {
    let mut keys: Vec<u32> = (0..5000).collect();
    let mut tree = TreeBuilder::new().open_in_memory::<u32, u32>()?;
    for key in &keys {
        tree.add(key, key)?;
    }
    assert_eq!(tree.stats()?.depth, 2);

    keys.shuffle(&mut StdRng::seed_from_u64(42));
    for (i, key) in keys.iter().enumerate() {
        tree.delete(key)?;
        if i % 500 == 0 {
            tree.validate()?;
        }
    }

    assert!(tree.is_empty()?);
    assert_eq!(tree.stats()?.depth, 1);
    assert_eq!(tree.store().page_count(), 1);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_delete_then_search_missing() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(128).open_in_memory::<u32, u32>()?;
    for key in 0..300u32 {
        tree.add(&key, &key)?;
    }
    for key in (0..300u32).filter(|k| k % 3 == 0) {
        tree.delete(&key)?;
    }
    for key in 0..300u32 {
        assert_eq!(tree.search(&key)?.is_some(), key % 3 != 0);
    }
    tree.validate()?;
    Ok(())
}
