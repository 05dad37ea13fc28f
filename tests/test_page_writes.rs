//! Page write accounting: a node is persisted only by the level above it

use bplusdb::TreeBuilder;

// u32 keys and values make 8 byte records; a 128 byte page holds 14
const PAGE: usize = 128;

#[test]
fn test_insert_into_root_leaf() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(PAGE).open_in_memory::<u32, u32>()?;

    for key in 0..14u32 {
        tree.reset_io_stats();
        tree.add(&key, &key)?;
        let stats = tree.io_stats();
        assert_eq!(stats.page_writes, 1);
        assert_eq!(stats.allocations, 0);
    }

    // the fifteenth record overflows the root leaf
    tree.reset_io_stats();
    tree.add(&14, &14)?;
    let stats = tree.io_stats();
    assert_eq!(stats.allocations, 2);
    assert_eq!(stats.page_writes, 3);
    assert_eq!(tree.stats()?.depth, 2);
    Ok(())
}

#[test]
fn test_pure_insert_and_leaf_split() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(PAGE).open_in_memory::<u32, u32>()?;
    for key in 0..15u32 {
        tree.add(&key, &key)?;
    }
    // right leaf holds 8..=14

    tree.reset_io_stats();
    tree.add(&100, &0)?;
    let stats = tree.io_stats();
    assert_eq!(stats.page_writes, 1, "only the leaf is rewritten");
    assert_eq!(stats.allocations, 0);

    for key in 101..107u32 {
        tree.add(&key, &0)?;
    }

    tree.reset_io_stats();
    tree.add(&107, &0)?;
    let stats = tree.io_stats();
    assert_eq!(stats.page_writes, 3, "both halves and the parent are rewritten");
    assert_eq!(stats.allocations, 1);
    assert_eq!(stats.bitmap_writes, 1);
    assert_eq!(tree.stats()?.depth, 2);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_cascading_split_at_root() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(PAGE).open_in_memory::<u32, u32>()?;
    for key in 0..15u32 {
        tree.add(&key, &key)?;
    }

    let mut key = 15u32;
    let mut leaf_splits = 0;
    loop {
        tree.reset_io_stats();
        tree.add(&key, &key)?;
        key += 1;

        let stats = tree.io_stats();
        let depth = tree.stats()?.depth;
        if depth == 3 {
            // leaf split, then the root splits into two fresh pages
            assert_eq!(stats.page_writes, 5);
            assert_eq!(stats.allocations, 3);
            break;
        }
        match stats.allocations {
            0 => assert_eq!(stats.page_writes, 1),
            1 => {
                assert_eq!(stats.page_writes, 3);
                leaf_splits += 1;
            }
            n => panic!("unexpected {} allocations at depth {}", n, depth),
        }
        assert!(key < 1000, "root never split");
    }

    // the root had room for 14 separators before overflowing
    assert_eq!(leaf_splits, 13);
    tree.validate()?;
    Ok(())
}
