//! Fault reporting for invalid input and damaged storage

use bplusdb::{BPlusTree, Error, PageId, TreeBuilder};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::TempDir;

#[test]
fn test_record_too_large() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(128).open_in_memory::<u32, Vec<u8>>()?;
    tree.add(&1, &vec![0u8; 10])?;

    let result = tree.add(&2, &vec![0u8; 60]);
    assert!(matches!(result, Err(Error::RecordTooLarge { size: 68, max: 58 })));
    let result = tree.update(&1, &vec![0u8; 60]);
    assert!(matches!(result, Err(Error::RecordTooLarge { .. })));

    assert_eq!(tree.search(&1)?, Some(vec![0u8; 10]));
    assert_eq!(tree.len()?, 1);
    Ok(())
}

#[test]
fn test_key_too_large_for_separator() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TreeBuilder::new().page_size(128).open_in_memory::<String, u8>()?;
    // 55 byte key plus a 1 byte value fits a record, but not a separator
    let key = "k".repeat(51);
    let result = tree.add(&key, &1);
    assert!(matches!(result, Err(Error::RecordTooLarge { size: 59, max: 58 })));
    Ok(())
}

#[test]
fn test_invalid_page_size() {
    let too_small = TreeBuilder::new().page_size(32).open_in_memory::<u32, u32>();
    assert!(matches!(too_small, Err(Error::InvalidParameter(_))));

    let too_large = TreeBuilder::new().page_size(4 << 20).open_in_memory::<u32, u32>();
    assert!(matches!(too_large, Err(Error::InvalidParameter(_))));
}

#[test]
fn test_unknown_node_tag() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tree.db");
    {
        let mut tree: BPlusTree<u32, u32> = TreeBuilder::new().page_size(128).open(&path)?;
        tree.add(&1, &1)?;
    }

    // the root lives in physical page 1, right after the bitmap
    let mut file = OpenOptions::new().write(true).open(&path)?;
    file.seek(SeekFrom::Start(128))?;
    file.write_all(&[0x7F, 0, 0, 0])?;
    drop(file);

    let result = TreeBuilder::new().page_size(128).open::<u32, u32>(&path);
    assert!(matches!(result, Err(Error::CorruptPage { page_id: Some(PageId(0)), .. })));
    Ok(())
}

#[test]
fn test_error_display() {
    assert_eq!(Error::DuplicateKey.to_string(), "Duplicate key");
    assert_eq!(Error::NotFound.to_string(), "Key not found");
    let err = Error::RecordTooLarge { size: 70, max: 58 };
    assert_eq!(err.to_string(), "Record too large: 70 bytes, max is 58 bytes");
}

#[test]
fn test_store_full_leaves_tree_consistent() -> Result<(), Box<dyn std::error::Error>> {
    // a 64 byte bitmap tracks 512 pages
    let mut tree = TreeBuilder::new().page_size(64).open_in_memory::<u32, u32>()?;

    let mut inserted = 0u32;
    loop {
        match tree.add(&inserted, &inserted) {
            Ok(()) => inserted += 1,
            Err(Error::StoreFull { capacity }) => {
                assert_eq!(capacity, 512);
                break;
            }
            Err(e) => return Err(e.into()),
        }
        assert!(inserted < 10_000, "store never filled up");
    }

    assert!(tree.store().page_count() <= 512);
    assert_eq!(tree.len()?, inserted as usize);
    tree.validate()?;
    assert!(matches!(tree.update(&0, &1), Err(Error::StoreFull { .. })));
    assert_eq!(tree.search(&0)?, Some(0));

    for key in 0..1000u32 {
        tree.delete(&key)?;
    }
    tree.validate()?;
    tree.add(&0, &0)?;
    assert_eq!(tree.len()?, inserted as usize - 999);
    Ok(())
}
