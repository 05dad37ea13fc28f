//! Free page tracking, allocation and reuse

use bplusdb::io::FileBackend;
use bplusdb::page::Page;
use bplusdb::store::PageStore;
use bplusdb::{BPlusTree, Error, PageId, Result, TreeBuilder};
use tempfile::TempDir;

fn filled(byte: u8) -> Page {
    Page::from_bytes(&[byte; 64])
}

fn open_store(path: &std::path::Path, runs: &mut u32) -> Result<PageStore<FileBackend>> {
    PageStore::open(FileBackend::open(path)?, 64, |store| {
        *runs += 1;
        store.append(&filled(0xEE)).map(|_| ())
    })
}

#[test]
fn test_released_page_is_reused_and_persisted() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("pages.db");
    let mut runs = 0;

    {
        let mut store = open_store(&path, &mut runs)?;
        assert_eq!(store.page_count(), 1);
        store.release(PageId(0))?;
        assert_eq!(store.page_count(), 0);

        assert_eq!(store.append(&filled(1))?, PageId(0));
        assert_eq!(store.append(&filled(2))?, PageId(1));
        store.sync()?;
    }

    let store = open_store(&path, &mut runs)?;
    assert_eq!(runs, 1, "initializer only runs on creation");
    assert_eq!(store.read(PageId(0))?, filled(1));
    assert_eq!(store.read(PageId(1))?, filled(2));
    assert_eq!(store.first_occupied(), Some(PageId(0)));
    Ok(())
}

#[test]
fn test_released_page_access_fails_loudly() -> Result<()> {
    let dir = TempDir::new()?;
    let mut runs = 0;
    let mut store = open_store(&dir.path().join("pages.db"), &mut runs)?;
    let pos = store.append(&filled(3))?;
    store.release(pos)?;

    let mut page = Page::new(64);
    assert!(matches!(store.read_into(pos, &mut page), Err(Error::CorruptPage { .. })));
    assert!(matches!(store.write(pos, &filled(4)), Err(Error::CorruptPage { .. })));
    Ok(())
}

#[test]
fn test_tree_reuses_pages_after_deletes() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tree.db");
    let mut tree: BPlusTree<u32, Vec<u8>> = TreeBuilder::new().page_size(256).open(&path)?;

    for key in 0..500u32 {
        tree.add(&key, &vec![key as u8; 30])?;
    }
    let peak_pages = tree.store().page_count();
    let file_len = std::fs::metadata(&path)?.len();

    for key in 0..500u32 {
        tree.delete(&key)?;
    }
    assert_eq!(tree.store().page_count(), 1);

    for key in 0..500u32 {
        tree.add(&key, &vec![key as u8; 30])?;
    }
    assert_eq!(tree.store().page_count(), peak_pages);
    assert_eq!(std::fs::metadata(&path)?.len(), file_len);
    tree.validate()?;
    Ok(())
}
