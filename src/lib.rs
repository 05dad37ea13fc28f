//! Persistent page-organized B+ tree
//!
//! This crate provides an ordered key/value store kept in fixed-size pages.
//! Pages released by merges and root collapses are recycled through a free
//! page bitmap before the underlying file grows.
//!
//! ```no_run
//! use bplusdb::TreeBuilder;
//!
//! # fn main() -> bplusdb::Result<()> {
//! let mut tree = TreeBuilder::new().page_size(4096).open::<u64, String>("data.db")?;
//! tree.add(&1, &"one".to_string())?;
//! assert_eq!(tree.search(&1)?, Some("one".to_string()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod page;
pub mod codec;
pub mod io;
pub mod file;
pub mod freemap;
pub mod store;
pub mod records;
pub mod leaf;
pub mod inner;
pub mod node;
pub mod tree;
pub mod tree_utils;
pub mod container;


// Re-exports
pub use codec::Codec;
pub use container::AssociativeContainer;
pub use error::{Error, PageId, Result};
pub use io::{FileBackend, IoBackend, MemoryBackend};
pub use store::IoStats;
pub use tree::{BPlusTree, TreeBuilder};
pub use tree_utils::TreeStats;

/// The default page size (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;
