//! Error types for bplusdb

use std::borrow::Cow;
use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for bplusdb operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(String),

    /// Key is already present in the container
    #[error("Duplicate key")]
    DuplicateKey,

    /// Key is not present in the container
    #[error("Key not found")]
    NotFound,

    /// A page could not be interpreted, or a released page was accessed
    #[error("Corrupt page: {details}")]
    CorruptPage {
        /// Description of the corruption
        details: Cow<'static, str>,
        /// Logical page where corruption was detected
        page_id: Option<PageId>,
    },

    /// Position beyond the end of the page file or store
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decoding(Cow<'static, str>),

    /// Record can never fit into a node
    #[error("Record too large: {size} bytes, max is {max} bytes")]
    RecordTooLarge {
        /// Encoded size of the offending record
        size: usize,
        /// Largest size accepted for the configured page size
        max: usize,
    },

    /// The free page bitmap cannot track more pages
    #[error("Store full: at most {capacity} pages can be tracked")]
    StoreFull {
        /// Number of logical pages the bitmap can address
        capacity: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

impl Error {
    pub(crate) fn corrupt(details: impl Into<Cow<'static, str>>, page_id: Option<PageId>) -> Self {
        Error::CorruptPage { details: details.into(), page_id }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Logical page number inside the recycling store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u32);

impl PageId {
    /// Decode an on-page pointer; negative values mean "no page"
    pub fn from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(PageId)
    }

    /// Encode as an on-page pointer
    pub fn to_raw(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result type alias for bplusdb operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_raw_pointer() {
        assert_eq!(PageId::from_raw(-1), None);
        assert_eq!(PageId::from_raw(7), Some(PageId(7)));
        assert_eq!(PageId(42).to_raw(), 42);
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(matches!(err, Error::Io(ref msg) if msg.contains("short read")));
    }
}
