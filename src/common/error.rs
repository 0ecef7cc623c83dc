//! Error types for pagepool.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagepool.
///
/// Every variant is recoverable: the buffer pool reports it to the caller and
/// leaves its own bookkeeping unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page store has no page with this ID (never allocated, or deallocated).
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// The page is not currently held in any buffer pool frame.
    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is the `INVALID` sentinel.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Attempted to unpin a page whose pin count is already zero.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// Attempted to delete a page that still has active pins.
    #[error("Page {0} is still pinned")]
    PagePinned(u32),

    /// A buffer pool configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "Page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::PagePinned(7);
        assert_eq!(format!("{}", err), "Page 7 is still pinned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_pool_errors_have_no_source() {
        let err = Error::PageNotResident(3);
        assert!(std::error::Error::source(&err).is_none());
    }
}
