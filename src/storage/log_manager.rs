//! Write-ahead-log hook.

use crate::common::Result;

/// A write-ahead log the buffer pool must flush before writing back a dirty
/// page.
///
/// The buffer pool holds an `Option<Arc<dyn LogManager>>`. With no log
/// manager installed, write-back goes straight to the page store.
pub trait LogManager: Send + Sync {
    /// Force every buffered log record to durable storage.
    fn flush(&self) -> Result<()>;
}
