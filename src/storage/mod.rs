//! Storage layer - the durable side of the buffer pool.
//!
//! The buffer pool never touches files directly. It talks to a [`PageStore`],
//! which reads and writes whole pages by ID and hands out page IDs.
//!
//! - [`DiskManager`] - File-backed store, one page per `PAGE_SIZE` slot
//! - [`MemoryStore`] - Volatile store for tests and scratch pools
//! - [`LogManager`] - Optional write-ahead-log hook consulted before write-back
//! - [`page`] - The page buffer type

mod disk_manager;
mod log_manager;
mod memory_store;
pub mod page;

pub use disk_manager::DiskManager;
pub use log_manager::LogManager;
pub use memory_store::MemoryStore;

use crate::common::{PageId, Result};
use page::Page;

/// Durable page storage consumed by the buffer pool.
///
/// Implementations need not be thread-safe beyond `Send`: the
/// [`BufferPoolManager`](crate::buffer::BufferPoolManager) serializes every
/// call under its pool latch.
pub trait PageStore: Send {
    /// Fill `page` with the durable bytes of `page_id`.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the ID was never allocated or was deallocated.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` as the durable bytes of `page_id`.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the ID was never allocated or was deallocated.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Reserve a fresh page ID. The page reads back as all zeros.
    fn allocate_page(&mut self) -> Result<PageId>;

    /// Release a page ID so it may be handed out again.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;
}
