//! pagepool - A buffer pool page cache for disk-backed storage engines.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           pagepool                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │      BufferPoolManager + Frame + Guards + Statistics     │   │
//! │  │   ┌──────────────────────┐  ┌───────────────────────┐   │   │
//! │  │   │ Page table (hash/)   │  │ Replacer: LRU | FIFO  │   │   │
//! │  │   │ ExtendibleHashTable  │  │                       │   │   │
//! │  │   └──────────────────────┘  └───────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │      PageStore: DiskManager | MemoryStore + Page         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`hash`] - Extendible hash table used as the page table
//! - [`storage`] - Page stores and the page type
//!
//! # Quick Start
//! ```no_run
//! use pagepool::{BufferPoolManager, DiskManager};
//!
//! let dm = DiskManager::open_or_create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, dm);
//!
//! let page_id = {
//!     let mut guard = bpm.new_page_write().unwrap();
//!     guard.as_mut_slice()[..5].copy_from_slice(b"hello");
//!     guard.page_id()
//! };
//!
//! bpm.flush_all_pages().unwrap();
//! assert_eq!(&bpm.fetch_page_read(page_id).unwrap().as_slice()[..5], b"hello");
//! ```

pub mod buffer;
pub mod common;
pub mod hash;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{BufferPoolConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::replacer::ReplacerKind;
pub use buffer::{
    BufferPoolManager, BufferPoolStats, Frame, PageReadGuard, PageWriteGuard, StatsSnapshot,
};
pub use storage::page::Page;
pub use storage::{DiskManager, LogManager, MemoryStore, PageStore};
