//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (unpins as dirty)
//!
//! Both guards unpin the page when dropped, after releasing the page lock.

use std::ops::{Deref, DerefMut};

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool_manager::BufferPoolManager;
use crate::common::PageId;
use crate::storage::page::Page;
use crate::storage::PageStore;

/// One pin on a page, released on drop.
///
/// Guards declare this after their lock field: fields drop in declaration
/// order, so the page lock is gone before the pool latch is taken.
struct PagePin<'a, S: PageStore> {
    bpm: &'a BufferPoolManager<S>,
    page_id: PageId,
    is_dirty: bool,
}

impl<S: PageStore> Drop for PagePin<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.bpm.unpin_page(self.page_id, self.is_dirty) {
            warn!("guard for {} failed to unpin: {}", self.page_id, e);
        }
    }
}

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned (clean) when the guard is dropped.
///
/// # Example
/// ```
/// use pagepool::{BufferPoolManager, MemoryStore};
///
/// let bpm = BufferPoolManager::new(4, MemoryStore::new());
/// let page_id = bpm.new_page_write().unwrap().page_id();
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert!(guard.is_zeroed());
/// drop(guard);
/// assert_eq!(bpm.pin_count(page_id), Some(0));
/// ```
pub struct PageReadGuard<'a, S: PageStore> {
    lock: RwLockReadGuard<'a, Page>,
    pin: PagePin<'a, S>,
}

impl<'a, S: PageStore> PageReadGuard<'a, S> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager<S>,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            lock,
            pin: PagePin {
                bpm,
                page_id,
                is_dirty: false,
            },
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl<S: PageStore> Deref for PageReadGuard<'_, S> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time.
/// The page is unpinned and marked dirty when the guard is dropped.
///
/// # Example
/// ```
/// use pagepool::{BufferPoolManager, MemoryStore};
///
/// let bpm = BufferPoolManager::new(4, MemoryStore::new());
///
/// let mut guard = bpm.new_page_write().unwrap();
/// guard.as_mut_slice()[0] = 0xFF;
/// let page_id = guard.page_id();
/// drop(guard);
///
/// assert_eq!(bpm.is_dirty(page_id), Some(true));
/// ```
pub struct PageWriteGuard<'a, S: PageStore> {
    lock: RwLockWriteGuard<'a, Page>,
    pin: PagePin<'a, S>,
}

impl<'a, S: PageStore> PageWriteGuard<'a, S> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager<S>,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            lock,
            pin: PagePin {
                bpm,
                page_id,
                is_dirty: true,
            },
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl<S: PageStore> Deref for PageWriteGuard<'_, S> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl<S: PageStore> DerefMut for PageWriteGuard<'_, S> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
