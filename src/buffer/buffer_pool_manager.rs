//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between a [`PageStore`] and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and on flush
//! - Pluggable eviction policies

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::buffer::replacer::Replacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, FrameId, PageId, Result};
use crate::hash::{BuildIdentityHasher, ExtendibleHashTable};
use crate::storage::page::Page;
use crate::storage::{DiskManager, LogManager, PageStore};

/// State guarded by the pool latch.
struct PoolState {
    /// Frames holding no page, taken from the front.
    free_list: VecDeque<FrameId>,
}

/// Manages a pool of buffer frames for caching pages.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  ┌────────────────────┐  ┌──────────────────────────────┐    │
/// │  │ page_table         │  │      frames: Vec<Frame>      │    │
/// │  │ ExtendibleHash     │─▶│ [Frame0] [Frame1] [Frame2].. │    │
/// │  │ PageId → FrameId   │  └──────────────────────────────┘    │
/// │  └────────────────────┘                                      │
/// │  ┌─ latch: Mutex ──────┐ ┌─ store: Mutex ──┐ ┌────────────┐  │
/// │  │ free_list: VecDeque │ │ S: PageStore    │ │  replacer  │  │
/// │  └─────────────────────┘ └─────────────────┘ └────────────┘  │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// Every frame is in exactly one of three states: on the free list, resident
/// and pinned, or resident, unpinned and tracked by the replacer.
///
/// # Thread Safety
/// Every operation that changes frame bookkeeping holds the pool latch while
/// it does so. The page table and the replacer carry their own locks and are
/// always taken after the latch.
///
/// Lock order is latch, then a page lock, then the store. Under the latch a
/// page lock is only taken on a frame nobody else can hold it on: a free
/// frame or an unpinned victim. Flushing pins the frame, releases the latch
/// and only then waits for the page lock, so a thread holding a write guard
/// can always call back into the pool.
///
/// # Frame references
/// `fetch_page` and `new_page` return `&Frame` with one pin taken for the
/// caller, who must release it with `unpin_page`. The reference stays
/// memory-safe after that, but the frame may by then hold another page.
/// The guard API (`fetch_page_read`, `fetch_page_write`, `new_page_write`)
/// does the unpinning automatically.
///
/// # Usage
/// ```
/// use pagepool::{BufferPoolManager, MemoryStore};
///
/// let bpm = BufferPoolManager::new(2, MemoryStore::new());
///
/// let (page_id, frame) = bpm.new_page().unwrap();
/// frame.page_mut().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(page_id, true).unwrap();
///
/// let frame = bpm.fetch_page(page_id).unwrap();
/// assert_eq!(frame.page().as_slice()[0], 0xAB);
/// bpm.unpin_page(page_id, false).unwrap();
/// ```
pub struct BufferPoolManager<S: PageStore = DiskManager> {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps resident page IDs to their frames.
    page_table: ExtendibleHashTable<PageId, FrameId, BuildIdentityHasher>,

    /// Unpinned resident frames, in eviction order.
    replacer: Box<dyn Replacer<FrameId>>,

    latch: Mutex<PoolState>,

    store: Mutex<S>,

    /// Flushed before any dirty page is written back.
    log_manager: Option<Arc<dyn LogManager>>,

    stats: BufferPoolStats,

    config: BufferPoolConfig,
}

impl<S: PageStore> BufferPoolManager<S> {
    /// Create a buffer pool with `pool_size` frames and default settings.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, store: S) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        Self::build(BufferPoolConfig::new(pool_size), store)
    }

    /// Create a buffer pool from explicit settings.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the configuration is rejected by
    /// [`BufferPoolConfig::validate`].
    pub fn with_config(config: BufferPoolConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, store))
    }

    fn build(config: BufferPoolConfig, store: S) -> Self {
        let frames: Vec<Frame> = (0..config.pool_size).map(|_| Frame::new()).collect();
        let free_list: VecDeque<FrameId> = (0..config.pool_size).map(FrameId::new).collect();

        debug!(
            "buffer pool created: {} frames, bucket size {}, {:?} replacer",
            config.pool_size, config.bucket_size, config.replacer
        );

        Self {
            frames,
            page_table: ExtendibleHashTable::with_hasher(
                config.bucket_size,
                BuildIdentityHasher::default(),
            ),
            replacer: config.replacer.build(),
            latch: Mutex::new(PoolState { free_list }),
            store: Mutex::new(store),
            log_manager: None,
            stats: BufferPoolStats::new(),
            config,
        }
    }

    /// Install a write-ahead log that is flushed before every write-back.
    pub fn with_log_manager(mut self, log_manager: Arc<dyn LogManager>) -> Self {
        self.log_manager = Some(log_manager);
        self
    }

    // ========================================================================
    // Public API: the five page operations
    // ========================================================================

    /// Pin `page_id` in memory and return its frame.
    ///
    /// A resident page is pinned again and withdrawn from eviction. Otherwise
    /// a frame is taken from the free list, or from the replacer (writing the
    /// victim back first if dirty), and the page is read from the store.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for [`PageId::INVALID`]
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - any error from the store; the pool is left as it was, minus the
    ///   evicted victim
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.latch.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.pin_frame(frame_id);

            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!("fetch {}: hit in {}", page_id, frame_id);
            return Ok(&self.frames[frame_id.0]);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];
        frame.assign(page_id);

        let read = {
            let mut page = frame.page_mut();
            self.store.lock().read_page(page_id, &mut page)
        };
        if let Err(e) = read {
            warn!("fetch {}: read failed: {}", page_id, e);
            frame.reset();
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        // Only pages that exist get a page table entry.
        self.page_table.insert(page_id, frame_id);
        BufferPoolStats::bump(&self.stats.pages_read);
        trace!("fetch {}: loaded into {}", page_id, frame_id);
        Ok(frame)
    }

    /// Release one pin on `page_id`, marking it dirty if `is_dirty`.
    ///
    /// When the last pin goes, the frame becomes an eviction candidate.
    /// `is_dirty = false` never clears an earlier dirty mark.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PageNotPinned` if its pin count is already 0
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let _state = self.latch.lock();

        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(Error::PageNotResident(page_id.0))?;
        let frame = &self.frames[frame_id.0];

        let Some(remaining) = frame.try_unpin() else {
            warn!("unpin {}: pin count already 0", page_id);
            return Err(Error::PageNotPinned(page_id.0));
        };

        if is_dirty {
            frame.mark_dirty();
        }
        if remaining == 0 {
            self.replacer.insert(frame_id);
        }

        trace!("unpin {}: {} pins left (dirty: {})", page_id, remaining, frame.is_dirty());
        Ok(())
    }

    /// Write `page_id` to the store if it is dirty, then mark it clean.
    ///
    /// Works whether or not the page is pinned. The page holds an extra pin
    /// while it is written, and the write waits for any write guard on it to
    /// be dropped. The calling thread must not hold a write guard on this
    /// same page.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for [`PageId::INVALID`]
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - any error from the log manager or store; the page stays dirty
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let frame_id = {
            let _state = self.latch.lock();

            let frame_id = self
                .page_table
                .find(&page_id)
                .ok_or(Error::PageNotResident(page_id.0))?;
            if self.pin_for_flush(frame_id).is_none() {
                return Ok(());
            }
            frame_id
        };

        self.flush_pinned(frame_id, page_id)
    }

    /// Drop `page_id` from the pool and deallocate it in the store.
    ///
    /// The frame is zeroed and returned to the free list. Dirty contents are
    /// discarded.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for [`PageId::INVALID`]
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PagePinned` if anyone still holds a pin (nothing changes)
    /// - any error from the store's deallocation, reported after the page has
    ///   already left the pool
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.latch.lock();

        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(Error::PageNotResident(page_id.0))?;
        let frame = &self.frames[frame_id.0];

        if frame.is_pinned() {
            warn!("delete {}: still pinned {} times", page_id, frame.pin_count());
            return Err(Error::PagePinned(page_id.0));
        }

        self.replacer.erase(&frame_id);
        self.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        self.store.lock().deallocate_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_deallocated);

        trace!("delete {}: {} returned to free list", page_id, frame_id);
        Ok(())
    }

    /// Allocate a fresh page in the store and pin it in a zeroed frame.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned (no ID is allocated)
    /// - any error from the store
    pub fn new_page(&self) -> Result<(PageId, &Frame)> {
        let mut state = self.latch.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        let allocated = self.store.lock().allocate_page();
        let page_id = match allocated {
            Ok(page_id) => page_id,
            Err(e) => {
                frame.reset();
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_allocated);

        self.page_table.insert(page_id, frame_id);
        frame.assign(page_id);
        frame.page_mut().reset();

        trace!("new {} in {}", page_id, frame_id);
        Ok((page_id, frame))
    }

    /// Write every dirty resident page to the store.
    ///
    /// Frames are flushed one at a time as in [`flush_page`](Self::flush_page).
    /// The calling thread must not hold a write guard on any page.
    ///
    /// # Errors
    /// Stops at the first error from the log manager or store.
    pub fn flush_all_pages(&self) -> Result<()> {
        for frame_id in (0..self.frames.len()).map(FrameId::new) {
            let pinned = {
                let _state = self.latch.lock();
                self.pin_for_flush(frame_id)
            };
            if let Some(page_id) = pinned {
                self.flush_pinned(frame_id, page_id)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Public API: guarded access
    // ========================================================================

    /// Fetch a page and hold a shared lock on its bytes.
    ///
    /// The guard unpins the page (clean) when dropped.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_, S>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, page_id, frame.page()))
    }

    /// Fetch a page and hold an exclusive lock on its bytes.
    ///
    /// The guard unpins the page as dirty when dropped.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_, S>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    /// [`new_page`](Self::new_page) wrapped in a write guard.
    pub fn new_page_write(&self) -> Result<PageWriteGuard<'_, S>> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Settings this pool was built with.
    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Number of resident, unpinned frames.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    /// Pin count of `page_id`, or `None` if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let _state = self.latch.lock();
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    /// Dirty flag of `page_id`, or `None` if it is not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let _state = self.latch.lock();
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id.0].is_dirty())
    }

    /// Check the frame bookkeeping, panicking on the first violation.
    ///
    /// - free frames are empty, unpinned and not tracked by the replacer
    /// - every other frame is in the page table under its own page ID
    /// - a resident frame is tracked by the replacer iff its pin count is 0
    /// - free + pinned + evictable equals the pool size
    pub fn verify_integrity(&self) {
        let state = self.latch.lock();

        let mut is_free = vec![false; self.frames.len()];
        for &frame_id in &state.free_list {
            assert!(!is_free[frame_id.0], "{} on free list twice", frame_id);
            is_free[frame_id.0] = true;

            let frame = &self.frames[frame_id.0];
            assert!(frame.is_empty(), "free {} holds a page", frame_id);
            assert_eq!(frame.pin_count(), 0, "free {} is pinned", frame_id);
            assert!(!self.replacer.contains(&frame_id), "free {} is evictable", frame_id);
        }

        let (mut pinned, mut evictable) = (0, 0);
        for (i, frame) in self.frames.iter().enumerate() {
            if is_free[i] {
                continue;
            }
            let frame_id = FrameId::new(i);
            let page_id = frame.page_id();

            assert!(page_id.is_valid(), "{} is neither free nor resident", frame_id);
            assert_eq!(
                self.page_table.find(&page_id),
                Some(frame_id),
                "page table disagrees with {}",
                frame_id
            );

            if frame.is_pinned() {
                assert!(!self.replacer.contains(&frame_id), "pinned {} is evictable", frame_id);
                pinned += 1;
            } else {
                assert!(self.replacer.contains(&frame_id), "unpinned {} not evictable", frame_id);
                evictable += 1;
            }
        }

        assert_eq!(state.free_list.len() + pinned + evictable, self.frames.len());
        assert_eq!(self.replacer.size(), evictable, "replacer size");
        assert_eq!(self.page_table.len(), pinned + evictable, "page table size");
        self.page_table.verify_integrity();
    }

    // ========================================================================
    // Internal: frame allocation and eviction
    // ========================================================================

    /// Take a frame from the free list, or evict the replacer's victim.
    ///
    /// The returned frame is unmapped in the page table and not tracked by the
    /// replacer; the caller must map it or put it back on the free list.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.victim() else {
            warn!("buffer pool exhausted: all {} frames pinned", self.frames.len());
            return Err(Error::NoFreeFrames);
        };

        let frame = &self.frames[frame_id.0];
        debug_assert_eq!(frame.pin_count(), 0, "victim {} is pinned", frame_id);
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            if let Err(e) = self.write_back(frame, old_page_id) {
                // Still resident and unpinned.
                self.replacer.insert(frame_id);
                return Err(e);
            }
        }

        self.page_table.remove(&old_page_id);
        BufferPoolStats::bump(&self.stats.evictions);

        trace!("evicted {} from {}", old_page_id, frame_id);
        Ok(frame_id)
    }

    /// Pin a resident frame and withdraw it from eviction. Caller holds the latch.
    fn pin_frame(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        self.replacer.erase(&frame_id);
    }

    /// Pin `frame_id` if it holds a dirty page and return that page.
    /// Caller holds the latch.
    fn pin_for_flush(&self, frame_id: FrameId) -> Option<PageId> {
        let frame = &self.frames[frame_id.0];
        if frame.is_empty() || !frame.is_dirty() {
            return None;
        }
        self.pin_frame(frame_id);
        Some(frame.page_id())
    }

    /// Write back a frame pinned by `pin_for_flush`, then release that pin.
    ///
    /// Called without the latch. The page lock is dropped before the latch is
    /// retaken for the unpin.
    fn flush_pinned(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        let result = {
            let page = frame.page();
            // A concurrent flush may already have written these bytes.
            if frame.is_dirty() {
                self.write_page(page_id, &page).map(|()| frame.clear_dirty())
            } else {
                Ok(())
            }
        };

        let _state = self.latch.lock();
        if frame.try_unpin() == Some(0) {
            self.replacer.insert(frame_id);
        }
        result
    }

    /// Write an evicted victim's page and clear its dirty flag.
    ///
    /// Caller holds the latch. The victim is unpinned, so nobody holds its
    /// page lock.
    fn write_back(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        self.write_page(page_id, &frame.page())?;
        frame.clear_dirty();
        Ok(())
    }

    /// Flush the log, then write `page` to the store.
    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        if let Some(log_manager) = &self.log_manager {
            log_manager.flush()?;
        }

        self.store.lock().write_page(page_id, page)?;

        BufferPoolStats::bump(&self.stats.pages_written);
        trace!("wrote back {}", page_id);
        Ok(())
    }
}
