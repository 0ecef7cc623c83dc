//! In-memory [`PageStore`].

use std::collections::{BTreeSet, HashMap};

use log::trace;

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageStore;

/// A page store that keeps every page on the heap.
///
/// Follows the same allocation rules as [`DiskManager`](super::DiskManager):
/// IDs grow from 0, deallocated IDs are reused lowest first, and touching an
/// unallocated ID is `PageNotFound`. Nothing survives a drop.
#[derive(Default)]
pub struct MemoryStore {
    pages: HashMap<PageId, Box<Page>>,
    next_page_id: u32,
    free_pages: BTreeSet<PageId>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently allocated pages.
    pub fn allocated_count(&self) -> usize {
        self.pages.len()
    }

    fn slot_mut(&mut self, page_id: PageId) -> Result<&mut Page> {
        self.pages
            .get_mut(&page_id)
            .map(|page| &mut **page)
            .ok_or(Error::PageNotFound(page_id.0))
    }
}

impl PageStore for MemoryStore {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        page.copy_from(self.slot_mut(page_id)?);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.slot_mut(page_id)?.copy_from(page);
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = match self.free_pages.pop_first() {
            Some(page_id) => page_id,
            None => {
                let page_id = PageId::new(self.next_page_id);
                if !page_id.is_valid() {
                    return Err(Error::InvalidPageId(page_id.0));
                }
                self.next_page_id += 1;
                page_id
            }
        };

        self.pages.insert(page_id, Box::new(Page::new()));
        trace!("allocated {} in memory", page_id);
        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if self.pages.remove(&page_id).is_none() {
            return Err(Error::PageNotFound(page_id.0));
        }
        self.free_pages.insert(page_id);
        Ok(())
    }
}
