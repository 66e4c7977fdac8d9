//! # Host-Backed Physical Memory
//!
//! [`HostFrames`] takes each page straight from the global allocator, aligned
//! to its own size and zero-initialized, and uses the host address as the
//! "physical" address (an identity mapping). Translated addresses therefore
//! point at real memory, the way a loader with identity-mapped low memory
//! would see them.
//!
//! Every page is recorded in an [`AllocationRegistry`] and returned to the
//! allocator exactly once, either by [`FrameAlloc::release_all`] or on drop.
//!
//! The type holds raw pointers and is neither `Send` nor `Sync`.

use crate::addresses::{PhysicalAddress, PhysicalPage};
use crate::config::{ConfigError, MAX_PAGE_OFFSET_BITS, MmuConfig};
use crate::page_table::{PageTable, PageTableEntry};
use crate::registry::AllocationRegistry;
use crate::{FrameAlloc, PhysMapper};
use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use alloc::collections::BTreeMap;
use core::ptr::NonNull;
use log::trace;

/// Frame allocator and mapper over real, page-aligned host allocations.
pub struct HostFrames {
    layout: Layout,
    entries: usize,
    registry: AllocationRegistry,
    frames: BTreeMap<PhysicalPage, NonNull<PageTableEntry>>,
}

impl HostFrames {
    /// # Errors
    /// [`ConfigError::PageTooLarge`] if the host cannot describe an
    /// allocation of one page aligned to its own size.
    pub fn new(config: &MmuConfig) -> Result<Self, ConfigError> {
        let too_large = ConfigError::PageTooLarge {
            page_offset_bits: config.page_offset_bits(),
            max: MAX_PAGE_OFFSET_BITS,
        };
        let size = usize::try_from(config.page_size()).map_err(|_| too_large)?;
        let layout = Layout::from_size_align(size, size).map_err(|_| too_large)?;
        Ok(Self {
            layout,
            entries: config.entries_per_table(),
            registry: AllocationRegistry::new(),
            frames: BTreeMap::new(),
        })
    }

    /// The registry of live pages.
    #[must_use]
    pub const fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    /// ### Panics
    /// If `page` was not handed out by this allocator, or was already
    /// released.
    fn frame(&self, page: PhysicalPage) -> NonNull<PageTableEntry> {
        match self.frames.get(&page) {
            Some(ptr) => *ptr,
            None => panic!("{page:?} is not a live host frame"),
        }
    }
}

impl FrameAlloc for HostFrames {
    fn page_size(&self) -> u64 {
        self.layout.size() as u64
    }

    fn alloc_zeroed(&mut self) -> PhysicalPage {
        // SAFETY: `layout` has a non-zero size (at least 16 bytes).
        let raw = unsafe { alloc_zeroed(self.layout) };
        let Some(ptr) = NonNull::new(raw.cast::<PageTableEntry>()) else {
            handle_alloc_error(self.layout)
        };

        let page = PhysicalPage::from_addr(PhysicalAddress::new(ptr.addr().get() as u64));
        self.registry.record(page);
        self.frames.insert(page, ptr);
        trace!("host frame {page} allocated");
        page
    }

    fn allocated_pages(&self) -> impl Iterator<Item = PhysicalPage> + '_ {
        self.registry.iter()
    }

    fn allocated_count(&self) -> usize {
        self.registry.len()
    }

    fn release_all(&mut self) {
        let frames = &mut self.frames;
        let layout = self.layout;
        self.registry.drain(|page| {
            if let Some(ptr) = frames.remove(&page) {
                // SAFETY: `ptr` came from `alloc_zeroed(layout)` and was removed
                // from the live set, so it is freed exactly once.
                unsafe { dealloc(ptr.as_ptr().cast(), layout) };
            }
        });
        debug_assert!(self.frames.is_empty());
    }
}

impl PhysMapper for HostFrames {
    fn table(&self, page: PhysicalPage) -> &PageTable {
        let ptr = self.frame(page);
        // SAFETY: the frame is live, holds `entries` zero-initialized or
        // previously written entries, and is only mutated through `&mut self`.
        let entries = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), self.entries) };
        PageTable::from_entries(entries)
    }

    fn table_mut(&mut self, page: PhysicalPage) -> &mut PageTable {
        let ptr = self.frame(page);
        // SAFETY: as in `table`; `&mut self` guarantees exclusive access.
        let entries = unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), self.entries) };
        PageTable::from_entries_mut(entries)
    }
}

impl Drop for HostFrames {
    fn drop(&mut self) {
        self.release_all();
    }
}
