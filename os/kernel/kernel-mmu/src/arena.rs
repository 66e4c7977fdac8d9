//! # Simulated Physical Memory
//!
//! [`PageArena`] owns every page of one address space in a single `Vec`.
//! Physical addresses are synthetic: frame `i` lives at
//! `page_size * (i + 1)`, which keeps every page naturally aligned and never
//! hands out address `0`. Teardown drops the whole vector at once, so there
//! is no per-page bookkeeping beyond the frame order itself.
//!
//! ```text
//!  phys  0x0000     0x1000     0x2000     0x3000
//!         (unused) | frame 0  | frame 1  | frame 2  | ...
//! ```

use crate::addresses::{PhysicalAddress, PhysicalPage};
use crate::config::MmuConfig;
use crate::page_table::{PageTable, PageTableEntry};
use crate::{FrameAlloc, PhysMapper};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// Frame allocator and mapper backed by owned, zero-initialized frames.
pub struct PageArena {
    page_size: u64,
    entries: usize,
    frames: Vec<Box<[PageTableEntry]>>,
}

impl PageArena {
    #[must_use]
    pub const fn new(config: &MmuConfig) -> Self {
        Self {
            page_size: config.page_size(),
            entries: config.entries_per_table(),
            frames: Vec::new(),
        }
    }

    /// Physical page of frame `index`.
    #[inline]
    const fn page_at(&self, index: usize) -> PhysicalPage {
        PhysicalPage::from_addr(PhysicalAddress::new((index as u64 + 1) * self.page_size))
    }

    /// Frame index of `page`.
    ///
    /// ### Panics
    /// If `page` was not handed out by this arena. Entries only ever hold
    /// pages from the same arena, so this indicates a corrupted table.
    #[allow(clippy::cast_possible_truncation)]
    fn frame_index(&self, page: PhysicalPage) -> usize {
        let addr = page.as_u64();
        let index = (addr / self.page_size).checked_sub(1);
        match index {
            Some(i) if addr % self.page_size == 0 && (i as usize) < self.frames.len() => i as usize,
            _ => panic!("{page:?} is not backed by this arena"),
        }
    }
}

impl FrameAlloc for PageArena {
    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn alloc_zeroed(&mut self) -> PhysicalPage {
        let page = self.page_at(self.frames.len());
        self.frames
            .push(vec![PageTableEntry::zero(); self.entries].into_boxed_slice());
        page
    }

    fn allocated_pages(&self) -> impl Iterator<Item = PhysicalPage> + '_ {
        (0..self.frames.len()).map(|i| self.page_at(i))
    }

    fn allocated_count(&self) -> usize {
        self.frames.len()
    }

    fn release_all(&mut self) {
        self.frames = Vec::new();
    }
}

impl PhysMapper for PageArena {
    fn table(&self, page: PhysicalPage) -> &PageTable {
        PageTable::from_entries(&self.frames[self.frame_index(page)])
    }

    fn table_mut(&mut self, page: PhysicalPage) -> &mut PageTable {
        let index = self.frame_index(page);
        PageTable::from_entries_mut(&mut self.frames[index])
    }
}
