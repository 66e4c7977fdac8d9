//! # Allocation Registry
//!
//! Ordered record of every page handed out since the last full teardown.
//! It exists so that teardown can find each page again; nothing else reads
//! it during translation.

use crate::addresses::PhysicalPage;
use alloc::vec::Vec;

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct AllocationRegistry {
    pages: Vec<PhysicalPage>,
}

impl AllocationRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Append `page`. Grows by exactly one entry per call.
    pub fn record(&mut self, page: PhysicalPage) {
        debug_assert!(!self.contains(page), "page {page} recorded twice");
        self.pages.push(page);
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn contains(&self, page: PhysicalPage) -> bool {
        self.pages.contains(&page)
    }

    /// Pages in allocation order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = PhysicalPage> + '_ {
        self.pages.iter().copied()
    }

    /// Hand every recorded page to `release` exactly once, in allocation
    /// order, then drop the registry's own storage.
    pub fn drain(&mut self, mut release: impl FnMut(PhysicalPage)) {
        for page in self.pages.drain(..) {
            release(page);
        }
        self.pages = Vec::new();
    }
}
