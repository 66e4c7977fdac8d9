//! # Page Tables and Entries
//!
//! - [`PageTableEntry`]: one 8-byte slot. Bit 0 is the validity flag, the
//!   remaining bits are the physical base of the next table (or, at the last
//!   level, of the data page).
//! - [`PageTable`]: one page viewed as `entries_per_table` entries.
//!
//! ## Entry encoding
//!
//! ```text
//! | 63 ‒ 1                   | 0     |
//! | physical base bits 63:1  | valid |
//! ```
//!
//! Every base handed to [`PageTableEntry::encode`] is page-aligned, so its
//! bit 0 is always free for the flag. An entry with bit 0 clear is invalid no
//! matter what the other bits contain.

use crate::addresses::{PhysicalAddress, PhysicalPage};
use crate::decompose::TableIndex;
use bitfield_struct::bitfield;
use core::fmt;

/// Raw bit layout of a [`PageTableEntry`].
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct EntryBits {
    /// Valid (bit 0).
    ///
    /// Set if the remaining bits point at a page obtained from the frame
    /// allocator.
    pub valid: bool,

    /// Physical base address bits [63:1].
    ///
    /// Reconstruct the base as `bits << 1`.
    #[bits(63)]
    base_bits_63_1: u64,
}

/// A single page-table entry.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PageTableEntry(EntryBits);

/// One page worth of entries.
///
/// Dynamically sized: the entry count follows the page size of the
/// [`MmuConfig`](crate::MmuConfig) the backing memory was created for.
#[repr(transparent)]
pub struct PageTable([PageTableEntry]);

const _: () = {
    assert!(size_of::<PageTableEntry>() == size_of::<u64>());
    assert!(align_of::<PageTableEntry>() == align_of::<u64>());
};

impl PageTableEntry {
    /// Invalid entry; the state of every slot in a freshly zeroed page.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(EntryBits::new())
    }

    /// Valid entry referencing `page`.
    #[inline]
    #[must_use]
    pub const fn encode(page: PhysicalPage) -> Self {
        Self(
            EntryBits::new()
                .with_valid(true)
                .with_base_bits_63_1(page.as_u64() >> 1),
        )
    }

    /// The referenced page, or `None` if the entry is invalid.
    #[inline]
    #[must_use]
    pub const fn decode(self) -> Option<PhysicalPage> {
        if !self.0.valid() {
            return None;
        }
        Some(PhysicalPage::from_addr(PhysicalAddress::new(
            self.0.base_bits_63_1() << 1,
        )))
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.valid()
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> EntryBits {
        self.0
    }

    /// Return the raw 64-bit value (flag + address).
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }

    /// Construct from a raw 64-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u64) -> Self {
        Self(EntryBits::from_bits(v))
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(page) => write!(f, "PTE(valid, {:#x})", page.as_u64()),
            None => write!(f, "PTE(invalid, raw={:#x})", self.raw()),
        }
    }
}

impl PageTable {
    /// View a slice of entries as a table.
    #[inline]
    #[must_use]
    pub const fn from_entries(entries: &[PageTableEntry]) -> &Self {
        // SAFETY: `PageTable` is a transparent wrapper around `[PageTableEntry]`.
        unsafe { &*(core::ptr::from_ref(entries) as *const Self) }
    }

    /// View a mutable slice of entries as a table.
    #[inline]
    #[must_use]
    pub const fn from_entries_mut(entries: &mut [PageTableEntry]) -> &mut Self {
        // SAFETY: `PageTable` is a transparent wrapper around `[PageTableEntry]`.
        unsafe { &mut *(core::ptr::from_mut(entries) as *mut Self) }
    }

    /// Number of entries (`entries_per_table`).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the entry at `i`.
    ///
    /// ### Panics
    /// If `i` is out of range, which decomposition under the table's own
    /// configuration never produces.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PageTableEntry {
        self.0[i.as_usize()]
    }

    /// Write the entry at `i`.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PageTableEntry) {
        self.0[i.as_usize()] = e;
    }

    /// Mark every entry invalid.
    #[inline]
    pub fn zero(&mut self) {
        self.0.fill(PageTableEntry::zero());
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = PageTableEntry> + '_ {
        self.0.iter().copied()
    }

    /// Number of valid entries in this table.
    #[must_use]
    pub fn valid_entries(&self) -> usize {
        self.0.iter().filter(|e| e.is_valid()).count()
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.0
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.is_valid()),
            )
            .finish()
    }
}
