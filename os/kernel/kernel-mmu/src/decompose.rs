//! # Virtual Address Decomposition
//!
//! Splits a virtual address into its in-page offset and one table index per
//! level. For `page_offset_bits = 12`, `levels = 2`:
//!
//! ```text
//! | 63 ‒ 30 (dropped) | 29 ‒ 21 | 20 ‒ 12 | 11 ‒ 0 |
//! |                   | level 0 | level 1 | offset |
//! ```
//!
//! Indices come out **root first**: level 0 selects the entry in the table
//! referenced by the base register, the last level selects the data page.
//! Bits above [`MmuConfig::covered_bits`] do not take part in translation, so
//! such addresses alias their truncated counterparts.

use crate::addresses::VirtualAddress;
use crate::config::MmuConfig;
use core::iter::FusedIterator;

/// Index of an entry within one table. Always `< entries_per_table`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u32);

/// Byte offset within a page. Always `< page_size`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset(u64);

/// A virtual address split according to an [`MmuConfig`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecomposedAddress {
    page_number: u64,
    offset: PageOffset,
    levels: u32,
    index_bits: u32,
    index_mask: u64,
}

/// Root-to-leaf iterator over the table indices of a [`DecomposedAddress`].
#[derive(Clone, Debug)]
pub struct TableIndices {
    address: DecomposedAddress,
    front: u32,
    back: u32,
}

impl TableIndex {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl PageOffset {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl MmuConfig {
    /// Split `va` into offset and per-level indices.
    ///
    /// ```
    /// # use kernel_mmu::{MmuConfig, VirtualAddress};
    /// let config = MmuConfig::new(12, 2).unwrap();
    /// let parts = config.decompose(VirtualAddress::new(0x0020_1000));
    /// let indices: Vec<usize> = parts.indices().map(|i| i.as_usize()).collect();
    /// assert_eq!(indices, [1, 1]);
    /// assert_eq!(parts.offset().as_u64(), 0);
    /// ```
    #[must_use]
    pub const fn decompose(&self, va: VirtualAddress) -> DecomposedAddress {
        let vpn_bits = self.levels() * self.index_bits();
        let vpn_mask = if vpn_bits >= u64::BITS {
            u64::MAX
        } else {
            (1 << vpn_bits) - 1
        };

        DecomposedAddress {
            page_number: (va.as_u64() >> self.page_offset_bits()) & vpn_mask,
            offset: PageOffset(va.as_u64() & self.offset_mask()),
            levels: self.levels(),
            index_bits: self.index_bits(),
            index_mask: self.index_mask(),
        }
    }
}

impl DecomposedAddress {
    /// The low `page_offset_bits` bits of the address.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> PageOffset {
        self.offset
    }

    /// All covered bits above the offset, i.e. the virtual page number.
    #[inline]
    #[must_use]
    pub const fn page_number(&self) -> u64 {
        self.page_number
    }

    #[inline]
    #[must_use]
    pub const fn levels(&self) -> u32 {
        self.levels
    }

    /// Table index for `level`, where level `0` is the root table.
    ///
    /// ### Panics
    /// If `level >= levels`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(&self, level: u32) -> TableIndex {
        assert!(level < self.levels, "level out of range");
        let shift = (self.levels - 1 - level) * self.index_bits;
        TableIndex(((self.page_number >> shift) & self.index_mask) as u32)
    }

    /// Indices from the root table down to the leaf table.
    #[inline]
    #[must_use]
    pub const fn indices(&self) -> TableIndices {
        TableIndices {
            address: *self,
            front: 0,
            back: self.levels,
        }
    }
}

impl Iterator for TableIndices {
    type Item = TableIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let index = self.address.index(self.front);
        self.front += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.back - self.front) as usize;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for TableIndices {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.address.index(self.back))
    }
}

impl ExactSizeIterator for TableIndices {}

impl FusedIterator for TableIndices {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn indices(config: &MmuConfig, va: u64) -> Vec<usize> {
        config
            .decompose(VirtualAddress::new(va))
            .indices()
            .map(TableIndex::as_usize)
            .collect()
    }

    #[test]
    fn two_level_4k() {
        let c = MmuConfig::new(12, 2).unwrap();
        let parts = c.decompose(VirtualAddress::new(0x0000_0000_0020_1000));
        assert_eq!(parts.offset().as_u64(), 0);
        assert_eq!(parts.index(0).as_usize(), 1);
        assert_eq!(parts.index(1).as_usize(), 1);

        // Bits 21.. select level 0, bits 12..21 select level 1.
        assert_eq!(indices(&c, 0x0000_2000), [0, 2]);
        assert_eq!(indices(&c, 0x0040_0abc), [2, 0]);
    }

    #[test]
    fn offset_is_passed_through() {
        let c = MmuConfig::new(12, 3).unwrap();
        let parts = c.decompose(VirtualAddress::new(0x1234_5678));
        assert_eq!(parts.offset().as_u64(), 0x678);
        assert_eq!(parts.page_number(), 0x1234_5);
    }

    #[test]
    fn root_index_comes_first() {
        let c = MmuConfig::X86_64;
        // PML4 = 1, PDPT = 2, PD = 3, PT = 4
        let va = (1u64 << 39) | (2 << 30) | (3 << 21) | (4 << 12) | 0x5;
        assert_eq!(indices(&c, va), [1, 2, 3, 4]);
        let rev: Vec<_> = c
            .decompose(VirtualAddress::new(va))
            .indices()
            .rev()
            .map(TableIndex::as_usize)
            .collect();
        assert_eq!(rev, [4, 3, 2, 1]);
    }

    #[test]
    fn bits_above_coverage_are_dropped() {
        let c = MmuConfig::new(12, 1).unwrap();
        let low = c.decompose(VirtualAddress::new(0x0000_3123));
        let high = c.decompose(VirtualAddress::new(0xFFFF_0000_0000_3123));
        assert_eq!(low, high);
        assert_eq!(low.page_number(), 3);
    }

    #[test]
    fn full_width_coverage() {
        let c = MmuConfig::new(4, 60).unwrap();
        let parts = c.decompose(VirtualAddress::new(u64::MAX));
        assert_eq!(parts.offset().as_u64(), 0xf);
        assert!(parts.indices().all(|i| i.as_usize() == 1));
        assert_eq!(parts.indices().len(), 60);
    }

    #[test]
    fn small_pages() {
        // 16-byte pages: two entries per table, one index bit per level.
        let c = MmuConfig::new(4, 3).unwrap();
        assert_eq!(indices(&c, 0b101_0011), [1, 0, 1]);
    }
}
