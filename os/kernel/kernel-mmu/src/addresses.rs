//! # Virtual and Physical Addresses
//!
//! Thin `u64` newtypes that keep virtual and physical addresses apart at the
//! type level. Page sizes are a runtime property of an
//! [`MmuConfig`](crate::MmuConfig), so unlike a fixed-size paging model these
//! types carry no page-size marker; alignment of a [`PhysicalPage`] is an
//! invariant of the frame allocator that handed it out.

use crate::config::ENTRY_SIZE;
use crate::decompose::{PageOffset, TableIndex};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// No canonicality or width checks happen here; bits above the configured
/// coverage are dropped during [decomposition](crate::MmuConfig::decompose).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

/// Physical memory address as seen by the simulated MMU.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

/// Base address of one page-sized, page-aligned block handed out by a
/// [`FrameAlloc`](crate::FrameAlloc).
///
/// Both page tables and final data pages are `PhysicalPage`s.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(PhysicalAddress);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl PhysicalAddress {
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

    /// The low `bits` bits of this address.
    #[inline]
    #[must_use]
    pub const fn low_bits(self, bits: u32) -> u64 {
        self.0 & ((1 << bits) - 1)
    }
}

impl PhysicalPage {
    /// Wrap a page base address.
    ///
    /// ### Debug assertions
    /// - Asserts bit 0 is clear; it is reused as the entry validity flag.
    #[inline]
    #[must_use]
    pub const fn from_addr(base: PhysicalAddress) -> Self {
        debug_assert!(base.as_u64() & 1 == 0, "page base must be even");
        Self(base)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    /// Physical address of the entry slot `index` when this page is a table:
    /// `base + index * 8`.
    #[inline]
    #[must_use]
    pub const fn entry_address(self, index: TableIndex) -> PhysicalAddress {
        PhysicalAddress::new(self.as_u64() + index.as_u64() * ENTRY_SIZE)
    }

    /// Attach an in-page offset, yielding the translated address.
    #[inline]
    #[must_use]
    pub const fn join(self, offset: PageOffset) -> PhysicalAddress {
        PhysicalAddress::new(self.as_u64() + offset.as_u64())
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(va: VirtualAddress) -> Self {
        va.as_u64()
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(pa: PhysicalAddress) -> Self {
        pa.as_u64()
    }
}

impl From<PhysicalPage> for PhysicalAddress {
    #[inline]
    fn from(page: PhysicalPage) -> Self {
        page.base()
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}
