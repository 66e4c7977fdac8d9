//! # Simulated MMU Address Translation
//!
//! A multi-level page-table walker with a configurable page size and tree
//! depth, modelling what the memory-management unit sees: a base register,
//! a radix tree of page-sized tables, and 8-byte entries whose low bit marks
//! them valid.
//!
//! ## What you get
//! - An [`MmuConfig`] that validates the geometry up front.
//! - [`VirtualAddress`]/[`PhysicalAddress`] newtypes (u64) to avoid mixing address kinds.
//! - [`MmuConfig::decompose`] to split an address into offset and per-level indices.
//! - A [`PageTableEntry`] codec and a dynamically sized [`PageTable`] view.
//! - An [`AddressSpace`] that translates, lazily builds missing levels and
//!   tears everything down again.
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]) with
//!   two backends: [`PageArena`] (simulated) and [`HostFrames`] (real host
//!   pages).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! With `P` page-offset bits, every table holds `2^P / 8` entries, so each
//! level consumes `P - 3` bits of the virtual address. For `P = 12` and two
//! levels:
//!
//! ```text
//! | 63‒30   | 29‒21   | 20‒12   | 11‒0   |
//! | ignored | level 0 | level 1 | Offset |
//!
//!  PTBR → root table → level-1 table → data page
//!            │              │              │
//!            │              │              └─► + offset = physical address
//!            │              └────────────────► entry[level 1 index]
//!            └───────────────────────────────► entry[level 0 index]
//! ```
//!
//! An invalid entry anywhere on the path ends the walk with
//! [`TranslateError::NotMapped`].
//!
//! ## Example
//!
//! ```
//! use kernel_mmu::{AddressSpace, MmuConfig, TranslateError, VirtualAddress};
//!
//! let mut aspace = AddressSpace::new(MmuConfig::new(12, 2)?);
//! let va = VirtualAddress::new(0x0020_1abc);
//!
//! assert_eq!(aspace.translate(va), Err(TranslateError::NoRootTable));
//!
//! aspace.ensure_mapped(va);
//! let pa = aspace.translate(va)?;
//! assert_eq!(pa.low_bits(12), 0xabc);
//!
//! aspace.deallocate_all();
//! assert!(aspace.translate(va).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod addresses;
pub mod arena;
mod config;
mod decompose;
pub mod host;
mod page_table;
mod registry;

extern crate alloc;

pub use crate::address_space::{AddressSpace, INVALID_TRANSLATION, TranslateError, Walk, WalkStep};
pub use crate::addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
pub use crate::arena::PageArena;
pub use crate::config::{
    ADDRESS_BITS, ConfigError, ENTRY_SIZE, MAX_PAGE_OFFSET_BITS, MIN_PAGE_OFFSET_BITS, MmuConfig,
    MmuConfigBuilder,
};
pub use crate::decompose::{DecomposedAddress, PageOffset, TableIndex, TableIndices};
pub use crate::host::HostFrames;
pub use crate::page_table::{EntryBits, PageTable, PageTableEntry};
pub use crate::registry::AllocationRegistry;

/// Source of zero-initialized, page-sized, page-aligned frames.
///
/// The allocator also keeps the allocation registry: it remembers every page
/// it handed out, in order, until [`release_all`](Self::release_all).
///
/// Running out of memory is not a recoverable condition for the simulated
/// hardware; implementations abort through
/// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) or panic.
pub trait FrameAlloc {
    /// Size of every frame in bytes.
    fn page_size(&self) -> u64;

    /// Allocate and record one zeroed frame.
    fn alloc_zeroed(&mut self) -> PhysicalPage;

    /// Frames allocated since the last [`release_all`](Self::release_all),
    /// in allocation order.
    fn allocated_pages(&self) -> impl Iterator<Item = PhysicalPage> + '_;

    fn allocated_count(&self) -> usize;

    /// Free every recorded frame exactly once and forget them.
    fn release_all(&mut self);
}

/// Turns a physical page into a table view.
///
/// Implementations panic on pages they did not hand out; a well-formed tree
/// only ever references its own frames.
pub trait PhysMapper {
    fn table(&self, page: PhysicalPage) -> &PageTable;

    fn table_mut(&mut self, page: PhysicalPage) -> &mut PageTable;
}
