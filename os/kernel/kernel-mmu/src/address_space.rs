//! # Address Space
//!
//! One table tree plus its base register and the memory backing it.
//!
//! ## Highlights
//!
//! - [`AddressSpace::ensure_mapped`] allocates and links every missing level
//!   for a virtual address, down to and including the data page.
//! - [`AddressSpace::translate`] walks the tree without touching it.
//! - [`AddressSpace::deallocate_all`] releases every page and empties the
//!   base register.
//! - [`AddressSpace::walk`] records each visited entry for inspection.
//!
//! ## Design
//!
//! - The base register is an `Option<PhysicalPage>`; `None` means no tree
//!   exists yet. It is set once, by the first `ensure_mapped`, and cleared
//!   only by `deallocate_all`.
//! - Mutation takes `&mut self`, so the single-caller discipline the
//!   simulated hardware assumes is checked by the compiler.
//! - Pages come from the backend's [`FrameAlloc`] and are viewed as tables
//!   through its [`PhysMapper`]; no `unsafe` lives here.

use crate::addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use crate::arena::PageArena;
use crate::config::{ConfigError, MmuConfig};
use crate::decompose::TableIndex;
use crate::page_table::PageTableEntry;
use crate::{FrameAlloc, PhysMapper};
use alloc::vec::Vec;
use log::{debug, trace};

/// Raw translation result for unmapped addresses: all bits set.
pub const INVALID_TRANSLATION: u64 = u64::MAX;

/// Handle to a single table tree.
pub struct AddressSpace<M = PageArena> {
    config: MmuConfig,
    root: Option<PhysicalPage>,
    memory: M,
}

/// Why a virtual address could not be translated.
///
/// Both cases are recoverable: call [`AddressSpace::ensure_mapped`] and
/// translate again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("no page tables have been allocated yet")]
    NoRootTable,
    #[error("{va} is not mapped: the level {level} entry is invalid")]
    NotMapped { va: VirtualAddress, level: usize },
}

/// One entry visited during a [`Walk`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WalkStep {
    /// Zero-based level; `0` is the root table.
    pub level: usize,
    /// Table that holds the entry.
    pub table: PhysicalPage,
    /// Slot within `table`.
    pub index: TableIndex,
    /// Value found in the slot.
    pub entry: PageTableEntry,
}

/// Trace of a translation: every entry read, and the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    steps: Vec<WalkStep>,
    result: Result<PhysicalAddress, TranslateError>,
}

impl Walk {
    #[must_use]
    pub fn steps(&self) -> &[WalkStep] {
        &self.steps
    }

    /// # Errors
    /// The same error [`AddressSpace::translate`] reports.
    pub const fn result(&self) -> Result<PhysicalAddress, TranslateError> {
        self.result
    }
}

impl AddressSpace<PageArena> {
    /// Empty address space over a fresh [`PageArena`].
    #[must_use]
    pub const fn new(config: MmuConfig) -> Self {
        Self {
            config,
            root: None,
            memory: PageArena::new(&config),
        }
    }
}

impl Default for AddressSpace<PageArena> {
    fn default() -> Self {
        Self::new(MmuConfig::default())
    }
}

impl<M: FrameAlloc + PhysMapper> AddressSpace<M> {
    /// Empty address space over caller-provided memory.
    ///
    /// Pages `memory` already holds are released first; the new space starts
    /// with an empty base register and an empty registry.
    ///
    /// # Errors
    /// [`ConfigError::BackendPageSize`] if `memory` hands out pages of a
    /// different size than `config` describes.
    pub fn with_memory(config: MmuConfig, mut memory: M) -> Result<Self, ConfigError> {
        if memory.page_size() != config.page_size() {
            return Err(ConfigError::BackendPageSize {
                expected: config.page_size(),
                backend: memory.page_size(),
            });
        }
        memory.release_all();
        debug!("address space created: {config}");
        Ok(Self {
            config,
            root: None,
            memory,
        })
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MmuConfig {
        &self.config
    }

    /// The base register: the root table, if any level exists.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> Option<PhysicalPage> {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    /// Every page allocated since the last teardown, in allocation order.
    pub fn allocated_pages(&self) -> impl Iterator<Item = PhysicalPage> + '_ {
        self.memory.allocated_pages()
    }

    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.memory.allocated_count()
    }

    /// Translate `va` to a physical address.
    ///
    /// Never mutates; repeated calls on an unchanged tree agree.
    ///
    /// # Errors
    /// - [`TranslateError::NoRootTable`] before the first
    ///   [`ensure_mapped`](Self::ensure_mapped) or after
    ///   [`deallocate_all`](Self::deallocate_all).
    /// - [`TranslateError::NotMapped`] if an entry on the path is invalid.
    pub fn translate(&self, va: VirtualAddress) -> Result<PhysicalAddress, TranslateError> {
        self.resolve(va, |_| {})
    }

    /// [`translate`](Self::translate) with the raw contract: the physical
    /// address as `u64`, or [`INVALID_TRANSLATION`] on any failure.
    #[must_use]
    pub fn translate_raw(&self, va: u64) -> u64 {
        self.translate(VirtualAddress::new(va))
            .map_or(INVALID_TRANSLATION, PhysicalAddress::as_u64)
    }

    #[must_use]
    pub fn is_mapped(&self, va: VirtualAddress) -> bool {
        self.translate(va).is_ok()
    }

    /// Translate `va` and keep every entry read along the way.
    #[must_use]
    pub fn walk(&self, va: VirtualAddress) -> Walk {
        let mut steps = Vec::with_capacity(self.config.levels() as usize);
        let result = self.resolve(va, |step| steps.push(step));
        Walk { steps, result }
    }

    fn resolve(
        &self,
        va: VirtualAddress,
        mut visit: impl FnMut(WalkStep),
    ) -> Result<PhysicalAddress, TranslateError> {
        let root = self.root.ok_or(TranslateError::NoRootTable)?;
        let parts = self.config.decompose(va);

        let mut table = root;
        for (level, index) in parts.indices().enumerate() {
            let entry = self.memory.table(table).get(index);
            trace!(
                "walk {va}: level {level} entry {} = {entry:?}",
                table.entry_address(index)
            );
            visit(WalkStep {
                level,
                table,
                index,
                entry,
            });
            table = entry
                .decode()
                .ok_or(TranslateError::NotMapped { va, level })?;
        }

        Ok(table.join(parts.offset()))
    }

    /// Make every level needed to translate `va` exist, including the data
    /// page at the end of the walk.
    ///
    /// Existing levels are reused untouched, so calling this again for the
    /// same address (or for an address sharing an index prefix) allocates
    /// only what is still missing.
    pub fn ensure_mapped(&mut self, va: VirtualAddress) {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.memory.alloc_zeroed();
                debug!("base register set to {root}");
                self.root = Some(root);
                root
            }
        };

        let parts = self.config.decompose(va);
        let mut table = root;
        for (level, index) in parts.indices().enumerate() {
            table = match self.memory.table(table).get(index).decode() {
                Some(next) => next,
                None => {
                    let next = self.memory.alloc_zeroed();
                    self.memory
                        .table_mut(table)
                        .set(index, PageTableEntry::encode(next));
                    debug!(
                        "{va}: level {level} entry {} -> new page {next}",
                        table.entry_address(index)
                    );
                    next
                }
            };
        }
    }

    /// Release every page and empty the base register.
    ///
    /// A no-op if no tree exists.
    pub fn deallocate_all(&mut self) {
        let Some(root) = self.root.take() else {
            return;
        };
        let pages = self.memory.allocated_count();
        self.memory.release_all();
        debug!("released {pages} page(s) of the tree rooted at {root}");
    }
}

impl<M: FrameAlloc + PhysMapper> core::fmt::Debug for AddressSpace<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("pages", &self.memory.allocated_count())
            .finish()
    }
}
