//! # Paging Geometry
//!
//! An [`MmuConfig`] fixes the two knobs of the simulated MMU, the number of
//! page-offset bits and the depth of the table tree, and derives everything
//! else from them:
//!
//! ```text
//! page_size         = 2^page_offset_bits
//! entries_per_table = page_size / 8
//! index_bits        = log2(entries_per_table) = page_offset_bits - 3
//! covered_bits      = page_offset_bits + levels * index_bits
//! ```
//!
//! All derivations are checked once, in [`MmuConfig::new`]; a value of this
//! type is always a usable geometry.

use core::fmt;
use utils_accessors_derive::Setters;

/// Size of one page-table entry in bytes.
pub const ENTRY_SIZE: u64 = 8;

/// `log2(ENTRY_SIZE)`.
const ENTRY_SHIFT: u32 = ENTRY_SIZE.trailing_zeros();

/// Smallest page that still holds two entries, i.e. one index bit per level.
pub const MIN_PAGE_OFFSET_BITS: u32 = ENTRY_SHIFT + 1;

/// Largest supported page (1 GiB). Every page is a real allocation.
pub const MAX_PAGE_OFFSET_BITS: u32 = 30;

/// Width of a virtual address.
pub const ADDRESS_BITS: u32 = u64::BITS;

/// Validated paging geometry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MmuConfig {
    page_offset_bits: u32,
    levels: u32,
}

/// Unvalidated input for [`MmuConfig`]; see [`MmuConfigBuilder::build`].
///
/// ```
/// # use kernel_mmu::MmuConfig;
/// let config = MmuConfig::builder()
///     .with_page_offset_bits(12)
///     .with_levels(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.entries_per_table(), 512);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Setters)]
pub struct MmuConfigBuilder {
    /// Number of low virtual-address bits that select a byte within a page.
    page_offset_bits: u32,
    /// Depth of the table tree below the base register.
    levels: u32,
}

/// Rejected paging geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the table tree needs at least one level")]
    NoLevels,
    #[error("{page_offset_bits} offset bits leave room for fewer than two entries per table")]
    PageTooSmall { page_offset_bits: u32 },
    #[error("{page_offset_bits} offset bits exceed the supported maximum of {max}")]
    PageTooLarge { page_offset_bits: u32, max: u32 },
    #[error("{levels} levels above {page_offset_bits} offset bits need more than 64 address bits")]
    AddressWidthExceeded { page_offset_bits: u32, levels: u32 },
    #[error("backend hands out {backend}-byte pages, the configuration expects {expected}")]
    BackendPageSize { expected: u64, backend: u64 },
}

impl MmuConfig {
    /// 4 KiB pages, four levels: 48 bits of coverage.
    pub const X86_64: Self = Self::preset(12, 4);

    /// 4 KiB pages, three levels: 39 bits of coverage.
    pub const SV39: Self = Self::preset(12, 3);

    /// 4 KiB pages, a single table: 21 bits of coverage.
    pub const SINGLE_LEVEL: Self = Self::preset(12, 1);

    const fn preset(page_offset_bits: u32, levels: u32) -> Self {
        match Self::new(page_offset_bits, levels) {
            Ok(config) => config,
            Err(_) => panic!("invalid paging preset"),
        }
    }

    /// Validate a geometry.
    ///
    /// # Errors
    /// - [`ConfigError::NoLevels`] if `levels == 0`.
    /// - [`ConfigError::PageTooSmall`] below [`MIN_PAGE_OFFSET_BITS`].
    /// - [`ConfigError::PageTooLarge`] above [`MAX_PAGE_OFFSET_BITS`].
    /// - [`ConfigError::AddressWidthExceeded`] if offset plus all index bits
    ///   do not fit into a 64-bit virtual address.
    pub const fn new(page_offset_bits: u32, levels: u32) -> Result<Self, ConfigError> {
        if levels == 0 {
            return Err(ConfigError::NoLevels);
        }
        if page_offset_bits < MIN_PAGE_OFFSET_BITS {
            return Err(ConfigError::PageTooSmall { page_offset_bits });
        }
        if page_offset_bits > MAX_PAGE_OFFSET_BITS {
            return Err(ConfigError::PageTooLarge {
                page_offset_bits,
                max: MAX_PAGE_OFFSET_BITS,
            });
        }

        let index_bits = page_offset_bits - ENTRY_SHIFT;
        let covered = match levels.checked_mul(index_bits) {
            Some(bits) => bits.checked_add(page_offset_bits),
            None => None,
        };
        match covered {
            Some(bits) if bits <= ADDRESS_BITS => Ok(Self {
                page_offset_bits,
                levels,
            }),
            _ => Err(ConfigError::AddressWidthExceeded {
                page_offset_bits,
                levels,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn builder() -> MmuConfigBuilder {
        MmuConfigBuilder::new()
    }

    #[inline]
    #[must_use]
    pub const fn page_offset_bits(&self) -> u32 {
        self.page_offset_bits
    }

    #[inline]
    #[must_use]
    pub const fn levels(&self) -> u32 {
        self.levels
    }

    /// Page size in bytes; also the size of every table.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        1 << self.page_offset_bits
    }

    #[inline]
    #[must_use]
    pub const fn entries_per_table(&self) -> usize {
        1 << self.index_bits()
    }

    /// Width of one table index.
    #[inline]
    #[must_use]
    pub const fn index_bits(&self) -> u32 {
        self.page_offset_bits - ENTRY_SHIFT
    }

    /// Number of low virtual-address bits that take part in translation.
    #[inline]
    #[must_use]
    pub const fn covered_bits(&self) -> u32 {
        self.page_offset_bits + self.levels * self.index_bits()
    }

    #[inline]
    #[must_use]
    pub const fn offset_mask(&self) -> u64 {
        self.page_size() - 1
    }

    #[inline]
    #[must_use]
    pub const fn index_mask(&self) -> u64 {
        (1 << self.index_bits()) - 1
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self::X86_64
    }
}

impl fmt::Display for MmuConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} B pages, {} level(s), {} entries/table, {}-bit coverage",
            self.page_size(),
            self.levels,
            self.entries_per_table(),
            self.covered_bits()
        )
    }
}

impl MmuConfigBuilder {
    /// Start from the [`MmuConfig::X86_64`] geometry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            page_offset_bits: MmuConfig::X86_64.page_offset_bits,
            levels: MmuConfig::X86_64.levels,
        }
    }

    /// Validate the collected values.
    ///
    /// # Errors
    /// See [`MmuConfig::new`].
    pub const fn build(self) -> Result<MmuConfig, ConfigError> {
        MmuConfig::new(self.page_offset_bits, self.levels)
    }
}

impl Default for MmuConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<MmuConfig> for MmuConfigBuilder {
    fn from(config: MmuConfig) -> Self {
        Self {
            page_offset_bits: config.page_offset_bits,
            levels: config.levels,
        }
    }
}

const _: () = {
    assert!(ENTRY_SIZE.is_power_of_two());
    assert!(MmuConfig::X86_64.covered_bits() == 48);
    assert!(MmuConfig::SV39.covered_bits() == 39);
};
