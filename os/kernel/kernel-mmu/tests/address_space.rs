mod common;

use common::{Backend, address_space};
use kernel_mmu::{
    AddressSpace, FrameAlloc, INVALID_TRANSLATION, MmuConfig, PhysMapper, TranslateError,
    VirtualAddress,
};
use std::collections::HashSet;

/// Addresses spread over the covered range of a (12, 3) geometry.
const SAMPLES: [u64; 6] = [
    0x0,
    0x0000_0000_0000_0fff,
    0x0000_0000_0020_1000,
    0x0000_0000_3fff_f123,
    0x0000_0040_0000_0abc,
    0x0000_007f_ffff_ffff,
];

fn va(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

fn cold_start<B: Backend>() {
    let aspace = address_space::<B>(12, 3);
    for v in SAMPLES {
        assert_eq!(aspace.translate(va(v)), Err(TranslateError::NoRootTable));
        assert_eq!(aspace.translate_raw(v), INVALID_TRANSLATION);
    }
    assert_eq!(aspace.allocated_count(), 0);
}

fn map_then_translate<B: Backend>() {
    let mut aspace = address_space::<B>(12, 3);
    for v in SAMPLES {
        aspace.ensure_mapped(va(v));
        let pa = aspace.translate(va(v)).expect("mapped");
        assert_ne!(pa.as_u64(), INVALID_TRANSLATION);
        assert_eq!(pa.low_bits(12), v & 0xfff, "offset of {v:#x}");
        assert_eq!(aspace.translate_raw(v), pa.as_u64());
    }
}

fn same_page_aliasing<B: Backend>() {
    let mut aspace = address_space::<B>(12, 2);
    let a = 0x0030_5123;
    let b = 0x0030_5ffe;
    aspace.ensure_mapped(va(a));
    let pa = aspace.translate(va(a)).expect("a mapped").as_u64();
    let pb = aspace.translate(va(b)).expect("b shares the page").as_u64();
    assert_eq!(pb.wrapping_sub(pa), 0xffe - 0x123);
    assert_eq!(pa & !0xfff, pb & !0xfff);
}

fn idempotent_mapping<B: Backend>() {
    let mut aspace = address_space::<B>(12, 4);
    let v = 0x0000_7654_3210_9abc;
    aspace.ensure_mapped(va(v));
    let first = aspace.translate(va(v));
    let count = aspace.allocated_count();
    assert_eq!(count, 5);

    aspace.ensure_mapped(va(v));
    assert_eq!(aspace.translate(va(v)), first);
    assert_eq!(aspace.allocated_count(), count);
}

fn shared_prefix_reuse<B: Backend>() {
    let mut aspace = address_space::<B>(12, 3);
    // Same level-0 and level-1 indices, different leaf index.
    let a = 0x0000_0040_0020_1000;
    let b = 0x0000_0040_0020_2000;
    aspace.ensure_mapped(va(a));
    aspace.ensure_mapped(va(b));

    // root, level-1 table, level-2 table, two data pages
    assert_eq!(aspace.allocated_count(), 5);
    let pa = aspace.translate(va(a)).expect("a").as_u64();
    let pb = aspace.translate(va(b)).expect("b").as_u64();
    assert_ne!(pa & !0xfff, pb & !0xfff);

    let unique: HashSet<_> = aspace.allocated_pages().collect();
    assert_eq!(unique.len(), 5);
}

fn full_reset<B: Backend>() {
    let mut aspace = address_space::<B>(12, 3);
    for v in SAMPLES {
        aspace.ensure_mapped(va(v));
    }
    let warm = aspace.allocated_count();
    aspace.deallocate_all();

    assert!(aspace.root().is_none());
    assert_eq!(aspace.allocated_count(), 0);
    for v in SAMPLES {
        assert_eq!(aspace.translate(va(v)), Err(TranslateError::NoRootTable));
    }

    // A second lifecycle behaves like a cold start.
    for v in SAMPLES {
        aspace.ensure_mapped(va(v));
        assert_eq!(aspace.translate(va(v)).expect("remapped").low_bits(12), v & 0xfff);
    }
    assert_eq!(aspace.allocated_count(), warm);

    aspace.deallocate_all();
    aspace.deallocate_all();
    assert_eq!(aspace.allocated_count(), 0);
}

fn concrete_two_level_scenario<B: Backend>() {
    let mut aspace = address_space::<B>(12, 2);
    let v = 0x0000_0000_0020_1000;
    let parts = aspace.config().decompose(va(v));
    assert_eq!(parts.index(0).as_usize(), 1);
    assert_eq!(parts.index(1).as_usize(), 1);
    assert_eq!(parts.offset().as_u64(), 0);

    aspace.ensure_mapped(va(v));
    let pa = aspace.translate(va(v)).expect("mapped");
    assert_eq!(pa.low_bits(12), 0);
}

fn aliasing_beyond_coverage<B: Backend>() {
    let mut aspace = address_space::<B>(12, 1);
    let low = 0x0000_0000_0001_5042;
    let high = 0xABCD_0000_0001_5042;
    aspace.ensure_mapped(va(low));
    assert_eq!(aspace.translate(va(high)), aspace.translate(va(low)));
    assert_eq!(aspace.allocated_count(), 2);
}

fn missing_level_is_reported<B: Backend>() {
    let mut aspace = address_space::<B>(12, 3);
    aspace.ensure_mapped(va(0x1000));
    // Same root slot, next level-1 slot.
    assert_eq!(
        aspace.translate(va(0x0020_0000)),
        Err(TranslateError::NotMapped {
            va: va(0x0020_0000),
            level: 1
        })
    );
    // Different root slot.
    assert_eq!(
        aspace.translate(va(0x4000_0000)),
        Err(TranslateError::NotMapped {
            va: va(0x4000_0000),
            level: 0
        })
    );
    assert!(!aspace.is_mapped(va(0x0020_0000)));
    assert!(aspace.is_mapped(va(0x1000)));
}

fn tree_shape_matches_allocations<B: Backend>() {
    let mut aspace = address_space::<B>(6, 2);
    // 64-byte pages: eight entries per table, three index bits per level.
    for v in (0..64u64).map(|i| i << 6) {
        aspace.ensure_mapped(va(v));
    }
    // root + 8 level-1 tables + 64 data pages
    assert_eq!(aspace.allocated_count(), 73);

    let root = aspace.root().expect("root");
    assert_eq!(aspace.memory().table(root).valid_entries(), 8);
    let pages: HashSet<_> = (0..64u64)
        .map(|i| aspace.translate(va(i << 6)).expect("mapped").as_u64())
        .collect();
    assert_eq!(pages.len(), 64);
}

fn frames_are_page_aligned<B: Backend>() {
    let mut aspace = address_space::<B>(16, 2);
    aspace.ensure_mapped(va(0x1234_5678));
    assert_eq!(aspace.memory().page_size(), 1 << 16);
    for page in aspace.allocated_pages() {
        assert_eq!(page.as_u64() % (1 << 16), 0);
        assert_ne!(page.as_u64(), 0);
    }
}

macro_rules! backend_suite {
    ($name:ident, $backend:ty) => {
        mod $name {
            #[test]
            fn cold_start() {
                super::cold_start::<$backend>();
            }

            #[test]
            fn map_then_translate() {
                super::map_then_translate::<$backend>();
            }

            #[test]
            fn same_page_aliasing() {
                super::same_page_aliasing::<$backend>();
            }

            #[test]
            fn idempotent_mapping() {
                super::idempotent_mapping::<$backend>();
            }

            #[test]
            fn shared_prefix_reuse() {
                super::shared_prefix_reuse::<$backend>();
            }

            #[test]
            fn full_reset() {
                super::full_reset::<$backend>();
            }

            #[test]
            fn concrete_two_level_scenario() {
                super::concrete_two_level_scenario::<$backend>();
            }

            #[test]
            fn aliasing_beyond_coverage() {
                super::aliasing_beyond_coverage::<$backend>();
            }

            #[test]
            fn missing_level_is_reported() {
                super::missing_level_is_reported::<$backend>();
            }

            #[test]
            fn tree_shape_matches_allocations() {
                super::tree_shape_matches_allocations::<$backend>();
            }

            #[test]
            fn frames_are_page_aligned() {
                super::frames_are_page_aligned::<$backend>();
            }
        }
    };
}

backend_suite!(arena, kernel_mmu::PageArena);
backend_suite!(host, kernel_mmu::HostFrames);

#[test]
fn host_translations_point_into_live_pages() {
    let mut aspace = address_space::<kernel_mmu::HostFrames>(12, 2);
    let v = 0x0000_0000_0012_3456;
    aspace.ensure_mapped(va(v));
    let pa = aspace.translate(va(v)).expect("mapped").as_u64();
    let data_page = pa & !0xfff;
    assert!(aspace.allocated_pages().any(|p| p.as_u64() == data_page));
    assert_eq!(aspace.memory().registry().len(), 3);
}

#[test]
fn default_address_space_uses_x86_64_geometry() {
    let mut aspace = AddressSpace::default();
    assert_eq!(*aspace.config(), MmuConfig::X86_64);
    aspace.ensure_mapped(va(0xffff_8000_0000_1000));
    // Bits 48.. are outside the four-level coverage.
    assert_eq!(
        aspace.translate(va(0x0000_8000_0000_1000)),
        aspace.translate(va(0xffff_8000_0000_1000))
    );
}
