//! Randomised checks of address spaces backed by the real page allocator.

use crate::PageAllocator;
use crate::phys_mapper::SimulatedRam;
use kernel_info::memory::{KERNEL_RESERVED, MAX_ALLOC, MIN_ALLOC, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};
use kernel_vmem::{AddressSpace, PageEntryBits};
use proptest::prelude::*;

fn allocator() -> PageAllocator<SimulatedRam> {
    let ram = SimulatedRam::new(PhysicalAddress::new(0x0400_0000), 256);
    let (start, end) = (ram.start(), ram.end());
    let mut alloc = PageAllocator::new(ram);
    alloc.add_region(start, end);
    alloc
}

/// Page-aligned user addresses spread over the whole allocatable window.
fn user_page() -> impl Strategy<Value = u32> {
    (KERNEL_RESERVED / PAGE_SIZE..0xFFFF_F000 / PAGE_SIZE).prop_map(|n| n * PAGE_SIZE)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn mapped_user_pages_translate_until_unmapped(page in user_page(), offset in 0..PAGE_SIZE) {
        let mut alloc = allocator();
        let mut space = AddressSpace::new(&mut alloc);
        let va = VirtualAddress::new(page);

        let frame = space.map_zeroed(&mut alloc, va, PageEntryBits::user_rw());
        prop_assert_eq!(
            space.translate(&alloc, va + offset),
            Some(PhysicalAddress::new(frame.base().as_u32() + offset))
        );

        space.unmap(&mut alloc, va);
        prop_assert_eq!(space.translate(&alloc, va + offset), None);
        space.destroy(&mut alloc);
    }

    #[test]
    fn free_ranges_are_aligned_and_unmapped(
        mapped in proptest::collection::vec(0u32..64, 0..16),
        start in 0u32..MIN_ALLOC + 64 * PAGE_SIZE,
        len in 0u32..8 * PAGE_SIZE,
    ) {
        let mut alloc = allocator();
        let mut space = AddressSpace::new(&mut alloc);
        for n in &mapped {
            let va = VirtualAddress::new(MIN_ALLOC + n * PAGE_SIZE);
            if !space.entry(&alloc, va).is_present() {
                space.map_zeroed(&mut alloc, va, PageEntryBits::user_rw());
            }
        }

        let found = space.find_free_range(&alloc, VirtualAddress::new(start), len);
        let found = found.expect("plenty of room below MAX_ALLOC");
        prop_assert!(found.is_aligned::<Size4K>());
        prop_assert!(found.as_u32() >= start.max(MIN_ALLOC));
        let pages = len.max(1).div_ceil(PAGE_SIZE);
        prop_assert!(found.as_u32() + pages * PAGE_SIZE <= MAX_ALLOC);
        for i in 0..pages {
            prop_assert!(!space.entry(&alloc, found + i * PAGE_SIZE).is_present());
        }
        space.destroy(&mut alloc);
    }

    #[test]
    fn destroy_returns_the_allocator_to_its_baseline(pages in proptest::collection::vec(user_page(), 1..24)) {
        let mut alloc = allocator();
        let baseline = (alloc.allocated_pages(), alloc.free_pages());

        let mut space = AddressSpace::new(&mut alloc);
        for page in pages {
            let va = VirtualAddress::new(page);
            if !space.entry(&alloc, va).is_present() {
                space.map_zeroed(&mut alloc, va, PageEntryBits::user_rw());
            }
        }
        prop_assert!(alloc.allocated_pages() > baseline.0);

        space.destroy(&mut alloc);
        prop_assert_eq!((alloc.allocated_pages(), alloc.free_pages()), baseline);
    }
}
