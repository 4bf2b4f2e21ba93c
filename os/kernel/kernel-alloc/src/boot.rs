use crate::PageAllocator;
use kernel_info::boot::{MemoryRegion, identity_map_top};
use kernel_info::memory::{IDENTITY_LIMIT, KERNEL_START, PAGE_SIZE};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::{AddressSpace, PageEntryBits, PhysMapper};
use log::info;

/// Bring up physical memory management from the boot memory map.
///
/// 1. Every available region (at least one page long) is handed to the
///    allocator, clipped to `[KERNEL_RESERVED, IDENTITY_LIMIT)`.
/// 2. The kernel's own address space identity-maps `[KERNEL_START, top)`
///    kernel read/write, where `top` is the end of the highest usable region.
/// 3. The allocation counter is reset, so domain accounting starts at zero.
pub fn init_paging<M: PhysMapper>(
    regions: &[MemoryRegion],
    mapper: M,
) -> (PageAllocator<M>, AddressSpace) {
    let mut alloc = PageAllocator::new(mapper);
    for region in regions
        .iter()
        .filter(|r| r.is_available() && r.len() >= PAGE_SIZE)
    {
        let end = region.end.min(PhysicalAddress::new(IDENTITY_LIMIT));
        alloc.add_region(region.start, end);
    }

    let top = identity_map_top(regions);
    let mut kernel = AddressSpace::new(&mut alloc);
    kernel.identity_map(
        &mut alloc,
        PhysicalAddress::new(KERNEL_START),
        top,
        PageEntryBits::kernel_rw(),
    );

    info!(
        "paging: {} free pages, kernel identity map up to {top}, {} frames used",
        alloc.free_pages(),
        alloc.allocated_pages()
    );
    alloc.reset_counters();
    (alloc, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phys_mapper::SimulatedRam;
    use kernel_info::memory::KERNEL_RESERVED;
    use kernel_memory_addresses::VirtualAddress;

    #[test]
    fn kernel_space_identity_maps_usable_memory() {
        let ram = SimulatedRam::new(PhysicalAddress::new(0x0400_0000), 64);
        let regions = ram.regions();
        let (alloc, kernel) = init_paging(&regions, ram);

        assert_eq!(alloc.allocated_pages(), 0);
        // directory plus 17 tables covering 1 MiB..0x0404_0000
        assert_eq!(alloc.free_pages(), 64 - 18);

        for va in [KERNEL_START, KERNEL_RESERVED, 0x0403_F000] {
            let entry = kernel.entry(&alloc, VirtualAddress::new(va));
            assert!(entry.is_present(), "{va:#x} should be mapped");
            assert_eq!(entry.flags().physical_address().as_u32(), va);
            assert!(!entry.flags().user_access());
        }
        assert!(!kernel.entry(&alloc, VirtualAddress::new(0x0404_0000)).is_present());
        assert!(!kernel.entry(&alloc, VirtualAddress::new(0)).is_present());
    }
}
