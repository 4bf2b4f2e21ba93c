//! # Physical Mappers
//!
//! How the kernel reaches a physical frame from its own address space.
//!
//! - [`IdentityPhysMapper`]: the kernel identity-maps all usable physical
//!   memory, so a physical address *is* a kernel pointer.
//! - [`SimulatedRam`] (`simulated` feature / tests): a contiguous physical
//!   range backed by host memory, for exercising page tables, the allocator
//!   and the scheduler off-target.

use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for the kernel's identity-mapped view of physical memory.
///
/// # Safety
/// Only valid while the kernel's address space (or a domain space sharing its
/// identity map for the frame in question) is active.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_u32() as usize as *mut T;
        // SAFETY: caller guarantees the frame is identity mapped and writable.
        unsafe { &mut *ptr }
    }
}

#[cfg(any(test, feature = "simulated"))]
pub use simulated::SimulatedRam;

#[cfg(any(test, feature = "simulated"))]
mod simulated {
    use core::cell::UnsafeCell;
    use kernel_info::boot::MemoryRegion;
    use kernel_info::memory::PAGE_SIZE;
    use kernel_memory_addresses::{PhysicalAddress, Size4K};
    use kernel_vmem::PhysMapper;

    #[repr(C, align(4096))]
    struct Frame(UnsafeCell<[u8; PAGE_SIZE as usize]>);

    /// Physical range `[start, start + frames * 4096)` backed by host memory.
    ///
    /// Addresses outside the range panic, the simulated equivalent of a bus error.
    pub struct SimulatedRam {
        start: PhysicalAddress,
        frames: Vec<Frame>,
    }

    impl SimulatedRam {
        /// # Panics
        /// If `start` is not page aligned or the range leaves the 32-bit space.
        #[must_use]
        pub fn new(start: PhysicalAddress, frames: u32) -> Self {
            assert!(start.is_aligned::<Size4K>(), "simulated RAM must start on a page");
            assert!(
                start.checked_add(frames * PAGE_SIZE).is_some(),
                "simulated RAM must fit below 4 GiB"
            );
            let frames = (0..frames)
                .map(|_| Frame(UnsafeCell::new([0; PAGE_SIZE as usize])))
                .collect();
            Self { start, frames }
        }

        #[must_use]
        pub const fn start(&self) -> PhysicalAddress {
            self.start
        }

        #[must_use]
        pub fn end(&self) -> PhysicalAddress {
            PhysicalAddress::new(self.start.as_u32() + self.frames.len() as u32 * PAGE_SIZE)
        }

        /// The boot memory map describing this RAM.
        #[must_use]
        pub fn regions(&self) -> [MemoryRegion; 1] {
            [MemoryRegion::available(self.start.as_u32(), self.end().as_u32())]
        }
    }

    impl PhysMapper for SimulatedRam {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let rel = pa
                .as_u32()
                .checked_sub(self.start.as_u32())
                .unwrap_or_else(|| panic!("physical address {pa} below simulated RAM"));
            let frame = self
                .frames
                .get((rel / PAGE_SIZE) as usize)
                .unwrap_or_else(|| panic!("physical address {pa} above simulated RAM"));
            let offset = (rel % PAGE_SIZE) as usize;
            debug_assert!(offset + size_of::<T>() <= PAGE_SIZE as usize, "access crosses a frame");
            // SAFETY: the frame is owned by `self` and outlives every use in tests.
            unsafe { &mut *frame.0.get().cast::<u8>().add(offset).cast::<T>() }
        }
    }
}
