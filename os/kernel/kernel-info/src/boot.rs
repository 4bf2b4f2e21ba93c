//! # Boot Memory Map
//!
//! The loader reports physical memory as a list of regions. Only
//! [`MemoryRegionKind::Available`] regions are handed to the page allocator,
//! and only the parts of them above the kernel-reserved boundary.

use crate::memory::{IDENTITY_LIMIT, KERNEL_RESERVED, PAGE_SIZE};
use kernel_memory_addresses::PhysicalAddress;

/// Classification of a physical memory range.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
    /// Usable RAM.
    Available = 1,
    /// Firmware, MMIO or otherwise unusable memory.
    Reserved = 2,
    /// Reclaimable after reading the ACPI tables.
    AcpiReclaimable = 3,
}

/// One contiguous physical range `[start, end)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub start: PhysicalAddress,
    pub end: PhysicalAddress,
    pub kind: MemoryRegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn available(start: u32, end: u32) -> Self {
        Self {
            start: PhysicalAddress::new(start),
            end: PhysicalAddress::new(end),
            kind: MemoryRegionKind::Available,
        }
    }

    /// Length in bytes; zero for an inverted range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.as_u32().saturating_sub(self.start.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.kind, MemoryRegionKind::Available)
    }
}

/// End of the kernel's identity map: the highest end of an available region
/// that reaches past [`KERNEL_RESERVED`] while staying below [`IDENTITY_LIMIT`].
///
/// Regions smaller than a page are ignored.
#[must_use]
pub fn identity_map_top(regions: &[MemoryRegion]) -> PhysicalAddress {
    regions
        .iter()
        .filter(|r| r.is_available() && r.len() >= PAGE_SIZE)
        .map(|r| r.end.as_u32())
        .filter(|&end| end >= KERNEL_RESERVED && end < IDENTITY_LIMIT)
        .max()
        .map_or(PhysicalAddress::zero(), PhysicalAddress::new)
}
