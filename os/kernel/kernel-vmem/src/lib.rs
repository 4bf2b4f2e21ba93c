//! # Virtual Memory Support (IA-32, two-level paging)
//!
//! Page table types and per-domain address spaces for a 32-bit kernel.
//!
//! ## What you get
//! - A persistent [`AddressSpace`] (page directory frame plus the `vm_top` and
//!   `brk` watermarks) with map/unmap/translate and a free-range search.
//! - A [`PageEntryBits`] bitfield shared by directory and table entries.
//! - 4 KiB-aligned [`PageDirectory`] / [`PageTable`] wrappers and index helpers.
//! - The memory seams the address space is generic over: [`FrameAlloc`]
//!   (where frames come from) and [`PhysMapper`] (how the kernel reaches a
//!   physical frame), combined as [`PhysMemory`].
//! - Guarded [`user`] space access through a domain's translation.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  CR3 → Page Directory (1024 PDEs) → Page Table (1024 PTEs) → 4 KiB page
//! ```
//!
//! | Level | Table | Entry | Covers |
//! |:------|:------|:------|:-------|
//! | 1 | Page Directory | PDE | 4 MiB per entry, links a page table |
//! | 2 | Page Table | PTE | 4 KiB per entry, maps a frame |
//!
//! Page tables are created lazily on first mapping; the directory entry is
//! installed as present + writable + user so the leaf alone decides access.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_entry_bits;
pub mod page_table;
pub mod user;

pub use crate::address_space::AddressSpace;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{DirectoryIndex, PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry, TableIndex};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Source of **physical** 4 KiB frames for page tables and mapped pages.
///
/// Running out of frames is fatal for the kernel core, so allocation does not
/// return an `Option`; implementations halt instead.
pub trait FrameAlloc {
    /// Allocate one 4 KiB physical frame. Contents are unspecified.
    fn alloc_4k(&mut self) -> PhysicalPage<Size4K>;

    /// Return a frame previously handed out by [`alloc_4k`](Self::alloc_4k).
    fn free_4k(&mut self, frame: PhysicalAddress);
}

/// Converts physical addresses to usable references in the current virtual
/// address space (the kernel identity-maps all of physical memory; tests use a
/// simulated RAM).
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference.
    ///
    /// # Safety
    /// - `pa` must be backed by memory the mapper can reach, writable for `&mut T`.
    /// - The lifetime `'a` is unchecked; the frame must stay valid for `'a`.
    /// - `T` must match the bytes at `pa` and must not alias another live `&mut`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Both halves of physical memory access.
pub trait PhysMemory: FrameAlloc + PhysMapper {
    /// Clear a whole frame.
    fn zero_frame(&self, frame: PhysicalPage<Size4K>) {
        // SAFETY: frames handed out by the allocator are reachable through the mapper.
        let bytes = unsafe { self.phys_to_mut::<[u8; 4096]>(frame.base()) };
        bytes.fill(0);
    }

    /// Allocate a frame and clear it.
    fn alloc_zeroed(&mut self) -> PhysicalPage<Size4K> {
        let frame = self.alloc_4k();
        self.zero_frame(frame);
        frame
    }
}

impl<T> PhysMemory for T where T: FrameAlloc + PhysMapper {}

/// Borrow the page directory stored in `frame`.
///
/// # Safety
/// `frame` must hold a page directory reachable through `m`.
#[inline]
pub(crate) unsafe fn directory_mut<'a, M: PhysMapper>(
    m: &M,
    frame: PhysicalPage<Size4K>,
) -> &'a mut PageDirectory {
    unsafe { m.phys_to_mut::<PageDirectory>(frame.base()) }
}

/// Borrow the page table stored in `frame`.
///
/// # Safety
/// `frame` must hold a page table reachable through `m`.
#[inline]
pub(crate) unsafe fn table_mut<'a, M: PhysMapper>(
    m: &M,
    frame: PhysicalPage<Size4K>,
) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(frame.base()) }
}

/// Align `x` down to the nearest multiple of `a` (a power of two).
///
/// ```rust
/// # use kernel_vmem::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u32, a: u32) -> u32 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a` (a power of two).
///
/// `x + (a - 1)` must not overflow `u32`.
///
/// ```rust
/// # use kernel_vmem::align_up;
/// assert_eq!(align_up(1, 4096), 4096);
/// assert_eq!(align_up(4096, 4096), 4096);
/// assert_eq!(align_up(4097, 4096), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u32, a: u32) -> u32 {
    (x + a - 1) & !(a - 1)
}
