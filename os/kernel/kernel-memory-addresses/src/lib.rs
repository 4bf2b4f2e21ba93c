//! # Virtual and Physical Memory Address Types (32-bit)
//!
//! Strongly typed wrappers for raw memory addresses and page bases used by the
//! page allocator, the two-level page tables and the address-space code.
//!
//! ## Overview
//!
//! The types prevent mixing virtual and physical addresses at compile time
//! while remaining zero-cost wrappers around `u32` values.
//!
//! | Concept | Generic | Description |
//! |----------|----------|-------------|
//! | [`MemoryAddress`] | – | A raw 32-bit address, either physical or virtual. |
//! | [`MemoryPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//! | [`MemoryAddressOffset<S>`] | [`S: PageSize`](PageSize) | An offset within a page of size `S`. |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Refer to virtual (page-directory translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Refer to physical memory. |
//!
//! ## Page Sizes
//!
//! - [`Size4K`]: 4 KiB pages, the mapping granularity.
//! - [`Size4M`]: the 4 MiB span covered by one page directory entry.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0804_8123);
//! let (page, off) = va.split::<Size4K>();
//! assert_eq!(page.base().as_u32(), 0x0804_8000);
//! assert_eq!(page.join(off), va);
//!
//! // The directory slot of an address is its 4 MiB region.
//! assert_eq!(va.page::<Size4M>().base().as_u32() >> Size4M::SHIFT, 0x20);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_address_offset;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use crate::memory_address::MemoryAddress;
pub use crate::memory_address_offset::MemoryAddressOffset;
pub use crate::memory_page::MemoryPage;
pub use crate::page_size::{PageSize, Size4K, Size4M};
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_4k() {
        let a = MemoryAddress::new(0x89AB_CDEF);
        let (p, o) = a.split::<Size4K>();
        assert_eq!(p.base().as_u32(), 0x89AB_C000);
        assert_eq!(o.as_u32(), 0xDEF);
        assert_eq!(p.join(o), a);
    }

    #[test]
    fn split_and_join_4m() {
        let a = MemoryAddress::new(0x0C81_2345);
        let (p, o) = a.split::<Size4M>();
        assert_eq!(p.base().as_u32(), 0x0C80_0000);
        assert_eq!(o.as_u32(), 0x1_2345);
        assert_eq!(p.join(o), a);
    }

    #[test]
    fn virtual_vs_physical_wrappers() {
        let va = VirtualAddress::new(0xFFFF_B234);
        let (vp, vo) = va.split::<Size4K>();
        assert_eq!(vp.base().as_u32(), 0xFFFF_B000);
        assert_eq!(vo.as_u32(), 0x234);

        let pa = PhysicalAddress::new(0x0400_0042);
        let (pp, po) = pa.split::<Size4K>();
        assert_eq!(pp.base().as_u32(), 0x0400_0000);
        assert_eq!(pp.join(po), pa);
    }

    #[test]
    fn alignment_helpers() {
        let a = VirtualAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u32(), 0x12000);
        assert_eq!(a.checked_align_up::<Size4K>(), Some(VirtualAddress::new(0x13000)));
        assert!(!a.is_aligned::<Size4K>());
        assert!(VirtualAddress::new(0x13000).is_aligned::<Size4K>());
        assert_eq!(VirtualAddress::new(0xFFFF_F001).checked_align_up::<Size4K>(), None);
    }

    #[test]
    fn page_stepping_stops_at_the_top() {
        let top = VirtualAddress::new(0xFFFF_E000).page::<Size4K>();
        assert_eq!(
            top.checked_forward(1).map(VirtualPage::base),
            Some(VirtualAddress::new(0xFFFF_F000))
        );
        assert_eq!(top.checked_forward(2), None);
    }

    #[test]
    fn unaligned_virtual_address_is_not_a_page() {
        assert!(VirtualPage::<Size4K>::try_from(VirtualAddress::new(0x1001)).is_err());
        assert!(VirtualPage::<Size4K>::try_from(VirtualAddress::new(0x1000)).is_ok());
    }
}
