//! # Physical Page Allocation
//!
//! The bottom of the kernel's memory stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Address spaces (kernel-vmem)                 │
//! │    • page directory / tables per domain             │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameAlloc + PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Page Allocator ([`PageAllocator`])        │
//! │    • intrusive LIFO free list of 4 KiB frames       │
//! │    • allocation / free-page counters                │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │  Physical Mapper ([`phys_mapper`])                  │
//! │    • identity (hardware) / simulated RAM (tests)    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! [`init_paging`] wires the three together at boot: it seeds the free list
//! from the boot memory map and builds the kernel's own address space.
//!
//! ## Features
//!
//! * `simulated`: enables [`phys_mapper::SimulatedRam`], a host-memory backed
//!   physical address range, and links `std`. Meant for test builds only.

#![cfg_attr(not(any(test, doctest, feature = "simulated")), no_std)]
#![allow(unsafe_code)]

mod boot;
mod page_alloc;
pub mod phys_mapper;

#[cfg(test)]
mod address_space_props;

pub use crate::boot::init_paging;
pub use crate::page_alloc::PageAllocator;
