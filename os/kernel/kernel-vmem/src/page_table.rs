//! # Two-Level Page Tables
//!
//! - [`pd`]: the page directory (top level, one per address space).
//! - [`pt`]: page tables (leaf level, each mapping a 4 MiB region).

pub mod pd;
pub mod pt;

use crate::page_table::pd::DirectoryIndex;
use crate::page_table::pt::TableIndex;
use kernel_memory_addresses::VirtualAddress;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirectoryIndex, TableIndex) {
    (DirectoryIndex::from(va), TableIndex::from(va))
}

/// Rebuild the base address of the page selected by a pair of indices.
#[inline]
#[must_use]
pub const fn join_indices(di: DirectoryIndex, ti: TableIndex) -> VirtualAddress {
    VirtualAddress::new((di.as_u32() << 22) | (ti.as_u32() << 12))
}
