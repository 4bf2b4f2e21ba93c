//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for the memory layout, segment selectors and
//! fixed limits shared by the page allocator, the address-space code, the trap
//! dispatcher and the scheduler, plus the boot-time description of physical
//! memory handed over by the loader.
//!
//! ## Modules
//!
//! * [`memory`]: page geometry, the kernel-reserved identity region, the
//!   dynamic-allocation window and the default user stack placement.
//! * [`segments`]: GDT selectors used on trap entry and for user threads, plus
//!   the thread-local descriptor window.
//! * [`limits`]: capacities of the fixed-size thread and domain tables.
//! * [`boot`]: physical memory regions reported at boot.
//!
//! ## Virtual Address Space Layout
//!
//! Every address space shares the same shape:
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   unmapped (null guard, BIOS)   │
//! KERNEL_START├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │  Kernel image, heap and stacks  │
//!             │   (identity mapped, kernel RW)  │
//! KERNEL_RES. ├─────────────────────────────────┤ 0x0320_0000 (50 MiB)
//!             │  program image, brk heap,       │
//!             │  kernel stacks of threads       │
//! MIN_ALLOC   ├─────────────────────────────────┤ 0x0800_0000
//!             │  anonymous mappings (mmap)      │
//! MAX_ALLOC   ├─────────────────────────────────┤ 0xF000_0000
//!             │  user stack (16 pages)          │
//! STACK_TOP   ├─────────────────────────────────┤ 0xFFFF_C000
//!             │  unmapped                       │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! All layout constants are checked at compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod limits;
pub mod memory;
pub mod segments;
