//! # Segment Selectors
//!
//! The kernel installs a flat GDT at boot. Trap entry forces the kernel data
//! and GS selectors; user threads run on the selectors chosen at boot with
//! RPL 3 or-ed in.

/// Kernel code segment.
pub const KERNEL_CS: u16 = 0x08;

/// Kernel data / stack segment.
pub const KERNEL_DS: u16 = 0x10;

/// Kernel GS segment.
pub const KERNEL_GS: u16 = 0x18;

/// Requested privilege level for user selectors.
pub const USER_RPL: u16 = 3;

/// Descriptors in the GDT and in every per-thread TLS table.
pub const GDT_ENTRIES: usize = 256;

/// First descriptor slot a thread may claim for thread-local storage.
pub const TLS_START: usize = 16;

/// Interrupt vector used by the system call gate.
pub const SYSCALL_VECTOR: u8 = 0x80;

const _: () = {
    assert!(TLS_START < GDT_ENTRIES);
    assert!((KERNEL_GS >> 3) < TLS_START as u16);
};
