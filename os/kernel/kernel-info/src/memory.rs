//! # Memory Layout

/// Size of a page and of every page table / page directory frame.
pub const PAGE_SIZE: u32 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Entries in a page directory and in a page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bytes spanned by one page directory entry.
pub const TABLE_SPAN: u32 = PAGE_SIZE * ENTRIES_PER_TABLE as u32;

/// Start of the kernel-reserved identity region (1 MiB).
pub const KERNEL_START: u32 = 0x0010_0000;

/// End (exclusive) of the kernel-reserved identity region (50 MiB).
///
/// Frames below this address are never handed to the page allocator, and
/// mappings below it are never torn down with an address space.
pub const KERNEL_RESERVED: u32 = 50 * 1024 * 1024;

/// Lowest address the free-range search considers.
pub const MIN_ALLOC: u32 = 0x0800_0000;

/// Upper bound (exclusive) of the free-range search.
pub const MAX_ALLOC: u32 = 0xF000_0000;

/// Physical memory at or above this address is neither identity mapped into
/// the kernel's address space nor handed to the page allocator.
pub const IDENTITY_LIMIT: u32 = 0x1000_0000;

/// `vm_top` only tracks mappings below this address.
pub const VM_TOP_LIMIT: u32 = MIN_ALLOC;

/// Top (exclusive) of the main thread's user stack.
pub const USER_STACK_TOP: u32 = 0xFFFF_C000;

/// Pages in a user stack, for the main thread and for clones given a new stack.
pub const USER_STACK_PAGES: u32 = 16;

/// Bytes in a user stack.
pub const USER_STACK_SIZE: u32 = USER_STACK_PAGES * PAGE_SIZE;

/// Size of a thread's kernel stack.
pub const KERNEL_STACK_SIZE: u32 = PAGE_SIZE;

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(TABLE_SPAN == 4 * 1024 * 1024);
    assert!(KERNEL_START.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_RESERVED.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_START < KERNEL_RESERVED);
    assert!(KERNEL_RESERVED < MIN_ALLOC);
    assert!(MIN_ALLOC.is_multiple_of(TABLE_SPAN));
    assert!(MAX_ALLOC.is_multiple_of(TABLE_SPAN));
    assert!(IDENTITY_LIMIT > KERNEL_RESERVED);
    assert!(MAX_ALLOC <= USER_STACK_TOP - USER_STACK_SIZE);
    assert!(USER_STACK_TOP.is_multiple_of(PAGE_SIZE));
};
