//! `brk`, `mmap2` and `munmap`: anonymous memory only.
//!
//! ```text
//!   ┌───────┬─ heap ──►     ┌─ mmap2 ranges ──►        ┌─────────┐
//!   │ image │ brk           │ MIN_ALLOC     MAX_ALLOC  │  stack  │ USER_STACK_TOP
//!   └───────┘               └──────────────────────────┴─────────┘
//! ```
//!
//! Only user-accessible pages are ever replaced or unmapped; the kernel
//! stacks and control blocks mapped into a domain are left alone.

use crate::Errno;
use kernel::{Cpu, Kernel};
use kernel_info::memory::{KERNEL_RESERVED, PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP};
use kernel_memory_addresses::{Size4K, VirtualAddress};
use kernel_task::DomainId;
use kernel_vmem::{AddressSpace, PageEntryBits, PhysMapper, align_up};
use log::{debug, warn};

pub const PROT_WRITE: u32 = 0x2;
pub const MAP_FIXED: u32 = 0x10;
pub const MAP_ANONYMOUS: u32 = 0x20;

/// The heap may grow up to the bottom of the main thread's stack.
const HEAP_LIMIT: u32 = USER_STACK_TOP - USER_STACK_SIZE;

/// Move the break of `domain` to `requested`, mapping zeroed pages for the
/// growth. Returns the break in effect afterwards: unchanged when asked to
/// shrink, for a query (`0`) or when the heap would run into the stack.
pub fn brk<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, domain: DomainId, requested: u32) -> u32 {
    let (tasks, mem) = kernel.tasks_and_mem();
    let space = &mut tasks.domain_mut(domain).space;
    let current = space.brk().as_u32();
    if requested <= current {
        return current;
    }
    if requested > HEAP_LIMIT {
        warn!("brk {requested:#010x} would reach into the stack");
        return current;
    }

    let mut page = align_up(current, PAGE_SIZE);
    while page < requested {
        let va = VirtualAddress::new(page);
        if !space.entry(&*mem, va).is_present() {
            space.map_zeroed(mem, va, PageEntryBits::user_rw());
        }
        page += PAGE_SIZE;
    }
    space.set_brk(VirtualAddress::new(requested));
    requested
}

/// Map `len` bytes of zeroed anonymous memory.
///
/// Without [`MAP_FIXED`], `addr` (or the domain's `vm_top` when zero) is
/// only where the search for a free range starts. With it, the range is
/// taken as given and user pages already there are replaced.
///
/// # Errors
/// - [`Errno::Inval`] for file mappings, a zero length, a range ending
///   below the kernel-reserved boundary, or a fixed range that is
///   misaligned, starts inside the reserved region or covers kernel pages,
/// - [`Errno::NoMem`] if no free range is left.
pub fn mmap2<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    domain: DomainId,
    addr: u32,
    len: u32,
    prot: u32,
    flags: u32,
) -> Result<u32, Errno> {
    if flags & MAP_ANONYMOUS == 0 {
        warn!("mmap2: only anonymous mappings are supported");
        return Err(Errno::Inval);
    }
    if len == 0 {
        return Err(Errno::Inval);
    }
    let len = len.checked_next_multiple_of(PAGE_SIZE).ok_or(Errno::NoMem)?;

    let (tasks, mem) = kernel.tasks_and_mem();
    let space = &mut tasks.domain_mut(domain).space;
    let hint = if addr == 0 { space.vm_top().as_u32() } else { addr };
    if hint.checked_add(len).is_none_or(|end| end < KERNEL_RESERVED) {
        return Err(Errno::Inval);
    }
    if prot == 0 {
        return Ok(hint);
    }

    let fixed = flags & MAP_FIXED != 0;
    let start = if fixed {
        let start = VirtualAddress::new(hint);
        if !start.is_aligned::<Size4K>() || hint < KERNEL_RESERVED {
            return Err(Errno::Inval);
        }
        if covers_kernel_pages(space, &*mem, hint, len) {
            warn!("mmap2: fixed range at {start} covers kernel pages");
            return Err(Errno::Inval);
        }
        start
    } else {
        space
            .find_free_range(&*mem, VirtualAddress::new(hint), len)
            .ok_or(Errno::NoMem)?
    };

    let page_flags = if prot & PROT_WRITE == 0 {
        PageEntryBits::user_ro()
    } else {
        PageEntryBits::user_rw()
    };
    for offset in (0..len).step_by(PAGE_SIZE as usize) {
        let va = start + offset;
        if space.entry(&*mem, va).is_present() {
            space.unmap(mem, va);
        }
        space.map_zeroed(mem, va, page_flags);
    }
    debug!("mmap2: {len:#x} bytes at {start}");
    Ok(start.as_u32())
}

/// Unmap the user pages of `[addr, addr + len)` and free their frames.
/// Holes are skipped.
///
/// # Errors
/// [`Errno::Inval`] for a misaligned or empty range, one wrapping the
/// address space, or one starting inside the kernel-reserved region.
pub fn munmap<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    domain: DomainId,
    addr: u32,
    len: u32,
) -> Result<u32, Errno> {
    let start = VirtualAddress::new(addr);
    if len == 0 || !start.is_aligned::<Size4K>() || addr < KERNEL_RESERVED {
        return Err(Errno::Inval);
    }
    let len = len.checked_next_multiple_of(PAGE_SIZE).ok_or(Errno::Inval)?;
    if addr.checked_add(len).is_none() {
        return Err(Errno::Inval);
    }

    let (tasks, mem) = kernel.tasks_and_mem();
    let space = &mut tasks.domain_mut(domain).space;
    for offset in (0..len).step_by(PAGE_SIZE as usize) {
        let va = start + offset;
        let entry = space.entry(&*mem, va);
        if entry.is_present() && entry.is_user_accessible() {
            space.unmap(mem, va);
        }
    }
    Ok(0)
}

fn covers_kernel_pages<M: PhysMapper>(space: &AddressSpace, mem: &M, start: u32, len: u32) -> bool {
    (0..len).step_by(PAGE_SIZE as usize).any(|offset| {
        let entry = space.entry(mem, VirtualAddress::new(start + offset));
        entry.is_present() && !entry.is_user_accessible()
    })
}
