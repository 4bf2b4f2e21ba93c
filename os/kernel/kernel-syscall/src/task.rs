//! Thread and domain calls: `exit`, `exit_group`, `clone`, `futex`,
//! `sched_yield` and `set_thread_area`.

use crate::Errno;
use kernel::{Cpu, Kernel};
use kernel_info::segments::{GDT_ENTRIES, TLS_START};
use kernel_memory_addresses::VirtualAddress;
use kernel_task::{DomainId, ThreadId, UserDesc};
use kernel_vmem::PhysMapper;
use kernel_vmem::user::{read_value, write_value};
use log::{debug, warn};

pub const CLONE_THREAD: u32 = 0x0001_0000;
pub const CLONE_SETTLS: u32 = 0x0008_0000;

pub const FUTEX_WAIT: u32 = 0;
pub const FUTEX_WAKE: u32 = 1;
pub const FUTEX_PRIVATE_FLAG: u32 = 128;
const FUTEX_CMD_MASK: u32 = 0xf;

/// Start a thread in the caller's domain that continues from the caller's
/// trap with EAX = 0. Returns the new thread's tid.
///
/// `stack` becomes the child's stack top, zero keeps the caller's. With
/// [`CLONE_SETTLS`], `tls` points at a [`UserDesc`] naming an explicit slot
/// that is installed in the child's table.
///
/// # Errors
/// - [`Errno::Inval`] without [`CLONE_THREAD`] (no new processes), or for a
///   TLS request without a valid thread-owned slot,
/// - [`Errno::Fault`] if the TLS request cannot be read.
pub fn clone<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    caller: ThreadId,
    flags: u32,
    stack: u32,
    tls: u32,
) -> Result<u32, Errno> {
    if flags & CLONE_THREAD == 0 {
        warn!("clone without CLONE_THREAD is not supported (flags {flags:#x})");
        return Err(Errno::Inval);
    }
    let domain = kernel.tasks().thread(caller).domain();

    let desc = if flags & CLONE_SETTLS == 0 {
        None
    } else {
        let space = &kernel.tasks().domain(domain).space;
        let desc: UserDesc = read_value(space, kernel.mem(), VirtualAddress::new(tls))?;
        if !(TLS_START..GDT_ENTRIES).contains(&(desc.entry_number as usize)) {
            return Err(Errno::Inval);
        }
        Some(desc)
    };

    let child = kernel.create_thread(domain, stack, Some(caller));
    if let Some(desc) = desc {
        kernel.update_tls(child, |table| table.set_tls_segment(desc.entry_number, &desc));
    }
    let tid = kernel.tasks().thread(child).tid();
    debug!("clone: thread {tid} in domain {}", kernel.tasks().domain(domain).pid());
    Ok(tid)
}

/// Private futexes: `FUTEX_WAIT` parks the caller on the word at `uaddr`
/// while it still holds `val`; `FUTEX_WAKE` resumes up to `val` waiters on
/// that word and returns how many it woke.
///
/// Waiters are matched by the physical address of the word, within the
/// caller's domain.
///
/// # Errors
/// - [`Errno::NoSys`] for shared futexes, other operations and timed waits,
/// - [`Errno::Inval`] for a misaligned word,
/// - [`Errno::Fault`] if the word is not mapped,
/// - [`Errno::Again`] if the word no longer holds `val`.
pub fn futex<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    caller: ThreadId,
    uaddr: u32,
    op: u32,
    val: u32,
    timeout: u32,
) -> Result<u32, Errno> {
    if op & FUTEX_PRIVATE_FLAG == 0 {
        warn!("futex: shared futexes are not supported");
        return Err(Errno::NoSys);
    }
    if !uaddr.is_multiple_of(4) {
        return Err(Errno::Inval);
    }

    let domain = kernel.tasks().thread(caller).domain();
    let space = &kernel.tasks().domain(domain).space;
    let va = VirtualAddress::new(uaddr);
    let word = space.translate(kernel.mem(), va).ok_or(Errno::Fault)?;

    match op & FUTEX_CMD_MASK {
        FUTEX_WAIT => {
            if timeout != 0 {
                warn!("futex: timed waits are not supported");
                return Err(Errno::NoSys);
            }
            let current: u32 = read_value(space, kernel.mem(), va)?;
            if current != val {
                return Err(Errno::Again);
            }
            kernel.tasks_mut().thread_mut(caller).wait_address = Some(word);
            kernel.park(caller);
            Ok(0)
        }
        FUTEX_WAKE => {
            let mut woken = 0;
            while woken < val {
                let Some(waiter) = kernel.tasks().waiters(domain, word).next() else {
                    break;
                };
                kernel.resume(waiter);
                woken += 1;
            }
            Ok(woken)
        }
        other => {
            warn!("futex: unsupported operation {other}");
            Err(Errno::NoSys)
        }
    }
}

/// Install the descriptor `u_info` points at in the caller's TLS table. An
/// `entry_number` of `u32::MAX` picks the first free slot and reports it
/// back through the same field.
///
/// # Errors
/// - [`Errno::Fault`] if the descriptor cannot be read or written back,
/// - [`Errno::Srch`] if no slot is free,
/// - [`Errno::Inval`] for a slot that is not thread-owned.
pub fn set_thread_area<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    caller: ThreadId,
    u_info: u32,
) -> Result<u32, Errno> {
    let domain = kernel.tasks().thread(caller).domain();
    let va = VirtualAddress::new(u_info);
    let mut desc: UserDesc = read_value(&kernel.tasks().domain(domain).space, kernel.mem(), va)?;

    let slot = kernel.update_tls(caller, |table| -> Result<u32, Errno> {
        let slot = if desc.entry_number == UserDesc::ANY_SLOT {
            table.find_free_slot().ok_or(Errno::Srch)?
        } else {
            desc.entry_number
        };
        if table.set_tls_segment(slot, &desc) {
            Ok(slot)
        } else {
            Err(Errno::Inval)
        }
    })?;

    if desc.entry_number != slot {
        desc.entry_number = slot;
        write_value(&kernel.tasks().domain(domain).space, kernel.mem(), va, &desc)?;
    }
    Ok(0)
}

/// End the calling thread; the last thread of a domain takes the domain
/// with it.
pub fn exit<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, caller: ThreadId) {
    kernel.exit_thread(caller);
}

/// End every thread of `domain` and the domain itself.
pub fn exit_group<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, domain: DomainId) {
    kernel.exit_domain(domain);
}

/// Give up the rest of the time slice.
pub fn sched_yield<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>) {
    kernel.request_reschedule();
}
