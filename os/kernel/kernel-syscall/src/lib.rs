//! # System Calls
//!
//! The `int 0x80` boundary of the kernel, Linux i386 style:
//!
//! ```text
//!   user:   eax = number, ebx ecx edx esi edi ebp = arguments, int 0x80
//!              │
//!   kernel:  dispatch ──► syscall ──► brk / mmap2 / clone / futex / ...
//!              │                         │
//!              │         eax = value  or  -errno  (saved user frame)
//!              ▼
//!   user:   resumes after `int 0x80` (unless it exited or now sleeps)
//! ```
//!
//! The call runs with the caller as the current thread. Its return value is
//! written to the caller's saved frame only if the caller still exists once
//! the call is done; a blocking call (`futex` wait) has its result in place
//! by the time the thread is resumed.
//!
//! ```rust,ignore
//! let builder = kernel_syscall::install(KernelBuilder::new(cpu, mapper, &regions))?;
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod errno;
pub mod memory;
mod sysno;
pub mod task;

pub use crate::errno::{Errno, encode};
pub use crate::sysno::{SyscallArgs, Sysno};

use kernel::{Cpu, Kernel, KernelBuilder, Privilege, TrapTableError};
use kernel_info::segments::{KERNEL_CS, SYSCALL_VECTOR};
use kernel_task::{ThreadId, TrapFrame};
use kernel_vmem::PhysMapper;
use log::{error, trace, warn};

/// Route the syscall gate to [`syscall`], callable from ring 3.
///
/// # Errors
/// [`TrapTableError::AlreadyRegistered`] if the gate already has a handler.
pub fn install<C: Cpu, M: PhysMapper>(
    builder: KernelBuilder<'_, C, M>,
) -> Result<KernelBuilder<'_, C, M>, TrapTableError> {
    builder.handler(SYSCALL_VECTOR, syscall::<C, M>, Privilege::User)
}

/// Trap handler of the syscall gate.
///
/// # Panics
/// If the kernel itself issued the call.
pub fn syscall<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, frame: &TrapFrame) {
    let args = SyscallArgs::from_frame(frame);
    if frame.info.cs == u32::from(KERNEL_CS) {
        error!(
            "system call {} from kernel code at {:#010x}",
            args.nr, frame.info.eip
        );
        panic!("system call from kernel context");
    }
    let Some(caller) = kernel.current_thread() else {
        error!("system call {} without a current thread", args.nr);
        panic!("system call without a current thread");
    };

    let result = match Sysno::from_raw(args.nr) {
        Some(sysno) => {
            trace!(
                "thread {} :: {sysno:?} {:#x?}",
                kernel.tasks().thread(caller).tid(),
                args.args
            );
            handle(kernel, caller, sysno, &args)
        }
        None => {
            warn!("unsupported system call {} ({:#x})", args.nr, args.nr);
            Err(Errno::NoSys)
        }
    };

    if let Some(thread) = kernel.tasks_mut().try_thread_mut(caller) {
        trace!("thread {} returns {result:?}", thread.tid());
        thread.context.user.regs.eax = encode(result);
    }
}

fn handle<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    caller: ThreadId,
    sysno: Sysno,
    args: &SyscallArgs,
) -> Result<u32, Errno> {
    let domain = kernel.tasks().thread(caller).domain();
    match sysno {
        Sysno::Exit => {
            task::exit(kernel, caller);
            Ok(0)
        }
        Sysno::ExitGroup => {
            task::exit_group(kernel, domain);
            Ok(0)
        }
        Sysno::GetPid => Ok(kernel.tasks().domain(domain).pid()),
        Sysno::GetTid => Ok(kernel.tasks().thread(caller).tid()),
        Sysno::Brk => Ok(memory::brk(kernel, domain, args.arg(0))),
        Sysno::Mmap2 => memory::mmap2(
            kernel,
            domain,
            args.arg(0),
            args.arg(1),
            args.arg(2),
            args.arg(3),
        ),
        Sysno::Munmap => memory::munmap(kernel, domain, args.arg(0), args.arg(1)),
        // flags, stack, parent_tid, tls, child_tid
        Sysno::Clone => task::clone(kernel, caller, args.arg(0), args.arg(1), args.arg(3)),
        Sysno::Futex => task::futex(
            kernel,
            caller,
            args.arg(0),
            args.arg(1),
            args.arg(2),
            args.arg(3),
        ),
        Sysno::SchedYield => {
            task::sched_yield(kernel);
            Ok(0)
        }
        Sysno::SetThreadArea => task::set_thread_area(kernel, caller, args.arg(0)),
    }
}
