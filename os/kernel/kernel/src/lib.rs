//! # Kernel Core
//!
//! Turns hardware traps into scheduled, address-space isolated threads.
//!
//! ```text
//!   entry stub ──► Kernel::dispatch ──► TrapTable handler (syscall, timer, fault)
//!                        │
//!                        ├── reschedule requested? ──► schedule ──► switch_to
//!                        │                              (on the schedule stack)
//!                        ▼
//!             resume frame of the (possibly new) current thread,
//!             its kernel stack in the TSS, its domain's CR3 loaded
//! ```
//!
//! All mutable kernel state lives in one [`Kernel`] value built by
//! [`KernelBuilder`] at boot and passed to every trap and scheduler entry
//! point. The CPU is reached only through the [`Cpu`] trait: [`arch`] has
//! the x86 implementation, and the `simulated` feature adds
//! [`cpu::RecordingCpu`] for host tests.
//!
//! ## Boot
//! ```rust,ignore
//! let mut kernel = KernelBuilder::new(X86Cpu, IdentityPhysMapper, &regions)
//!     .schedule_stack(StackBounds::new(stack_lo, stack_hi))
//!     .user_segments(user_segments)
//!     .isr_stubs(IsrStubs::new(isr_entry_list, 23))
//!     .thread_trampoline(kernel_thread_init)
//!     .log_level(LevelFilter::Debug)
//!     .handler(TIMER_VECTOR, timer::reschedule_on_tick, Privilege::Kernel)?
//!     .build();
//! unsafe { kernel.install_idt() };
//! kernel.start_program("init", &image)?;
//! kernel.schedule();
//! let frame = kernel.thread_entry();
//! ```
//!
//! ## Features
//! * `qemu` (default): log to the QEMU debug console.
//! * `asm`: compile [`arch::X86Cpu`].
//! * `simulated`: host-backed RAM and a recording CPU for tests.

#![cfg_attr(not(any(test, doctest, feature = "simulated")), no_std)]
#![allow(unsafe_code)]

pub mod arch;
mod context;
pub mod cpu;
pub mod interrupts;
pub mod program;
mod sched;
mod tracing;

pub use crate::context::{BootConfig, Kernel, KernelBuilder};
pub use crate::cpu::Cpu;
pub use crate::interrupts::{
    Idt, IdtEntry, IdtGateAttr, IsrStubs, Privilege, TrapFn, TrapHandler, TrapTable,
    TrapTableBuilder, TrapTableError,
};
pub use crate::program::{ProgramError, ProgramImage, ProgramSegment};
pub use crate::tracing::init_logging;
