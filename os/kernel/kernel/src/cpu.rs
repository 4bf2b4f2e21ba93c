//! # CPU Seam
//!
//! Every privileged instruction the dispatcher and the scheduler need, behind
//! one trait. The kernel logic above it is plain Rust and runs unchanged on
//! the host against [`RecordingCpu`].

use crate::interrupts::Idt;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::cr3::Cr3;
use kernel_task::{FpuArea, GdtEntry, TrapFrame};

#[cfg(any(test, feature = "simulated"))]
mod recording;

#[cfg(any(test, feature = "simulated"))]
pub use recording::{CpuEvent, RecordingCpu};

pub trait Cpu {
    /// Load the kernel data and GS selectors.
    fn load_kernel_segments(&mut self);

    /// Activate the address space rooted at `cr3`.
    fn load_address_space(&mut self, cr3: Cr3);

    /// Stack the CPU switches to on a trap from user mode (`TSS.esp0`).
    fn set_kernel_stack(&mut self, top: u32);

    /// `fxsave` into `area`.
    fn save_fpu(&mut self, area: &mut FpuArea);

    /// `fxrstor` from `area`, which holds an image written by
    /// [`save_fpu`](Self::save_fpu).
    fn restore_fpu(&mut self, area: &FpuArea);

    /// Copy a thread's TLS descriptors into the live GDT, starting at
    /// `TLS_START`, and reload the segment registers that use them.
    fn load_tls(&mut self, entries: &[GdtEntry]);

    /// Point the IDTR at `idt`.
    ///
    /// # Safety
    /// `idt` must stay at its address for as long as traps can occur.
    unsafe fn load_idt(&mut self, idt: &Idt);

    /// Linear address of the last page fault (CR2).
    fn fault_address(&self) -> VirtualAddress;

    /// Enable interrupts and idle until the next trap.
    ///
    /// On hardware the entry path dispatches the trap before this returns
    /// `None`. A simulated CPU instead hands the trap back for the caller to
    /// dispatch.
    fn wait_for_interrupt(&mut self) -> Option<TrapFrame>;

    /// Run `f` with the stack pointer at `stack_top`, then return to the
    /// caller's stack.
    ///
    /// # Safety
    /// `stack_top` must be the top of a mapped stack that nothing else is
    /// using, and the caller must not already be running on it.
    unsafe fn call_on_stack(stack_top: u32, f: &mut dyn FnMut());
}
