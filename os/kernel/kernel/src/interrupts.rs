//! # Trap Dispatch
//!
//! One pass of [`Kernel::dispatch`] per hardware trap:
//!
//! 1. load the kernel data and GS selectors,
//! 2. switch to the kernel's own address space,
//! 3. point `TSS.esp0` at the schedule stack and check the captured kernel
//!    stack pointer against it ("stack underflow"),
//! 4. file the frame with the current thread: a trap from kernel code goes
//!    to the thread's kernel context (interrupts masked on resume), a trap
//!    from user mode must have landed on the thread's own kernel stack,
//! 5. run the vector's handler,
//! 6. run a requested reschedule, on the schedule stack,
//! 7. rewrite the frame with the state of the (possibly new) current thread
//!    and, for a user resume, load its kernel stack and address space.
//!
//! ## Registration
//!
//! Handlers are registered once per vector on a [`TrapTableBuilder`] during
//! boot; [`TrapTableBuilder::build`] consumes the builder, so the table can
//! no longer change once the kernel runs.
//!
//! ```rust,ignore
//! let mut traps = TrapTableBuilder::new(IsrStubs::new(isr_entry_list, 23));
//! traps.set_handler(0x80, syscall, KERNEL_CS, Privilege::User)?;
//! traps.set_handler(0x20, timer::reschedule_on_tick, KERNEL_CS, Privilege::Kernel)?;
//! let table = traps.build();
//! ```
//!
//! | Vector | Default |
//! |--------|---------|
//! | 2 (NMI), 15 | reserved, no gate |
//! | 0x0D | [`gpf::general_protection_fault`] (gate DPL 3) |
//! | 0x0E | [`page_fault::page_fault`] |
//! | others | fatal "unhandled interrupt" |

mod idt;
pub mod gpf;
pub mod page_fault;
pub mod timer;

pub use idt::{Idt, IdtEntry, IdtGateAttr, IsrStubs};

use crate::context::Kernel;
use crate::cpu::Cpu;
use kernel_info::segments::KERNEL_CS;
use kernel_registers::eflags::Eflags;
use kernel_task::TrapFrame;
use kernel_vmem::PhysMapper;
use log::{error, trace};

/// Non-maskable interrupt; never routed through the table.
pub const NMI_VECTOR: u8 = 2;

/// Intel-reserved vector.
pub const RESERVED_VECTOR: u8 = 15;

/// Who may raise a vector.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Privilege {
    /// Hardware and kernel code only (gate DPL 0).
    Kernel = 0,
    /// Also `int n` from ring 3 (gate DPL 3), e.g. the syscall gate.
    User = 3,
}

/// A trap handler. The frame is the one captured on entry; by the time the
/// handler runs it has already been filed with the current thread, so
/// register changes meant for the resumed thread go through
/// [`Kernel::current_frame_mut`].
pub type TrapFn<C, M> = fn(&mut Kernel<C, M>, &TrapFrame);

/// Entry of the handler table.
pub enum TrapHandler<C, M> {
    Unhandled,
    Handler(TrapFn<C, M>),
}

#[allow(clippy::expl_impl_clone_on_copy)]
impl<C, M> Clone for TrapHandler<C, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, M> Copy for TrapHandler<C, M> {}

impl<C, M> TrapHandler<C, M> {
    #[inline]
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

impl<C, M> core::fmt::Debug for TrapHandler<C, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unhandled => f.write_str("Unhandled"),
            Self::Handler(h) => write!(f, "Handler({:#x})", *h as usize),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TrapTableError {
    #[error("vector {0} is reserved and cannot take a handler")]
    Reserved(u8),
    #[error("vector {0} already has a handler")]
    AlreadyRegistered(u8),
}

/// Write-once registration of trap handlers during boot.
pub struct TrapTableBuilder<C, M> {
    handlers: [TrapHandler<C, M>; 256],
    idt: Idt,
}

impl<C, M> TrapTableBuilder<C, M> {
    /// Every vector but the reserved two gets a present kernel-only gate to
    /// its entry stub and the fatal default handler.
    #[must_use]
    pub fn new(stubs: IsrStubs) -> Self {
        let mut idt = Idt::new();
        for vector in 0..=u8::MAX {
            if is_reserved(vector) {
                continue;
            }
            idt.set(
                vector,
                IdtEntry::interrupt_gate(stubs.entry(vector), KERNEL_CS, Privilege::Kernel as u8),
            );
        }
        Self {
            handlers: [TrapHandler::Unhandled; 256],
            idt,
        }
    }

    /// Route `vector` to `handler` through a gate in `selector` that
    /// `privilege` may raise.
    ///
    /// # Errors
    /// [`TrapTableError::Reserved`] for the NMI and the reserved vector,
    /// [`TrapTableError::AlreadyRegistered`] if `vector` has a handler.
    pub fn set_handler(
        &mut self,
        vector: u8,
        handler: TrapFn<C, M>,
        selector: u16,
        privilege: Privilege,
    ) -> Result<&mut Self, TrapTableError> {
        if is_reserved(vector) {
            return Err(TrapTableError::Reserved(vector));
        }
        let slot = &mut self.handlers[usize::from(vector)];
        if slot.is_registered() {
            return Err(TrapTableError::AlreadyRegistered(vector));
        }
        *slot = TrapHandler::Handler(handler);
        self.idt
            .entry_mut(vector)
            .retarget(selector, privilege as u8);
        trace!("vector {vector:#04x}: handler registered, {privilege:?}");
        Ok(self)
    }

    #[must_use]
    pub fn is_registered(&self, vector: u8) -> bool {
        self.handlers[usize::from(vector)].is_registered()
    }

    /// Freeze the table.
    #[must_use]
    pub fn build(self) -> TrapTable<C, M> {
        TrapTable {
            handlers: self.handlers,
            idt: self.idt,
        }
    }
}

/// The frozen handler table and the IDT image built alongside it.
pub struct TrapTable<C, M> {
    handlers: [TrapHandler<C, M>; 256],
    idt: Idt,
}

impl<C, M> TrapTable<C, M> {
    #[must_use]
    pub fn handler(&self, vector: u8) -> TrapHandler<C, M> {
        self.handlers[usize::from(vector)]
    }

    #[must_use]
    pub const fn idt(&self) -> &Idt {
        &self.idt
    }
}

const fn is_reserved(vector: u8) -> bool {
    vector == NMI_VECTOR || vector == RESERVED_VECTOR
}

impl<C: Cpu, M: PhysMapper> Kernel<C, M> {
    /// Handle one trap. `frame` is what the entry stub pushed; on return it
    /// holds the state to resume.
    ///
    /// # Panics
    /// On a kernel stack outside its bounds, or whatever the handler treats
    /// as fatal.
    pub fn dispatch(&mut self, frame: &mut TrapFrame) {
        self.cpu.load_kernel_segments();
        self.cpu.load_address_space(self.space.cr3());
        self.cpu.set_kernel_stack(self.schedule_stack.hi);

        let kernel_esp = frame.regs.kernel_esp;
        if kernel_esp < self.schedule_stack.lo {
            error!(
                "kernel esp {kernel_esp:#010x} below the schedule stack at {:#010x}",
                self.schedule_stack.lo
            );
            panic!("stack underflow");
        }

        self.file_trap(frame);

        let vector = frame.info.vector;
        trace!(
            "trap {vector:#04x} err={:#x} eip={:#010x} cs={:#x}",
            frame.info.error_code, frame.info.eip, frame.info.cs
        );
        match u8::try_from(vector).map(|v| self.traps.handler(v)) {
            Ok(TrapHandler::Handler(handler)) => handler(self, frame),
            Ok(TrapHandler::Unhandled) | Err(_) => unhandled(frame),
        }

        if self.reschedule {
            self.reschedule = false;
            if self.schedule_stack.strictly_contains(kernel_esp) {
                trace!("scheduling on the schedule stack");
                self.schedule();
            } else {
                trace!("scheduling from a thread's kernel stack");
                self.on_schedule_stack(Self::schedule);
            }
        }

        *frame = self.resume_frame();
        trace!(
            "resuming eip={:#010x} esp={:#010x}",
            frame.info.eip, frame.info.esp
        );
    }

    /// Ask for a reschedule at the end of the current trap.
    #[inline]
    pub const fn request_reschedule(&mut self) {
        self.reschedule = true;
    }

    #[inline]
    #[must_use]
    pub const fn reschedule_pending(&self) -> bool {
        self.reschedule
    }

    /// Step 4: remember where the trap came from.
    fn file_trap(&mut self, frame: &TrapFrame) {
        let from_kernel = frame.info.cs == u32::from(KERNEL_CS);
        let Some(id) = self.tasks.current_thread() else {
            if !from_kernel {
                error!("trap from user mode at {:#010x} without a current thread", frame.info.eip);
                panic!("trap from user mode without a current thread");
            }
            self.idle.save_kernel(frame, Eflags::IF);
            return;
        };

        let thread = self.tasks.thread_mut(id);
        if from_kernel {
            thread.context.save_kernel(frame, Eflags::IF);
            return;
        }

        let kernel_esp = frame.regs.kernel_esp;
        if !thread.kernel_stack.contains(kernel_esp) {
            error!(
                "kernel stack for thread {} is out of range: esp {kernel_esp:#010x}, stack {:#010x}..{:#010x}",
                thread.tid(),
                thread.kernel_stack.lo,
                thread.kernel_stack.hi
            );
            panic!("kernel stack out of range");
        }
        thread.context.save_user(frame);
    }

    /// Step 7: the frame of whichever context runs next.
    fn resume_frame(&mut self) -> TrapFrame {
        let Some(id) = self.tasks.current_thread() else {
            return self.idle.take_resume_frame();
        };

        let thread = self.tasks.thread_mut(id);
        if thread.context.in_kernel {
            return thread.context.take_resume_frame();
        }

        let frame = thread.context.take_resume_frame();
        let (stack_top, domain) = (thread.kernel_stack.hi, thread.domain());
        self.cpu.set_kernel_stack(stack_top);
        self.cpu
            .load_address_space(self.tasks.domain(domain).space.cr3());
        frame
    }
}

#[cold]
fn unhandled(frame: &TrapFrame) -> ! {
    error!(
        concat!(
            "Unhandled interrupt!\n",
            "  vector         = {vector:#04x}\n",
            "  exception code = {code:#010x}\n",
            "  eip            = {eip:#010x}"
        ),
        vector = frame.info.vector,
        code = frame.info.error_code,
        eip = frame.info.eip,
    );
    panic!("unhandled interrupt {:#x}", frame.info.vector);
}
