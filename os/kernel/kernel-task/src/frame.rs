//! # Trap Snapshots
//!
//! What the low-level entry stub leaves on the stack, and what a thread keeps
//! of it between traps. The stub pushes the segment registers and the
//! general-purpose registers (`pusha` order) on top of what the CPU pushed,
//! so memory order is [`RegisterState`] followed by [`TrapInfo`]:
//!
//! ```text
//!  low  ┌──────────────────────────────┐ ◄── &TrapFrame
//!       │ gs fs es ds                  │
//!       │ edi esi ebp kernel_esp       │  RegisterState
//!       │ ebx edx ecx eax              │
//!       ├──────────────────────────────┤
//!       │ vector error_code            │  TrapInfo
//!       │ eip cs eflags [esp ss]       │  (esp/ss only on privilege change)
//!  high └──────────────────────────────┘
//! ```

use utils_accessors_derive::Setters;

/// Trap identification and the CPU-pushed return frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Setters)]
pub struct TrapInfo {
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

/// Segment and general-purpose registers saved by the entry stub.
///
/// `kernel_esp` is the stack pointer `pusha` recorded, i.e. where on the
/// kernel stack the trap landed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Setters)]
pub struct RegisterState {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub kernel_esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
}

/// Everything the entry stub hands to the dispatcher, in stack order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrapFrame {
    pub regs: RegisterState,
    pub info: TrapInfo,
}

const _: () = {
    assert!(size_of::<RegisterState>() == 12 * 4);
    assert!(size_of::<TrapInfo>() == 7 * 4);
    assert!(core::mem::offset_of!(TrapFrame, info) == size_of::<RegisterState>());
};

/// A stack `[lo, hi)`; the stack grows down from `hi`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StackBounds {
    pub lo: u32,
    pub hi: u32,
}

impl StackBounds {
    #[inline]
    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Whether `esp` lies within the stack, both ends included (an empty
    /// stack has `esp == hi`).
    #[inline]
    #[must_use]
    pub const fn contains(&self, esp: u32) -> bool {
        self.lo <= esp && esp <= self.hi
    }

    /// Whether `esp` lies strictly inside the stack.
    #[inline]
    #[must_use]
    pub const fn strictly_contains(&self, esp: u32) -> bool {
        self.lo < esp && esp < self.hi
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }
}

/// The two register snapshots a thread keeps across traps.
///
/// `user` holds the state to resume in user mode. `kernel` holds the state of
/// kernel code the thread was executing when a trap interrupted it (a thread
/// blocked inside a system call, for instance). `in_kernel` selects which one
/// the next trap exit restores.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SavedContext {
    pub user: TrapFrame,
    pub kernel: TrapFrame,
    pub in_kernel: bool,
    pub interrupted_eip: u32,
    pub interrupted_esp: u32,
}

impl SavedContext {
    /// Record a trap that interrupted kernel code. Interrupts stay disabled
    /// when the kernel code is resumed.
    pub fn save_kernel(&mut self, frame: &TrapFrame, interrupt_flag: u32) {
        self.kernel = *frame;
        self.kernel.info.eflags &= !interrupt_flag;
        self.in_kernel = true;
        self.interrupted_eip = frame.info.eip;
        self.interrupted_esp = frame.info.esp;
    }

    /// Record a trap taken from user mode.
    pub fn save_user(&mut self, frame: &TrapFrame) {
        self.user = *frame;
        self.in_kernel = false;
    }

    /// The frame the next trap exit resumes. Consumes a pending kernel
    /// resume.
    pub fn take_resume_frame(&mut self) -> TrapFrame {
        if self.in_kernel {
            self.in_kernel = false;
            let mut frame = self.kernel;
            frame.info.eip = self.interrupted_eip;
            frame.info.esp = self.interrupted_esp;
            frame
        } else {
            self.user
        }
    }
}
