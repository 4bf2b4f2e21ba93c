//! # IA-32 Structures Behind the CPU Seam
//!
//! The 32-bit Task State Segment is the only hardware structure besides the
//! IDT (see [`crate::interrupts`]) the core writes to. No hardware task
//! switching is used; the CPU only reads `esp0`/`ss0` from it when a trap
//! raises the privilege level, so `esp0` always holds the current thread's
//! kernel stack top.
//!
//! [`X86Cpu`] is compiled with the `asm` feature on 32-bit x86 targets.

#[cfg(all(feature = "asm", target_arch = "x86"))]
mod x86;

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use x86::X86Cpu;

use kernel_info::segments::KERNEL_DS;

/// 32-bit TSS (Intel SDM Vol. 3A, §8.2.1).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TaskStateSegment {
    pub link: u32,
    /// Stack pointer loaded on a trap from ring 3.
    pub esp0: u32,
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    /// Offset of the I/O permission bitmap; pointing past the end disables it.
    pub iomap_base: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    /// A TSS that enters ring 0 on the kernel data segment, with no I/O
    /// bitmap. `esp0` is set per thread.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn kernel() -> Self {
        Self {
            link: 0,
            esp0: 0,
            ss0: KERNEL_DS as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: size_of::<Self>() as u16,
        }
    }
}
