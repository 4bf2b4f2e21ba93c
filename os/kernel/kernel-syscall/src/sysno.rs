use kernel_task::TrapFrame;

/// The i386 Linux system call numbers the kernel answers.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sysno {
    Exit = 1,
    GetPid = 20,
    Brk = 45,
    Munmap = 91,
    Clone = 120,
    SchedYield = 158,
    Mmap2 = 192,
    GetTid = 224,
    Futex = 240,
    SetThreadArea = 243,
    ExitGroup = 252,
}

impl Sysno {
    #[must_use]
    pub const fn from_raw(nr: u32) -> Option<Self> {
        Some(match nr {
            1 => Self::Exit,
            20 => Self::GetPid,
            45 => Self::Brk,
            91 => Self::Munmap,
            120 => Self::Clone,
            158 => Self::SchedYield,
            192 => Self::Mmap2,
            224 => Self::GetTid,
            240 => Self::Futex,
            243 => Self::SetThreadArea,
            252 => Self::ExitGroup,
            _ => return None,
        })
    }
}

/// Number and arguments as user space passes them to `int 0x80`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SyscallArgs {
    pub nr: u32,
    /// EBX, ECX, EDX, ESI, EDI, EBP.
    pub args: [u32; 6],
}

impl SyscallArgs {
    #[must_use]
    pub const fn from_frame(frame: &TrapFrame) -> Self {
        let regs = &frame.regs;
        Self {
            nr: regs.eax,
            args: [regs.ebx, regs.ecx, regs.edx, regs.esi, regs.edi, regs.ebp],
        }
    }

    #[inline]
    #[must_use]
    pub const fn arg(&self, index: usize) -> u32 {
        self.args[index]
    }
}
