use crate::context::Kernel;
use crate::cpu::Cpu;
use bitfield_struct::bitfield;
use kernel_task::TrapFrame;
use kernel_vmem::PhysMapper;
use log::error;

pub const PAGE_FAULT_VECTOR: u8 = 0x0E; // 14

/// Page-fault handler: decodes the error code and CR2, logs the faulting
/// thread and the page-table entry behind the address, then halts. Every
/// page fault is fatal.
pub fn page_fault<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, frame: &TrapFrame) {
    let address = kernel.cpu().fault_address();
    let err = PageFaultError::from_bits(frame.info.error_code);

    error!(
        "PAGE FAULT: cr2={address} err={raw:#x} eip={eip:#010x}",
        raw = err.into_bits(),
        eip = frame.info.eip
    );
    error!("{}", err.explain());
    error!("{err:#?}");

    if let Some(id) = kernel.tasks().current_thread() {
        let thread = kernel.tasks().thread(id);
        let domain = kernel.tasks().domain(thread.domain());
        let entry = domain.space.entry(kernel.mem(), address);
        error!(
            "in thread {} of domain {} ({}), entry {:#010x}",
            thread.tid(),
            domain.pid(),
            domain.name(),
            entry.raw()
        );
    }

    panic!("page fault at {address}");
}

/// Page-fault error code layout (IA-32).
///
/// Reference: Intel SDM Vol. 3A, §6.15 "Page-Fault Exception (#PF)".
#[bitfield(u32)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    #[bits(27)]
    __: u32, // reserved / ignored bits
}

impl PageFaultError {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.reserved_bit() {
            "Reserved bit set in a paging structure"
        } else if self.user() && self.write() {
            "User-mode write to a read-only or kernel page"
        } else if self.user() {
            "User-mode access to a kernel page"
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}
