use crate::context::Kernel;
use crate::cpu::Cpu;
use kernel_task::TrapFrame;
use kernel_vmem::PhysMapper;
use log::error;

pub const GPF_VECTOR: u8 = 0x0D; // 13

/// General-protection fault: log the selector error code and where it
/// happened, then halt.
pub fn general_protection_fault<C: Cpu, M: PhysMapper>(
    kernel: &mut Kernel<C, M>,
    frame: &TrapFrame,
) {
    let origin = kernel
        .tasks()
        .current_thread()
        .map(|id| kernel.tasks().thread(id))
        .map(|t| (kernel.tasks().domain(t.domain()).pid(), t.tid()));
    error!(
        "general protection fault: err={:#x} eip={:#010x} cs={:#x} (pid/tid {origin:?})",
        frame.info.error_code, frame.info.eip, frame.info.cs
    );
    panic!("Received General Protection Fault");
}
