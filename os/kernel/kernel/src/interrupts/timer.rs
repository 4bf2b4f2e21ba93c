use crate::context::Kernel;
use crate::cpu::Cpu;
use kernel_task::TrapFrame;
use kernel_vmem::PhysMapper;

/// IRQ 0 after the PIC has been remapped to 0x20.
pub const TIMER_VECTOR: u8 = 0x20;

/// Tick handler: all the core needs from a timer is a reschedule at the end
/// of the trap. Acknowledging the interrupt controller is the driver's job.
pub fn reschedule_on_tick<C: Cpu, M: PhysMapper>(kernel: &mut Kernel<C, M>, _frame: &TrapFrame) {
    kernel.request_reschedule();
}
