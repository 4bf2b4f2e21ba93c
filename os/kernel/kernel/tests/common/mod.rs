#![allow(dead_code)]

use kernel::cpu::RecordingCpu;
use kernel::{Kernel, KernelBuilder, ProgramImage};
use kernel_alloc::phys_mapper::SimulatedRam;
use kernel_info::segments::KERNEL_CS;
use kernel_memory_addresses::PhysicalAddress;
use kernel_task::{DomainId, StackBounds, ThreadId, TrapFrame, UserSegments};

pub type TestKernel = Kernel<RecordingCpu, SimulatedRam>;
pub type TestBuilder<'a> = KernelBuilder<'a, RecordingCpu, SimulatedRam>;

pub const RAM_START: u32 = 0x0400_0000;
pub const RAM_FRAMES: u32 = 512;
pub const SCHEDULE_STACK: StackBounds = StackBounds::new(0x0020_0000, 0x0020_4000);
pub const ENTRY: u32 = 0x0804_8000;
pub const USER_SEGMENTS: UserSegments = UserSegments {
    cs: 0x20,
    ss: 0x28,
    ds: 0x28,
    es: 0x28,
    fs: 0x28,
    gs: 0x28,
};

/// A kernel on fresh simulated RAM, with `setup` applied to the builder.
pub fn boot_with(setup: impl FnOnce(TestBuilder<'_>) -> TestBuilder<'_>) -> TestKernel {
    let ram = SimulatedRam::new(PhysicalAddress::new(RAM_START), RAM_FRAMES);
    let regions = ram.regions();
    let builder = KernelBuilder::new(RecordingCpu::new(), ram, &regions)
        .schedule_stack(SCHEDULE_STACK)
        .user_segments(USER_SEGMENTS)
        .thread_trampoline(0x0010_2000);
    setup(builder).build()
}

pub fn boot() -> TestKernel {
    boot_with(|b| b)
}

/// Start an argument-less program with no segments.
pub fn spawn(kernel: &mut TestKernel, name: &str) -> (DomainId, ThreadId) {
    let image = ProgramImage {
        entry: ENTRY,
        ..ProgramImage::default()
    };
    kernel.start_program(name, &image).expect("valid image")
}

/// What the entry stub pushes for a trap from the current thread's user
/// code: its saved user state plus the vector, landing near the top of its
/// kernel stack.
pub fn user_trap(kernel: &TestKernel, vector: u32) -> TrapFrame {
    let id = kernel.current_thread().expect("a current thread");
    let thread = kernel.tasks().thread(id);
    let mut frame = thread.context.user;
    frame.info.vector = vector;
    frame.regs.kernel_esp = thread.kernel_stack.hi - 0x40;
    frame
}

/// A trap taken while kernel code was running on `stack`.
pub fn kernel_trap(vector: u32, eip: u32, kernel_esp: u32) -> TrapFrame {
    let mut frame = TrapFrame::default();
    frame
        .info
        .set_vector(vector)
        .set_eip(eip)
        .set_cs(u32::from(KERNEL_CS))
        .set_eflags(0x202)
        .set_esp(kernel_esp);
    frame.regs.kernel_esp = kernel_esp;
    frame
}

pub fn directory_of(kernel: &TestKernel, domain: DomainId) -> u32 {
    kernel
        .tasks()
        .domain(domain)
        .space
        .directory()
        .base()
        .as_u32()
}
