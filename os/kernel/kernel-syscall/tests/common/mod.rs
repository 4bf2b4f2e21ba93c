#![allow(dead_code)]

use kernel::cpu::RecordingCpu;
use kernel::{Kernel, KernelBuilder, ProgramImage, ProgramSegment};
use kernel_alloc::phys_mapper::SimulatedRam;
use kernel_info::segments::SYSCALL_VECTOR;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_task::{DomainId, StackBounds, ThreadId, TrapFrame, UserSegments};
use kernel_vmem::user::{UserPod, read_value, write_value};

pub type TestKernel = Kernel<RecordingCpu, SimulatedRam>;

pub const SCHEDULE_STACK: StackBounds = StackBounds::new(0x0020_0000, 0x0020_4000);
pub const ENTRY: u32 = 0x0804_8000;
/// Two writable pages at [`ENTRY`]; the break starts right above them.
pub const DATA_SIZE: u32 = 0x2000;

pub const SYS_EXIT: u32 = 1;
pub const SYS_GETPID: u32 = 20;
pub const SYS_BRK: u32 = 45;
pub const SYS_MUNMAP: u32 = 91;
pub const SYS_CLONE: u32 = 120;
pub const SYS_SCHED_YIELD: u32 = 158;
pub const SYS_MMAP2: u32 = 192;
pub const SYS_GETTID: u32 = 224;
pub const SYS_FUTEX: u32 = 240;
pub const SYS_SET_THREAD_AREA: u32 = 243;
pub const SYS_EXIT_GROUP: u32 = 252;

pub const fn errno(code: u32) -> u32 {
    code.wrapping_neg()
}

pub fn boot() -> TestKernel {
    let ram = SimulatedRam::new(PhysicalAddress::new(0x0400_0000), 512);
    let regions = ram.regions();
    let builder = KernelBuilder::new(RecordingCpu::new(), ram, &regions)
        .schedule_stack(SCHEDULE_STACK)
        .user_segments(UserSegments {
            cs: 0x20,
            ss: 0x28,
            ds: 0x28,
            es: 0x28,
            fs: 0x28,
            gs: 0x28,
        })
        .thread_trampoline(0x0010_2000);
    kernel_syscall::install(builder)
        .expect("syscall gate is free")
        .build()
}

/// Start a program whose image is [`DATA_SIZE`] bytes of zeroed, writable
/// memory at [`ENTRY`].
pub fn spawn(kernel: &mut TestKernel, name: &str) -> (DomainId, ThreadId) {
    let segments = [ProgramSegment {
        vaddr: ENTRY,
        data: &[],
        mem_size: DATA_SIZE,
        writable: true,
    }];
    let image = ProgramImage {
        entry: ENTRY,
        segments: &segments,
        ..ProgramImage::default()
    };
    kernel.start_program(name, &image).expect("valid image")
}

/// Issue system call `nr` from the current thread, the way `int 0x80`
/// enters the kernel, and return the frame the dispatcher resumes.
pub fn call(kernel: &mut TestKernel, nr: u32, args: [u32; 6]) -> TrapFrame {
    let id = kernel.current_thread().expect("a current thread");
    let thread = kernel.tasks().thread(id);
    let mut frame = thread.context.user;
    frame.info.vector = u32::from(SYSCALL_VECTOR);
    frame.regs.kernel_esp = thread.kernel_stack.hi - 0x40;
    frame
        .regs
        .set_eax(nr)
        .set_ebx(args[0])
        .set_ecx(args[1])
        .set_edx(args[2])
        .set_esi(args[3])
        .set_edi(args[4])
        .set_ebp(args[5]);
    kernel.dispatch(&mut frame);
    frame
}

/// EAX as `id` will see it when it next runs.
pub fn returned(kernel: &TestKernel, id: ThreadId) -> u32 {
    kernel.tasks().thread(id).context.user.regs.eax
}

pub fn poke<T: UserPod>(kernel: &TestKernel, domain: DomainId, va: u32, value: &T) {
    let space = &kernel.tasks().domain(domain).space;
    write_value(space, kernel.mem(), VirtualAddress::new(va), value).expect("writable user memory");
}

pub fn peek<T: UserPod>(kernel: &TestKernel, domain: DomainId, va: u32) -> T {
    let space = &kernel.tasks().domain(domain).space;
    read_value(space, kernel.mem(), VirtualAddress::new(va)).expect("readable user memory")
}
