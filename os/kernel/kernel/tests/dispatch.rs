mod common;

use common::{SCHEDULE_STACK, TestKernel, boot, boot_with, kernel_trap, spawn, user_trap};
use kernel::cpu::{CpuEvent, RecordingCpu};
use kernel::interrupts::gpf::GPF_VECTOR;
use kernel::interrupts::page_fault::PAGE_FAULT_VECTOR;
use kernel::interrupts::timer::{TIMER_VECTOR, reschedule_on_tick};
use kernel::{IsrStubs, KernelBuilder, Privilege, TrapTableError};
use kernel_alloc::phys_mapper::SimulatedRam;
use kernel_info::boot::MemoryRegion;
use kernel_info::segments::SYSCALL_VECTOR;
use kernel_memory_addresses::PhysicalAddress;
use kernel_task::TrapFrame;

fn answer(kernel: &mut TestKernel, _frame: &TrapFrame) {
    if let Some(frame) = kernel.current_frame_mut() {
        frame.regs.eax = 42;
    }
}

fn with_answer(builder: common::TestBuilder<'_>) -> common::TestBuilder<'_> {
    builder
        .handler(SYSCALL_VECTOR, answer, Privilege::User)
        .unwrap()
}

#[test]
fn software_trap_only_changes_eax() {
    let mut kernel = boot_with(with_answer);
    let (_, t) = spawn(&mut kernel, "caller");
    kernel.schedule();

    let mut frame = user_trap(&kernel, u32::from(SYSCALL_VECTOR));
    frame.info.eip = 0x0804_8123;
    frame.info.esp = 0xffff_a000;
    frame.regs.eax = 7;
    frame.regs.ebx = 5;
    frame.regs.edi = 0xdead_beef;
    let before = frame;

    kernel.dispatch(&mut frame);

    let mut expected = before;
    expected.regs.eax = 42;
    assert_eq!(frame, expected);
    assert_eq!(kernel.current_thread(), Some(t));
    assert_eq!(kernel.switches(), 1);
    assert!(RecordingCpu::stack_calls().is_empty());
}

#[test]
fn trap_entry_runs_on_the_kernel_space_and_schedule_stack() {
    let mut kernel = boot_with(with_answer);
    spawn(&mut kernel, "caller");
    kernel.schedule();
    kernel.cpu_mut().clear();

    let kernel_dir = kernel.kernel_space().directory().base().as_u32();
    let mut frame = user_trap(&kernel, u32::from(SYSCALL_VECTOR));
    kernel.dispatch(&mut frame);

    let events = kernel.cpu().events();
    assert_eq!(events[0], CpuEvent::KernelSegments);
    assert_eq!(events[1], CpuEvent::AddressSpace(kernel_dir));
    assert_eq!(events[2], CpuEvent::KernelStack(SCHEDULE_STACK.hi));
}

#[test]
fn boot_tick_on_schedule_stack_schedules_in_place() {
    let mut kernel = boot_with(|b| {
        b.handler(TIMER_VECTOR, reschedule_on_tick, Privilege::Kernel)
            .unwrap()
    });
    spawn(&mut kernel, "first");

    // a tick during boot, on the schedule stack: the scheduler runs in place
    let mut frame = kernel_trap(u32::from(TIMER_VECTOR), 0x0010_5000, SCHEDULE_STACK.hi - 0x20);
    kernel.dispatch(&mut frame);

    assert!(RecordingCpu::stack_calls().is_empty());
    assert!(kernel.current_thread().is_some());
    assert_eq!(frame.info.eip, common::ENTRY);
}

#[test]
fn idle_kernel_trap_is_resumed_in_place() {
    let mut kernel = boot_with(with_answer);
    let mut frame = kernel_trap(u32::from(SYSCALL_VECTOR), 0x0010_6000, SCHEDULE_STACK.hi - 0x20);
    kernel.dispatch(&mut frame);

    assert_eq!(frame.info.eip, 0x0010_6000);
    assert_eq!(frame.info.esp, SCHEDULE_STACK.hi - 0x20);
    assert_eq!(frame.info.eflags, 0x002);
}

#[test]
#[should_panic(expected = "unhandled interrupt 0x30")]
fn unregistered_vector_is_fatal() {
    let mut kernel = boot();
    let mut frame = kernel_trap(0x30, 0x0010_1000, SCHEDULE_STACK.hi - 0x10);
    kernel.dispatch(&mut frame);
}

#[test]
#[should_panic(expected = "stack underflow")]
fn kernel_esp_below_the_schedule_stack_is_fatal() {
    let mut kernel = boot_with(with_answer);
    let mut frame = kernel_trap(u32::from(SYSCALL_VECTOR), 0x0010_1000, SCHEDULE_STACK.lo - 4);
    kernel.dispatch(&mut frame);
}

#[test]
#[should_panic(expected = "kernel stack out of range")]
fn user_trap_off_the_thread_kernel_stack_is_fatal() {
    let mut kernel = boot_with(with_answer);
    spawn(&mut kernel, "caller");
    kernel.schedule();
    let mut frame = user_trap(&kernel, u32::from(SYSCALL_VECTOR));
    frame.regs.kernel_esp = SCHEDULE_STACK.hi - 4;
    kernel.dispatch(&mut frame);
}

#[test]
#[should_panic(expected = "trap from user mode without a current thread")]
fn user_trap_without_thread_is_fatal() {
    let mut kernel = boot_with(with_answer);
    let mut frame = kernel_trap(u32::from(SYSCALL_VECTOR), 0x0804_8000, SCHEDULE_STACK.hi - 4);
    frame.info.cs = 0x23;
    kernel.dispatch(&mut frame);
}

#[test]
#[should_panic(expected = "page fault at")]
fn page_fault_is_fatal() {
    let mut kernel = boot();
    spawn(&mut kernel, "faulty");
    kernel.schedule();
    kernel.cpu_mut().set_fault_address(0x0000_0010);
    let mut frame = user_trap(&kernel, u32::from(PAGE_FAULT_VECTOR));
    frame.info.error_code = 0b110;
    kernel.dispatch(&mut frame);
}

#[test]
#[should_panic(expected = "Received General Protection Fault")]
fn general_protection_fault_is_fatal() {
    let mut kernel = boot();
    spawn(&mut kernel, "faulty");
    kernel.schedule();
    let mut frame = user_trap(&kernel, u32::from(GPF_VECTOR));
    kernel.dispatch(&mut frame);
}

fn bare_builder(regions: &[MemoryRegion]) -> common::TestBuilder<'_> {
    let ram = SimulatedRam::new(PhysicalAddress::new(common::RAM_START), 16);
    KernelBuilder::new(RecordingCpu::new(), ram, regions)
}

#[test]
fn reserved_and_duplicate_registrations_are_rejected() {
    let regions: [MemoryRegion; 0] = [];
    let builder = bare_builder(&regions)
        .handler(TIMER_VECTOR, reschedule_on_tick, Privilege::Kernel)
        .unwrap();
    let err = builder
        .handler(TIMER_VECTOR, reschedule_on_tick, Privilege::Kernel)
        .err();
    assert_eq!(err, Some(TrapTableError::AlreadyRegistered(TIMER_VECTOR)));

    for reserved in [2, 15] {
        let err = bare_builder(&regions)
            .handler(reserved, reschedule_on_tick, Privilege::Kernel)
            .err();
        assert_eq!(err, Some(TrapTableError::Reserved(reserved)));
    }
}

#[test]
fn idt_gates_follow_registrations() {
    let kernel = boot_with(|b| {
        b.isr_stubs(IsrStubs::new(0x0010_0000, 23))
            .handler(SYSCALL_VECTOR, answer, Privilege::User)
            .unwrap()
    });
    let idt = kernel.traps().idt();

    // unregistered vectors still reach their stub, kernel only
    assert_eq!(idt[0x21].offset(), 0x0010_0000 + 0x21 * 23);
    assert_eq!(idt[0x21].selector(), 0x08);
    assert_eq!(idt[0x21].attr().into_bits(), 0x8E00);

    assert_eq!(idt[SYSCALL_VECTOR].attr().into_bits(), 0xEE00);
    assert_eq!(idt[GPF_VECTOR].attr().dpl(), 3);
    assert_eq!(idt[PAGE_FAULT_VECTOR].attr().dpl(), 0);
    assert!(!idt[2].attr().present());
    assert!(!idt[15].attr().present());
    assert!(kernel.traps().handler(PAGE_FAULT_VECTOR).is_registered());
    assert!(!kernel.traps().handler(0x21).is_registered());
}
