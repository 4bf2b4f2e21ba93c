mod common;

use common::*;
use kernel::KernelBuilder;
use kernel::TrapTableError;
use kernel::cpu::{CpuEvent, RecordingCpu};
use kernel_alloc::phys_mapper::SimulatedRam;
use kernel_info::memory::{MIN_ALLOC, PAGE_SIZE};
use kernel_info::segments::{KERNEL_CS, SYSCALL_VECTOR, TLS_START};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_syscall::task::{CLONE_SETTLS, CLONE_THREAD, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};
use kernel_task::{TrapFrame, UserDesc};

const PROT_RW: u32 = 0x3;
const MAP_PRIVATE_ANON: u32 = 0x22;
const MAP_FIXED_ANON: u32 = 0x32;
const CLONE_VM: u32 = 0x100;
const TLS_FLAGS: u32 = 0x51;

#[test]
fn unknown_numbers_return_enosys() {
    let mut kernel = boot();
    spawn(&mut kernel, "p");
    kernel.schedule();

    let frame = call(&mut kernel, 4, [1, 0x0804_8000, 5, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(38));
    assert_eq!(frame.regs.eax, 0xffff_ffda);
    assert_eq!((frame.regs.ebx, frame.regs.ecx, frame.regs.edx), (1, 0x0804_8000, 5));
}

#[test]
fn pid_and_tid_name_the_caller() {
    let mut kernel = boot();
    spawn(&mut kernel, "first");
    let (d, main) = spawn(&mut kernel, "second");
    let worker = kernel.create_thread(d, 0x2000_0000, None);
    kernel.schedule();
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(worker));

    let pid = call(&mut kernel, SYS_GETPID, [0; 6]).regs.eax;
    let tid = call(&mut kernel, SYS_GETTID, [0; 6]).regs.eax;
    assert_eq!(pid, kernel.tasks().domain(d).pid());
    assert_eq!(tid, kernel.tasks().thread(worker).tid());
    assert_ne!(tid, kernel.tasks().thread(main).tid());
}

#[test]
fn brk_grows_the_heap_but_never_shrinks_it() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();
    let start = ENTRY + DATA_SIZE;

    assert_eq!(call(&mut kernel, SYS_BRK, [0; 6]).regs.eax, start);

    let grown = call(&mut kernel, SYS_BRK, [start + 0x1800, 0, 0, 0, 0, 0]).regs.eax;
    assert_eq!(grown, start + 0x1800);
    let space = &kernel.tasks().domain(d).space;
    assert!(space.is_range_accessible(kernel.mem(), VirtualAddress::new(start), 2 * PAGE_SIZE));
    assert!(space.entry(kernel.mem(), VirtualAddress::new(start + PAGE_SIZE)).flags().writable());
    poke(&kernel, d, start + 0x17fc, &0xabcd_u32);

    assert_eq!(call(&mut kernel, SYS_BRK, [start, 0, 0, 0, 0, 0]).regs.eax, grown);
    assert_eq!(call(&mut kernel, SYS_BRK, [0xffff_0000, 0, 0, 0, 0, 0]).regs.eax, grown);
    assert_eq!(peek::<u32>(&kernel, d, start + 0x17fc), 0xabcd);
}

#[test]
fn anonymous_mappings_are_placed_above_min_alloc() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();
    let before = kernel.mem().allocated_pages();

    let first = call(&mut kernel, SYS_MMAP2, [0, 0x2800, PROT_RW, MAP_PRIVATE_ANON, u32::MAX, 0]).regs.eax;
    assert_eq!(first, MIN_ALLOC);
    let second = call(&mut kernel, SYS_MMAP2, [0, PAGE_SIZE, PROT_RW, MAP_PRIVATE_ANON, u32::MAX, 0]).regs.eax;
    assert_eq!(second, MIN_ALLOC + 3 * PAGE_SIZE);
    assert_eq!(kernel.mem().allocated_pages(), before + 4);

    let space = &kernel.tasks().domain(d).space;
    assert!(space.is_range_accessible(kernel.mem(), VirtualAddress::new(first), 3 * PAGE_SIZE));
    assert_eq!(peek::<u32>(&kernel, d, first + 0x2ffc), 0);

    assert_eq!(call(&mut kernel, SYS_MUNMAP, [first, 0x2800, 0, 0, 0, 0]).regs.eax, 0);
    assert_eq!(kernel.mem().allocated_pages(), before + 1);
    let space = &kernel.tasks().domain(d).space;
    assert!(space.translate(kernel.mem(), VirtualAddress::new(first)).is_none());
    assert!(space.translate(kernel.mem(), VirtualAddress::new(second)).is_some());
}

#[test]
fn read_only_mappings_are_not_writable() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();

    let addr = call(&mut kernel, SYS_MMAP2, [0, PAGE_SIZE, 0x1, MAP_PRIVATE_ANON, u32::MAX, 0]).regs.eax;
    let space = &kernel.tasks().domain(d).space;
    assert!(space.translate(kernel.mem(), VirtualAddress::new(addr)).is_some());
    assert!(!space.entry(kernel.mem(), VirtualAddress::new(addr)).flags().writable());
}

#[test]
fn invalid_mapping_requests_are_rejected() {
    let mut kernel = boot();
    spawn(&mut kernel, "p");
    kernel.schedule();
    let before = kernel.mem().allocated_pages();

    // file-backed
    let frame = call(&mut kernel, SYS_MMAP2, [0, PAGE_SIZE, PROT_RW, 0x02, 3, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    // empty
    let frame = call(&mut kernel, SYS_MMAP2, [0, 0, PROT_RW, MAP_PRIVATE_ANON, u32::MAX, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    // inside the kernel-reserved region
    let frame = call(&mut kernel, SYS_MMAP2, [0x0010_0000, PAGE_SIZE, PROT_RW, MAP_FIXED_ANON, u32::MAX, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    let frame = call(&mut kernel, SYS_MUNMAP, [0x0010_0000, PAGE_SIZE, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    // misaligned
    let frame = call(&mut kernel, SYS_MUNMAP, [ENTRY + 4, PAGE_SIZE, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));

    assert_eq!(kernel.mem().allocated_pages(), before);
}

#[test]
fn fixed_mappings_replace_user_pages_only() {
    let mut kernel = boot();
    let (d, t) = spawn(&mut kernel, "p");
    kernel.schedule();
    poke(&kernel, d, ENTRY + 0x10, &0x1234_5678_u32);
    let before = kernel.mem().allocated_pages();

    let frame = call(&mut kernel, SYS_MMAP2, [ENTRY, PAGE_SIZE, PROT_RW, MAP_FIXED_ANON, u32::MAX, 0]);
    assert_eq!(frame.regs.eax, ENTRY);
    assert_eq!(peek::<u32>(&kernel, d, ENTRY + 0x10), 0);
    assert_eq!(kernel.mem().allocated_pages(), before);

    // the thread's kernel stack is mapped into the domain, kernel only
    let stack = kernel.tasks().thread(t).kernel_stack.lo;
    let frame = call(&mut kernel, SYS_MMAP2, [stack, PAGE_SIZE, PROT_RW, MAP_FIXED_ANON, u32::MAX, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    let frame = call(&mut kernel, SYS_MUNMAP, [stack, PAGE_SIZE, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, 0);
    assert!(
        kernel
            .tasks()
            .domain(d)
            .space
            .entry(kernel.mem(), VirtualAddress::new(stack))
            .is_present()
    );
}

#[test]
fn clone_starts_a_thread_in_the_same_domain() {
    let mut kernel = boot();
    let (d, parent) = spawn(&mut kernel, "p");
    kernel.schedule();

    let frame = call(&mut kernel, SYS_CLONE, [CLONE_VM, 0x2000_0000, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    assert_eq!(kernel.tasks().domain(d).thread_count(), 1);

    let flags = CLONE_VM | CLONE_THREAD;
    let tid = call(&mut kernel, SYS_CLONE, [flags, 0x2000_0000, 0, 0, 0, 0]).regs.eax;
    assert_eq!(returned(&kernel, parent), tid);
    assert_eq!(kernel.tasks().domain(d).thread_count(), 2);

    kernel.schedule();
    let child = kernel.current_thread().unwrap();
    assert_ne!(child, parent);
    let thread = kernel.tasks().thread(child);
    assert_eq!(thread.tid(), tid);
    assert_eq!(thread.domain(), d);
    assert_eq!(thread.context.user.regs.eax, 0);
    assert_eq!(thread.context.user.info.esp, 0x2000_0000);
    assert_eq!(thread.context.user.info.eip, ENTRY);
}

#[test]
fn clone_can_install_a_tls_descriptor_for_the_child() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();
    let desc = UserDesc {
        entry_number: 17,
        base_addr: 0x1234_0000,
        limit: 0xfffff,
        flags: TLS_FLAGS,
    };
    poke(&kernel, d, ENTRY + 0x100, &desc);

    let flags = CLONE_VM | CLONE_THREAD | CLONE_SETTLS;
    call(&mut kernel, SYS_CLONE, [flags, 0x2000_0000, 0, ENTRY + 0x100, 0, 0]);
    kernel.cpu_mut().clear();
    kernel.schedule();
    assert_eq!(kernel.cpu().events().last(), Some(&CpuEvent::LoadTls(vec![0x1234_0000])));

    // slot numbers outside the thread-owned range are refused up front
    poke(&kernel, d, ENTRY + 0x100, &UserDesc { entry_number: 3, ..desc });
    let frame = call(&mut kernel, SYS_CLONE, [flags, 0x2100_0000, 0, ENTRY + 0x100, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));
    assert_eq!(kernel.tasks().domain(d).thread_count(), 2);
}

#[test]
fn futex_wait_blocks_until_woken() {
    let mut kernel = boot();
    let (d, waiter) = spawn(&mut kernel, "p");
    kernel.schedule();
    let waker = kernel.create_thread(d, 0x2000_0000, None);
    let word = ENTRY + 0x10;
    poke(&kernel, d, word, &5_u32);
    kernel.tasks_mut().thread_mut(waker).context.user.regs.eax = 0x77;

    // the word moved on: no sleep
    let wait = FUTEX_WAIT | FUTEX_PRIVATE_FLAG;
    let frame = call(&mut kernel, SYS_FUTEX, [word, wait, 4, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(11));
    assert_eq!(kernel.current_thread(), Some(waiter));

    let frame = call(&mut kernel, SYS_FUTEX, [word, wait, 5, 0, 0, 0]);
    assert!(kernel.tasks().thread(waiter).is_blocked());
    assert!(kernel.tasks().thread(waiter).wait_address.is_some());
    assert_eq!(returned(&kernel, waiter), 0);
    assert_eq!(kernel.current_thread(), Some(waker));
    assert_eq!(frame.regs.eax, 0x77);

    let wake = FUTEX_WAKE | FUTEX_PRIVATE_FLAG;
    let other_word = call(&mut kernel, SYS_FUTEX, [word + 4, wake, 1, 0, 0, 0]).regs.eax;
    assert_eq!(other_word, 0);
    assert!(kernel.tasks().thread(waiter).is_blocked());

    let woken = call(&mut kernel, SYS_FUTEX, [word, wake, i32::MAX.cast_unsigned(), 0, 0, 0]).regs.eax;
    assert_eq!(woken, 1);
    let thread = kernel.tasks().thread(waiter);
    assert!(!thread.is_blocked());
    assert!(thread.wait_address.is_none());
}

#[test]
fn unsupported_futex_requests_fail() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();
    poke(&kernel, d, ENTRY, &0_u32);

    // shared
    let frame = call(&mut kernel, SYS_FUTEX, [ENTRY, FUTEX_WAIT, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(38));
    // timed
    let frame = call(&mut kernel, SYS_FUTEX, [ENTRY, FUTEX_WAIT | FUTEX_PRIVATE_FLAG, 0, ENTRY + 0x20, 0, 0]);
    assert_eq!(frame.regs.eax, errno(38));
    // unmapped
    let frame = call(&mut kernel, SYS_FUTEX, [0x3000_0000, FUTEX_WAKE | FUTEX_PRIVATE_FLAG, 1, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(14));
    // misaligned
    let frame = call(&mut kernel, SYS_FUTEX, [ENTRY + 2, FUTEX_WAKE | FUTEX_PRIVATE_FLAG, 1, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));
}

#[test]
fn set_thread_area_picks_and_reports_free_slots() {
    let mut kernel = boot();
    let (d, _) = spawn(&mut kernel, "p");
    kernel.schedule();
    let desc_va = ENTRY + 0x200;
    let desc = UserDesc {
        entry_number: UserDesc::ANY_SLOT,
        base_addr: 0x0804_9000,
        limit: 0xfffff,
        flags: TLS_FLAGS,
    };
    poke(&kernel, d, desc_va, &desc);
    kernel.cpu_mut().clear();

    assert_eq!(call(&mut kernel, SYS_SET_THREAD_AREA, [desc_va, 0, 0, 0, 0, 0]).regs.eax, 0);
    let slot = TLS_START as u32;
    assert_eq!(peek::<UserDesc>(&kernel, d, desc_va).entry_number, slot);
    // loaded right away for the running thread
    assert!(kernel.cpu().events().contains(&CpuEvent::LoadTls(vec![0x0804_9000])));

    poke(&kernel, d, desc_va, &UserDesc { base_addr: 0x0804_9800, ..desc });
    call(&mut kernel, SYS_SET_THREAD_AREA, [desc_va, 0, 0, 0, 0, 0]);
    assert_eq!(peek::<UserDesc>(&kernel, d, desc_va).entry_number, slot + 1);

    poke(&kernel, d, desc_va, &UserDesc { entry_number: 3, ..desc });
    let frame = call(&mut kernel, SYS_SET_THREAD_AREA, [desc_va, 0, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(22));

    let frame = call(&mut kernel, SYS_SET_THREAD_AREA, [0x3000_0000, 0, 0, 0, 0, 0]);
    assert_eq!(frame.regs.eax, errno(14));
}

#[test]
fn exit_leaves_the_other_threads_running() {
    let mut kernel = boot();
    let (d, main) = spawn(&mut kernel, "p");
    let worker = kernel.create_thread(d, 0x2000_0000, None);
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(worker));
    kernel.tasks_mut().thread_mut(main).context.user.regs.eax = 0x77;

    let frame = call(&mut kernel, SYS_EXIT, [0; 6]);

    assert!(!kernel.tasks().contains_thread(worker));
    assert_eq!(kernel.current_thread(), Some(main));
    assert_eq!(kernel.tasks().domain(d).thread_count(), 1);
    // resumes the survivor, whose registers the exit did not touch
    assert_eq!(frame.regs.eax, 0x77);
    assert_eq!(returned(&kernel, main), 0x77);
}

#[test]
fn exit_group_ends_the_whole_domain() {
    let mut kernel = boot();
    let (keeper, tk) = spawn(&mut kernel, "keeper");
    let before = kernel.mem().allocated_pages();
    let (doomed, td) = spawn(&mut kernel, "doomed");
    let extra = kernel.create_thread(doomed, 0x2000_0000, None);
    kernel.schedule();
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(extra));

    call(&mut kernel, SYS_EXIT_GROUP, [0; 6]);

    assert!(!kernel.tasks().contains_domain(doomed));
    assert!(!kernel.tasks().contains_thread(td));
    assert!(!kernel.tasks().contains_thread(extra));
    assert_eq!(kernel.tasks().current_domain(), Some(keeper));
    assert_eq!(kernel.current_thread(), Some(tk));
    assert_eq!(kernel.mem().allocated_pages(), before);
}

#[test]
fn sched_yield_hands_over_to_the_next_domain() {
    let mut kernel = boot();
    let (_, ta) = spawn(&mut kernel, "a");
    let (_, tb) = spawn(&mut kernel, "b");
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(ta));

    let frame = call(&mut kernel, SYS_SCHED_YIELD, [0; 6]);
    assert_eq!(kernel.current_thread(), Some(tb));
    assert_eq!(returned(&kernel, ta), 0);
    assert_eq!(frame.info.eip, ENTRY);
}

#[test]
#[should_panic(expected = "system call from kernel context")]
fn system_call_from_kernel_code_is_fatal() {
    let mut kernel = boot();
    let mut frame = TrapFrame::default();
    frame
        .info
        .set_vector(u32::from(SYSCALL_VECTOR))
        .set_cs(u32::from(KERNEL_CS))
        .set_eip(0x0010_4000)
        .set_esp(SCHEDULE_STACK.hi - 0x20);
    frame.regs.set_eax(SYS_GETPID).set_kernel_esp(SCHEDULE_STACK.hi - 0x20);
    kernel.dispatch(&mut frame);
}

#[test]
fn the_gate_is_registered_once_for_user_mode() {
    let kernel = boot();
    let gate = &kernel.traps().idt()[SYSCALL_VECTOR];
    assert_eq!(gate.attr().dpl(), 3);
    assert!(kernel.traps().handler(SYSCALL_VECTOR).is_registered());

    let ram = SimulatedRam::new(PhysicalAddress::new(0x0400_0000), 16);
    let regions = ram.regions();
    let builder = kernel_syscall::install(KernelBuilder::new(RecordingCpu::new(), ram, &regions)).unwrap();
    assert_eq!(
        kernel_syscall::install(builder).err(),
        Some(TrapTableError::AlreadyRegistered(SYSCALL_VECTOR))
    );
}
