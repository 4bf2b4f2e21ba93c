mod common;

use common::{ENTRY, SCHEDULE_STACK, TestKernel, boot, spawn};
use kernel::cpu::RecordingCpu;
use kernel::{ProgramError, ProgramImage, ProgramSegment};
use kernel_info::memory::{PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP};
use kernel_memory_addresses::VirtualAddress;
use kernel_task::DomainId;
use kernel_vmem::user::{UserAccessError, read_bytes, read_value, write_value};

fn read_word(kernel: &TestKernel, domain: DomainId, va: u32) -> u32 {
    let space = &kernel.tasks().domain(domain).space;
    read_value(space, kernel.mem(), VirtualAddress::new(va)).expect("readable user word")
}

fn read_cstr(kernel: &TestKernel, domain: DomainId, va: u32, len: usize) -> Vec<u8> {
    let space = &kernel.tasks().domain(domain).space;
    let mut buf = vec![0; len + 1];
    read_bytes(space, kernel.mem(), VirtualAddress::new(va), &mut buf).expect("readable string");
    buf
}

#[test]
fn program_image_is_laid_out_for_entry() {
    let text = [0x90_u8; 0x1200];
    let segments = [
        ProgramSegment {
            vaddr: 0x0804_8000,
            data: &text,
            mem_size: 0x1800,
            writable: false,
        },
        ProgramSegment {
            vaddr: 0x0804_a010,
            data: &[1, 2, 3],
            mem_size: 0x1ff0,
            writable: true,
        },
    ];
    let image = ProgramImage {
        entry: 0x0804_8080,
        segments: &segments,
        args: &[b"init", b"-v"],
        env: &[b"HOME=/"],
    };

    let mut kernel = boot();
    let (d, t) = kernel.start_program("init", &image).unwrap();

    let space = &kernel.tasks().domain(d).space;
    assert_eq!(space.brk().as_u32(), 0x0804_c000);
    assert!(!space.entry(kernel.mem(), VirtualAddress::new(0x0804_9000)).flags().writable());
    assert!(space.entry(kernel.mem(), VirtualAddress::new(0x0804_b000)).flags().writable());

    // file bytes, then zero fill
    let mut head = [0; 4];
    read_bytes(space, kernel.mem(), VirtualAddress::new(0x0804_91fe), &mut head).unwrap();
    assert_eq!(head, [0x90, 0x90, 0, 0]);
    assert_eq!(read_word(&kernel, d, 0x0804_a010), 0x0003_0201);

    // read-only text cannot be written through the user path
    assert_eq!(
        write_value(space, kernel.mem(), VirtualAddress::new(0x0804_8000), &0_u32),
        Err(UserAccessError::Fault {
            address: VirtualAddress::new(0x0804_8000)
        })
    );

    // the whole stack is mapped, nothing below it
    let bottom = USER_STACK_TOP - USER_STACK_SIZE;
    assert!(space.is_range_accessible(kernel.mem(), VirtualAddress::new(bottom), USER_STACK_SIZE));
    assert!(space.translate(kernel.mem(), VirtualAddress::new(bottom - PAGE_SIZE)).is_none());

    // argc, argv, NULL, envp, NULL at the initial stack pointer
    let sp = USER_STACK_TOP - PAGE_SIZE;
    assert_eq!(read_word(&kernel, d, sp), 2);
    let argv0 = read_word(&kernel, d, sp + 4);
    let argv1 = read_word(&kernel, d, sp + 8);
    assert_eq!(read_word(&kernel, d, sp + 12), 0);
    let envp0 = read_word(&kernel, d, sp + 16);
    assert_eq!(read_word(&kernel, d, sp + 20), 0);

    assert_eq!(argv0, USER_STACK_TOP - 5);
    assert_eq!(read_cstr(&kernel, d, argv0, 4), b"init\0");
    assert_eq!(read_cstr(&kernel, d, argv1, 2), b"-v\0");
    assert_eq!(read_cstr(&kernel, d, envp0, 6), b"HOME=/\0");

    let thread = kernel.tasks().thread(t);
    assert_eq!(thread.context.user.info.eip, 0x0804_8080);
    assert_eq!(thread.context.user.info.esp, sp);
    assert_eq!(thread.user_stack.hi, USER_STACK_TOP);
    assert_eq!(thread.user_stack.lo, bottom);
    assert_eq!(kernel.tasks().domain(d).name().as_str(), "init");
}

#[test]
fn invalid_images_allocate_nothing() {
    let mut kernel = boot();
    let before = kernel.mem().allocated_pages();

    let segments = [ProgramSegment {
        vaddr: 0x0000_1000,
        data: &[],
        mem_size: PAGE_SIZE,
        writable: true,
    }];
    let image = ProgramImage {
        entry: 0x1000,
        segments: &segments,
        ..ProgramImage::default()
    };
    assert_eq!(
        kernel.start_program("bad", &image),
        Err(ProgramError::BadSegment { vaddr: 0x1000 })
    );
    assert_eq!(kernel.mem().allocated_pages(), before);
    assert_eq!(kernel.tasks().domain_count(), 0);
}

#[test]
fn new_threads_get_kernel_and_user_contexts() {
    let mut kernel = boot();
    let (d, main) = spawn(&mut kernel, "d");
    let worker = kernel.create_thread(d, 0x2000_0000, None);

    let thread = kernel.tasks().thread(worker);
    assert_eq!(thread.kernel_stack.hi - thread.kernel_stack.lo, PAGE_SIZE);
    assert_eq!(thread.user_stack.hi, 0x2000_0000);
    assert_eq!(thread.user_stack.lo, 0x2000_0000 - USER_STACK_SIZE);

    let kernel_ctx = thread.context.kernel.info;
    assert_eq!(kernel_ctx.eip, 0x0010_2000);
    assert_eq!(kernel_ctx.esp, thread.kernel_stack.hi);
    assert_eq!((kernel_ctx.cs, kernel_ctx.ss, kernel_ctx.eflags), (0x08, 0x10, 0x2));
    assert_eq!(thread.context.kernel.regs.gs, 0x18);

    let user = thread.context.user;
    assert_eq!((user.info.cs, user.info.ss, user.info.eflags), (0x23, 0x2b, 0x202));
    assert_eq!((user.regs.ds, user.regs.gs), (0x2b, 0x2b));
    assert_eq!(user.info.esp, 0x2000_0000);
    assert!(!thread.context.in_kernel);

    // kernel stack and control block are kernel-only pages of the domain
    let space = &kernel.tasks().domain(d).space;
    let stack = VirtualAddress::new(thread.kernel_stack.lo);
    assert!(space.entry(kernel.mem(), stack).is_present());
    assert!(space.translate(kernel.mem(), stack).is_none());

    assert_eq!(kernel.tasks().domain(d).thread_count(), 2);
    assert_ne!(kernel.tasks().thread(main).tid(), thread.tid());
}

#[test]
fn clone_resumes_where_the_parent_trapped() {
    let mut kernel = boot();
    let (d, parent) = spawn(&mut kernel, "d");
    {
        let user = &mut kernel.tasks_mut().thread_mut(parent).context.user;
        user.info.eip = 0x0804_8abc;
        user.info.esp = 0xffff_b8f0;
        user.regs.eax = 120;
        user.regs.ebx = 0x11;
    }

    let shared = kernel.create_thread(d, 0, Some(parent));
    let child = kernel.tasks().thread(shared);
    assert_eq!(child.context.user.info.eip, 0x0804_8abc);
    assert_eq!(child.context.user.info.esp, 0xffff_b8f0);
    assert_eq!(child.context.user.regs.eax, 0);
    assert_eq!(child.context.user.regs.ebx, 0x11);
    assert_eq!(child.user_stack, kernel.tasks().thread(parent).user_stack);

    let own = kernel.create_thread(d, 0x3000_0000, Some(parent));
    let child = kernel.tasks().thread(own);
    assert_eq!(child.context.user.info.eip, 0x0804_8abc);
    assert_eq!(child.context.user.info.esp, 0x3000_0000);
    assert_eq!(child.user_stack.hi, 0x3000_0000);
}

#[test]
fn exiting_one_of_several_threads_keeps_the_domain() {
    let mut kernel = boot();
    let (d, main) = spawn(&mut kernel, "d");
    let before = kernel.mem().allocated_pages();
    let worker = kernel.create_thread(d, 0, Some(main));
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(worker));

    kernel.exit_thread(worker);

    assert!(!kernel.tasks().contains_thread(worker));
    assert_eq!(kernel.current_thread(), Some(main));
    assert_eq!(kernel.tasks().domain(d).thread_count(), 1);
    // the page table covering the freed pages stays with the domain
    assert_eq!(kernel.mem().allocated_pages(), before);
    assert_eq!(RecordingCpu::stack_calls(), [SCHEDULE_STACK.hi]);
}

#[test]
fn exiting_the_last_thread_tears_the_domain_down() {
    let mut kernel = boot();
    let (keeper, tk) = spawn(&mut kernel, "keeper");
    let before = kernel.mem().allocated_pages();

    let (doomed, td) = spawn(&mut kernel, "doomed");
    let extra = kernel.create_thread(doomed, 0x2000_0000, None);
    kernel.schedule();
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(extra));
    assert!(kernel.mem().allocated_pages() > before);

    kernel.exit_thread(td);
    assert_eq!(kernel.current_thread(), Some(tk));
    assert!(kernel.tasks().contains_domain(doomed));

    kernel.exit_thread(extra);

    assert!(!kernel.tasks().contains_domain(doomed));
    assert!(kernel.tasks().domains().all(|d| d != doomed));
    assert_eq!(kernel.tasks().domain_count(), 1);
    assert_eq!(kernel.mem().allocated_pages(), before);
    assert_eq!(kernel.tasks().current_domain(), Some(keeper));
    assert_eq!(kernel.current_thread(), Some(tk));
    assert_eq!(kernel.tasks().thread(tk).context.user.info.eip, ENTRY);
}

#[test]
fn exiting_the_current_domain_hands_over_to_its_successor() {
    let mut kernel = boot();
    let (a, ta) = spawn(&mut kernel, "a");
    let (b, _) = spawn(&mut kernel, "b");
    let (c, tc) = spawn(&mut kernel, "c");
    kernel.schedule();
    kernel.schedule();
    assert_eq!(kernel.tasks().current_domain(), Some(b));

    kernel.exit_domain(b);

    assert_eq!(kernel.tasks().current_domain(), Some(c));
    assert_eq!(kernel.current_thread(), Some(tc));
    kernel.schedule();
    assert_eq!(kernel.current_thread(), Some(ta));
    assert_eq!(kernel.tasks().domains().collect::<Vec<_>>(), [a, c]);
}

#[test]
fn exit_domain_takes_blocked_threads_along() {
    let mut kernel = boot();
    spawn(&mut kernel, "keeper");
    let before = kernel.mem().allocated_pages();
    let (doomed, main) = spawn(&mut kernel, "doomed");
    let sleeper = kernel.create_thread(doomed, 0x2000_0000, None);
    kernel.park(sleeper);

    kernel.exit_domain(doomed);

    assert!(!kernel.tasks().contains_thread(main));
    assert!(!kernel.tasks().contains_thread(sleeper));
    assert_eq!(kernel.mem().allocated_pages(), before);
}
