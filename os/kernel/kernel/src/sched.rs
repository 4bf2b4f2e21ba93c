//! # Scheduling and Context Switch
//!
//! Round robin over domains, then over the running threads of the chosen
//! domain:
//!
//! ```text
//!   all domains:  ┌──► D0 ──► D1 ──► D2 ──┐      current domain D0
//!                 └───────────────────────┘      ⇒ look at D1 first
//!
//!   D1.running:   ┌──► t3 ──► t5 ──┐             cursor advances on
//!                 └────────────────┘             every pick
//!   D1.blocked:   t4
//! ```
//!
//! Thread and domain teardown, and scheduling out of a thread's kernel stack,
//! run on the dedicated schedule stack, so the stack being freed is never
//! the one in use.

use crate::context::Kernel;
use crate::cpu::Cpu;
use kernel_info::memory::{KERNEL_STACK_SIZE, USER_STACK_SIZE};
use kernel_info::segments::{KERNEL_CS, KERNEL_DS, KERNEL_GS};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_registers::eflags::Eflags;
use kernel_task::{
    ControlBlock, DomainId, StackBounds, Thread, ThreadId, TlsTable, TrapFrame, UserSegments,
};
use kernel_vmem::{PageEntryBits, PhysMapper, PhysMemory};
use log::{debug, error, trace};

impl<C: Cpu, M: PhysMapper> Kernel<C, M> {
    /// Pick the next thread to run and switch to it.
    ///
    /// Starts with the domain after the current one (the ring head if there
    /// is none) and takes the first thread of its running ring that is not
    /// blocked; failing that, moves on through the domain ring until every
    /// domain has been looked at once.
    ///
    /// # Panics
    /// If no domain has a runnable thread.
    pub fn schedule(&mut self) {
        let start = match self.tasks.current_domain() {
            Some(current) => self.tasks.next_domain(current),
            None => self.tasks.first_domain(),
        };

        let mut candidate = start;
        while let Some(domain) = candidate {
            if let Some(thread) = self.tasks.next_runnable(domain) {
                self.tasks.set_current_domain(Some(domain));
                if self.tasks.current_thread() != Some(thread) {
                    self.switch_to(thread);
                }
                return;
            }
            candidate = self.tasks.next_domain(domain).filter(|&next| Some(next) != start);
        }

        error!(
            "no runnable thread among {} domains",
            self.tasks.domain_count()
        );
        panic!("no runnable thread");
    }

    /// Make `target` the current thread: save the FPU state of the previous
    /// one, restore the target's, load its TLS descriptors.
    ///
    /// # Panics
    /// If the target's FPU area is misaligned.
    pub fn switch_to(&mut self, target: ThreadId) {
        if let Some(previous) = self.tasks.current_thread() {
            let page = self.tasks.thread(previous).control_block;
            // SAFETY: control blocks are owned by their thread, which is live.
            let block = unsafe { self.control_block(page) };
            self.cpu.save_fpu(&mut block.fpu);
            self.tasks.thread_mut(previous).fpu_saved = true;
        }

        self.tasks.set_current_thread(Some(target));
        let thread = self.tasks.thread(target);
        trace!("switching to thread {} ({target:?})", thread.tid());

        // SAFETY: as above.
        let block = unsafe { self.control_block(thread.control_block) };
        if thread.fpu_saved {
            if !block.fpu.is_aligned() {
                error!("fpu area at {:p} is not 16-byte aligned", block.fpu.as_ptr());
                panic!("cannot restore FP state: area not aligned");
            }
            self.cpu.restore_fpu(&block.fpu);
        }
        self.cpu.load_tls(block.tls.thread_slots());
        self.switches += 1;
    }

    /// Block the current thread and idle until something resumes it.
    ///
    /// # Panics
    /// If there is no current thread.
    pub fn block(&mut self) {
        let Some(id) = self.tasks.current_thread() else {
            error!("block() outside of any thread");
            panic!("block without a current thread");
        };
        self.tasks.park(id);
        while self.tasks.contains_thread(id) && self.tasks.thread(id).is_blocked() {
            if let Some(mut frame) = self.cpu.wait_for_interrupt() {
                self.dispatch(&mut frame);
            }
        }
    }

    /// Block `id` without waiting; it stops being scheduled once the current
    /// trap ends.
    pub fn park(&mut self, id: ThreadId) {
        self.tasks.park(id);
        self.request_reschedule();
    }

    /// Make a blocked thread runnable again, at the tail of its domain's
    /// running ring.
    pub fn resume(&mut self, id: ThreadId) {
        self.tasks.resume(id);
    }

    /// Edit the TLS descriptor table of `id`. The current thread's slots
    /// are reloaded right away; other threads pick theirs up when switched
    /// to.
    pub fn update_tls<R>(&mut self, id: ThreadId, f: impl FnOnce(&mut TlsTable) -> R) -> R {
        let page = self.tasks.thread(id).control_block;
        // SAFETY: control blocks are owned by their thread, which is live.
        let block = unsafe { self.control_block(page) };
        let result = f(&mut block.tls);
        if self.tasks.current_thread() == Some(id) {
            self.cpu.load_tls(block.tls.thread_slots());
        }
        result
    }

    /// Create a thread in `domain` and queue it at the tail of the domain's
    /// running ring.
    ///
    /// A non-zero `new_stack` becomes the user stack top. With `clone_from`
    /// the thread continues where that thread's last trap left it, with EAX
    /// cleared, and inherits its TLS descriptors (and its stack, when
    /// `new_stack` is zero).
    pub fn create_thread(
        &mut self,
        domain: DomainId,
        new_stack: u32,
        clone_from: Option<ThreadId>,
    ) -> ThreadId {
        let block_page = self.mem.alloc_zeroed();
        let stack_page = self.mem.alloc_zeroed();
        let kernel_stack = StackBounds::new(
            stack_page.base().as_u32(),
            stack_page.base().as_u32() + KERNEL_STACK_SIZE,
        );

        let space = &mut self.tasks.domain_mut(domain).space;
        for page in [stack_page, block_page] {
            space.map(
                &mut self.mem,
                page,
                VirtualAddress::new(page.base().as_u32()),
                PageEntryBits::kernel_rw(),
            );
        }

        let mut thread = Thread::new(domain, block_page, kernel_stack);
        thread.context.kernel = self.kernel_entry_frame(kernel_stack.hi);
        thread.context.user = user_entry_frame(self.tasks.domain(domain).segments);

        if new_stack != 0 {
            thread.user_stack = StackBounds::new(new_stack.saturating_sub(USER_STACK_SIZE), new_stack);
            thread.context.user.info.esp = new_stack;
        }

        if let Some(parent) = clone_from {
            let parent = self.tasks.thread(parent);
            let from = parent.context.user;
            let user = &mut thread.context.user;
            user.info.cs = from.info.cs;
            user.info.ss = from.info.ss;
            user.info.eip = from.info.eip;
            user.info.eflags = from.info.eflags;
            user.regs = from.regs.with_eax(0);
            if new_stack == 0 {
                thread.user_stack = parent.user_stack;
                user.info.esp = from.info.esp;
            }
            // SAFETY: both control blocks are owned by live threads and distinct.
            let (child, parent) = unsafe {
                (
                    self.control_block(block_page),
                    self.control_block(parent.control_block),
                )
            };
            child.tls.copy_thread_slots_from(&parent.tls);
        }

        let id = self.tasks.add_thread(thread);
        debug!(
            "thread {} created in domain {} (kernel stack {:#010x})",
            self.tasks.thread(id).tid(),
            self.tasks.domain(domain).pid(),
            kernel_stack.lo
        );
        id
    }

    /// Terminate `id`. The last thread of a domain takes the domain with it.
    pub fn exit_thread(&mut self, id: ThreadId) {
        let domain = self.tasks.thread(id).domain();
        if self.tasks.domain(domain).thread_count() <= 1 {
            self.exit_domain(domain);
            return;
        }

        self.tasks.remove_thread(id);
        debug!(
            "removing thread {} from domain {}",
            self.tasks.thread(id).tid(),
            self.tasks.domain(domain).pid()
        );
        self.on_schedule_stack(|kernel| {
            kernel.clean_up_thread(id);
            kernel.schedule();
        });
    }

    /// Tear down `domain` with all its threads and its address space.
    pub fn exit_domain(&mut self, domain: DomainId) {
        self.tasks.unlink_domain(domain);
        debug!("exiting domain {}", self.tasks.domain(domain).pid());
        self.on_schedule_stack(|kernel| {
            kernel.clean_up_domain(domain);
            kernel.schedule();
        });
    }

    /// The user frame to enter for the current thread, with its kernel stack
    /// and address space loaded. This is what the new-thread trampoline runs.
    ///
    /// # Panics
    /// If there is no current thread.
    pub fn thread_entry(&mut self) -> TrapFrame {
        let Some(id) = self.tasks.current_thread() else {
            error!("thread entry without a current thread");
            panic!("thread entry without a current thread");
        };
        let thread = self.tasks.thread(id);
        self.cpu.set_kernel_stack(thread.kernel_stack.hi);
        self.cpu
            .load_address_space(self.tasks.domain(thread.domain()).space.cr3());
        thread.context.user
    }

    /// Run `f` on the schedule stack.
    pub(crate) fn on_schedule_stack(&mut self, f: impl FnOnce(&mut Self)) {
        let top = self.schedule_stack.hi;
        let mut f = Some(f);
        let mut run = || {
            if let Some(f) = f.take() {
                f(self);
            }
        };
        // SAFETY: the schedule stack is reserved for this and the caller is
        // on a thread's kernel stack or in boot code.
        unsafe { C::call_on_stack(top, &mut run) };
    }

    /// Borrow a control block through the physical mapper.
    ///
    /// # Safety
    /// `page` must be the control block of a live thread, not otherwise
    /// borrowed.
    pub(crate) unsafe fn control_block<'a>(
        &self,
        page: PhysicalPage<Size4K>,
    ) -> &'a mut ControlBlock {
        // SAFETY: forwarded to the caller.
        unsafe { self.mem.phys_to_mut(page.base()) }
    }

    /// Unmap (and so free) a dequeued thread's kernel stack and control
    /// block, then release its slot.
    fn clean_up_thread(&mut self, id: ThreadId) {
        let thread = self.tasks.thread(id);
        let (domain, stack, block) = (
            thread.domain(),
            thread.kernel_stack.lo,
            thread.control_block,
        );
        let space = &mut self.tasks.domain_mut(domain).space;
        space.unmap(&mut self.mem, VirtualAddress::new(stack));
        space.unmap(&mut self.mem, VirtualAddress::new(block.base().as_u32()));
        self.tasks.free_thread(id);
    }

    fn clean_up_domain(&mut self, domain: DomainId) {
        while let Some(thread) = self.tasks.pop_any_thread(domain) {
            self.clean_up_thread(thread);
        }
        if let Some(domain) = self.tasks.free_domain(domain) {
            debug!("domain {} ({}) destroyed", domain.pid(), domain.name());
            domain.space.destroy(&mut self.mem);
        }
    }

    /// Kernel-mode starting point of a new thread: the trampoline, on an
    /// empty kernel stack, interrupts off.
    fn kernel_entry_frame(&self, stack_top: u32) -> TrapFrame {
        let mut frame = TrapFrame::default();
        frame
            .info
            .set_eip(self.thread_trampoline)
            .set_esp(stack_top)
            .set_cs(u32::from(KERNEL_CS))
            .set_ss(u32::from(KERNEL_DS))
            .set_eflags(Eflags::kernel_entry().into_bits());
        frame.regs.set_gs(u32::from(KERNEL_GS));
        frame
    }
}

/// User-mode starting point: the domain's selectors with RPL 3, interrupts
/// on. EIP and ESP are filled in by the loader or by cloning.
fn user_entry_frame(segments: UserSegments) -> TrapFrame {
    let mut frame = TrapFrame::default();
    frame
        .info
        .set_cs(UserSegments::user(segments.cs))
        .set_ss(UserSegments::user(segments.ss))
        .set_eflags(Eflags::user_entry().into_bits());
    frame
        .regs
        .set_gs(UserSegments::user(segments.gs))
        .set_fs(UserSegments::user(segments.fs))
        .set_es(UserSegments::user(segments.es))
        .set_ds(UserSegments::user(segments.ds));
    frame
}
