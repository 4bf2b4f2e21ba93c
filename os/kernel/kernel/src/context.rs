use crate::cpu::Cpu;
use crate::interrupts::gpf::{GPF_VECTOR, general_protection_fault};
use crate::interrupts::page_fault::{PAGE_FAULT_VECTOR, page_fault};
use crate::interrupts::{IsrStubs, Privilege, TrapFn, TrapTable, TrapTableBuilder, TrapTableError};
use crate::tracing;
use kernel_alloc::{PageAllocator, init_paging};
use kernel_info::boot::MemoryRegion;
use kernel_info::segments::KERNEL_CS;
use kernel_task::{SavedContext, StackBounds, TaskTable, ThreadId, TrapFrame, UserSegments};
use kernel_vmem::{AddressSpace, PhysMapper};
use log::{LevelFilter, info};

/// Everything the boot sequence knows before the kernel runs.
#[derive(Clone, Debug)]
pub struct BootConfig<'a> {
    pub regions: &'a [MemoryRegion],
    /// The dedicated stack `schedule()` and thread teardown run on. Lives
    /// in the kernel-reserved region, below every thread's kernel stack.
    pub schedule_stack: StackBounds,
    /// Selectors of the flat user segments; RPL 3 is added per thread.
    pub user_segments: UserSegments,
    pub isr_stubs: IsrStubs,
    /// Kernel-mode entry of a fresh thread: the trampoline that calls
    /// [`Kernel::thread_entry`] and drops to user mode.
    pub thread_trampoline: u32,
    /// Install the QEMU debug-console logger with this level.
    pub log_level: Option<LevelFilter>,
}

/// Assembles a [`Kernel`]: boot configuration plus trap handler
/// registrations.
pub struct KernelBuilder<'a, C, M> {
    cpu: C,
    mapper: M,
    config: BootConfig<'a>,
    traps: TrapTableBuilder<C, M>,
}

impl<'a, C: Cpu, M: PhysMapper> KernelBuilder<'a, C, M> {
    #[must_use]
    pub fn new(cpu: C, mapper: M, regions: &'a [MemoryRegion]) -> Self {
        let config = BootConfig {
            regions,
            schedule_stack: StackBounds::default(),
            user_segments: UserSegments::default(),
            isr_stubs: IsrStubs::default(),
            thread_trampoline: 0,
            log_level: None,
        };
        Self {
            cpu,
            mapper,
            traps: TrapTableBuilder::new(config.isr_stubs),
            config,
        }
    }

    /// Gate addresses are taken from `stubs`. Handlers registered so far are
    /// dropped, so call this first.
    #[must_use]
    pub fn isr_stubs(mut self, stubs: IsrStubs) -> Self {
        self.config.isr_stubs = stubs;
        self.traps = TrapTableBuilder::new(stubs);
        self
    }

    #[must_use]
    pub const fn schedule_stack(mut self, stack: StackBounds) -> Self {
        self.config.schedule_stack = stack;
        self
    }

    #[must_use]
    pub const fn user_segments(mut self, segments: UserSegments) -> Self {
        self.config.user_segments = segments;
        self
    }

    #[must_use]
    pub const fn thread_trampoline(mut self, eip: u32) -> Self {
        self.config.thread_trampoline = eip;
        self
    }

    #[must_use]
    pub const fn log_level(mut self, level: LevelFilter) -> Self {
        self.config.log_level = Some(level);
        self
    }

    /// Register `handler` for `vector` in the kernel code segment.
    ///
    /// # Errors
    /// See [`TrapTableBuilder::set_handler`].
    pub fn handler(
        mut self,
        vector: u8,
        handler: TrapFn<C, M>,
        privilege: Privilege,
    ) -> Result<Self, TrapTableError> {
        self.traps
            .set_handler(vector, handler, KERNEL_CS, privilege)?;
        Ok(self)
    }

    #[must_use]
    pub const fn config(&self) -> &BootConfig<'a> {
        &self.config
    }

    /// Bring up paging and freeze the trap table. The general-protection and
    /// page-fault handlers are installed unless registered explicitly.
    #[must_use]
    pub fn build(mut self) -> Kernel<C, M> {
        if let Some(level) = self.config.log_level {
            tracing::init_logging(level);
        }

        install_default(&mut self.traps, GPF_VECTOR, general_protection_fault, Privilege::User);
        install_default(&mut self.traps, PAGE_FAULT_VECTOR, page_fault, Privilege::Kernel);

        let (mem, space) = init_paging(self.config.regions, self.mapper);
        let stack = self.config.schedule_stack;
        info!(
            "kernel ready: schedule stack {:#010x}..{:#010x}, {} free pages",
            stack.lo,
            stack.hi,
            mem.free_pages()
        );

        Kernel {
            cpu: self.cpu,
            mem,
            space,
            tasks: TaskTable::new(),
            traps: self.traps.build(),
            schedule_stack: stack,
            user_segments: self.config.user_segments,
            thread_trampoline: self.config.thread_trampoline,
            idle: SavedContext::default(),
            reschedule: false,
            switches: 0,
        }
    }
}

fn install_default<C, M>(
    traps: &mut TrapTableBuilder<C, M>,
    vector: u8,
    handler: TrapFn<C, M>,
    privilege: Privilege,
) {
    if !traps.is_registered(vector) {
        // Cannot fail: the vector is neither reserved nor taken.
        let _ = traps.set_handler(vector, handler, KERNEL_CS, privilege);
    }
}

/// The kernel: CPU, memory, every domain and thread, and the trap table.
pub struct Kernel<C, M> {
    pub(crate) cpu: C,
    pub(crate) mem: PageAllocator<M>,
    /// The kernel's own address space, active while a trap is handled.
    pub(crate) space: AddressSpace,
    pub(crate) tasks: TaskTable,
    pub(crate) traps: TrapTable<C, M>,
    pub(crate) schedule_stack: StackBounds,
    pub(crate) user_segments: UserSegments,
    pub(crate) thread_trampoline: u32,
    /// Kernel context interrupted while no thread was current.
    pub(crate) idle: SavedContext,
    pub(crate) reschedule: bool,
    pub(crate) switches: u64,
}

impl<C: Cpu, M: PhysMapper> Kernel<C, M> {
    #[inline]
    #[must_use]
    pub const fn cpu(&self) -> &C {
        &self.cpu
    }

    #[inline]
    pub const fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[inline]
    #[must_use]
    pub const fn mem(&self) -> &PageAllocator<M> {
        &self.mem
    }

    #[inline]
    pub const fn mem_mut(&mut self) -> &mut PageAllocator<M> {
        &mut self.mem
    }

    /// Split borrow of the task table and the page allocator, for work on a
    /// domain's address space.
    #[inline]
    pub const fn tasks_and_mem(&mut self) -> (&mut TaskTable, &mut PageAllocator<M>) {
        (&mut self.tasks, &mut self.mem)
    }

    #[inline]
    #[must_use]
    pub const fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    #[inline]
    pub const fn tasks_mut(&mut self) -> &mut TaskTable {
        &mut self.tasks
    }

    /// The kernel's own address space.
    #[inline]
    #[must_use]
    pub const fn kernel_space(&self) -> &AddressSpace {
        &self.space
    }

    #[inline]
    #[must_use]
    pub const fn traps(&self) -> &TrapTable<C, M> {
        &self.traps
    }

    #[inline]
    #[must_use]
    pub const fn schedule_stack(&self) -> StackBounds {
        self.schedule_stack
    }

    #[inline]
    #[must_use]
    pub const fn user_segments(&self) -> UserSegments {
        self.user_segments
    }

    /// Number of completed context switches.
    #[inline]
    #[must_use]
    pub const fn switches(&self) -> u64 {
        self.switches
    }

    #[inline]
    #[must_use]
    pub const fn current_thread(&self) -> Option<ThreadId> {
        self.tasks.current_thread()
    }

    /// The saved user frame of the current thread: what the next trap exit
    /// resumes, and where system calls find their arguments.
    pub fn current_frame_mut(&mut self) -> Option<&mut TrapFrame> {
        let id = self.tasks.current_thread()?;
        Some(&mut self.tasks.thread_mut(id).context.user)
    }

    /// Load the IDT built with the trap table.
    ///
    /// # Safety
    /// `self` must not move for as long as traps can occur.
    pub unsafe fn install_idt(&mut self) {
        // SAFETY: forwarded to the caller.
        unsafe { self.cpu.load_idt(self.traps.idt()) };
    }
}
