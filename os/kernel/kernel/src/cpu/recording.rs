use super::Cpu;
use crate::interrupts::Idt;
use core::cell::RefCell;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::cr3::Cr3;
use kernel_task::{FpuArea, GdtEntry, TrapFrame};
use std::collections::VecDeque;

/// Something the kernel asked the CPU to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CpuEvent {
    KernelSegments,
    AddressSpace(u32),
    KernelStack(u32),
    SaveFpu,
    RestoreFpu,
    /// Base addresses of the loaded TLS descriptors.
    LoadTls(Vec<u32>),
    LoadIdt,
}

thread_local! {
    static STACK_CALLS: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

/// A [`Cpu`] that records every request instead of executing it.
///
/// Traps for [`wait_for_interrupt`](Cpu::wait_for_interrupt) are scripted
/// with [`push_trap`](Self::push_trap); idling with an empty script panics so
/// that a test can never hang.
#[derive(Debug, Default)]
pub struct RecordingCpu {
    events: Vec<CpuEvent>,
    pending: VecDeque<TrapFrame>,
    fault_address: u32,
}

impl RecordingCpu {
    #[must_use]
    pub fn new() -> Self {
        STACK_CALLS.with_borrow_mut(Vec::clear);
        Self::default()
    }

    /// Queue a trap to be delivered while the kernel idles.
    pub fn push_trap(&mut self, frame: TrapFrame) {
        self.pending.push_back(frame);
    }

    pub const fn set_fault_address(&mut self, address: u32) {
        self.fault_address = address;
    }

    /// Every recorded request except stack switches, oldest first.
    #[must_use]
    pub fn events(&self) -> &[CpuEvent] {
        &self.events
    }

    /// Forget what has been recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
        STACK_CALLS.with_borrow_mut(Vec::clear);
    }

    /// Directory address of the most recently loaded address space.
    #[must_use]
    pub fn active_directory(&self) -> Option<u32> {
        self.events.iter().rev().find_map(|e| match e {
            CpuEvent::AddressSpace(dir) => Some(*dir),
            _ => None,
        })
    }

    /// Most recent `TSS.esp0`.
    #[must_use]
    pub fn kernel_stack(&self) -> Option<u32> {
        self.events.iter().rev().find_map(|e| match e {
            CpuEvent::KernelStack(top) => Some(*top),
            _ => None,
        })
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&CpuEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// Stack tops passed to [`call_on_stack`](Cpu::call_on_stack) on this
    /// test thread.
    #[must_use]
    pub fn stack_calls() -> Vec<u32> {
        STACK_CALLS.with_borrow(Clone::clone)
    }
}

impl Cpu for RecordingCpu {
    fn load_kernel_segments(&mut self) {
        self.events.push(CpuEvent::KernelSegments);
    }

    fn load_address_space(&mut self, cr3: Cr3) {
        self.events
            .push(CpuEvent::AddressSpace(cr3.directory().as_u32()));
    }

    fn set_kernel_stack(&mut self, top: u32) {
        self.events.push(CpuEvent::KernelStack(top));
    }

    fn save_fpu(&mut self, area: &mut FpuArea) {
        assert!(area.is_aligned(), "fxsave into a misaligned area");
        self.events.push(CpuEvent::SaveFpu);
    }

    fn restore_fpu(&mut self, area: &FpuArea) {
        assert!(area.is_aligned(), "fxrstor from a misaligned area");
        self.events.push(CpuEvent::RestoreFpu);
    }

    fn load_tls(&mut self, entries: &[GdtEntry]) {
        let bases = entries
            .iter()
            .filter(|e| e.is_present())
            .map(GdtEntry::base)
            .collect();
        self.events.push(CpuEvent::LoadTls(bases));
    }

    unsafe fn load_idt(&mut self, _idt: &Idt) {
        self.events.push(CpuEvent::LoadIdt);
    }

    fn fault_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.fault_address)
    }

    fn wait_for_interrupt(&mut self) -> Option<TrapFrame> {
        let Some(frame) = self.pending.pop_front() else {
            panic!("idle with no scripted trap left");
        };
        Some(frame)
    }

    unsafe fn call_on_stack(stack_top: u32, f: &mut dyn FnMut()) {
        STACK_CALLS.with_borrow_mut(|calls| calls.push(stack_top));
        f();
    }
}
