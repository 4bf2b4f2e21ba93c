use super::TaskStateSegment;
use crate::cpu::Cpu;
use crate::interrupts::Idt;
use kernel_info::segments::{GDT_ENTRIES, KERNEL_DS, KERNEL_GS, TLS_START};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_registers::fpu::{fxrstor, fxsave};
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use kernel_task::{FpuArea, GdtEntry, TrapFrame};

/// Operand of `lidt`.
#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

/// The hardware CPU: the live GDT and the TSS it writes through.
pub struct X86Cpu {
    gdt: &'static mut [GdtEntry; GDT_ENTRIES],
    tss: &'static mut TaskStateSegment,
}

impl X86Cpu {
    /// # Safety
    /// `gdt` must be the table the GDTR points at and `tss` the segment the
    /// task register selects. Nothing else may write to either.
    pub unsafe fn new(
        gdt: &'static mut [GdtEntry; GDT_ENTRIES],
        tss: &'static mut TaskStateSegment,
    ) -> Self {
        Self { gdt, tss }
    }
}

/// Runs the closure passed to [`X86Cpu::call_on_stack`].
extern "C" fn call_trampoline(f: *mut &mut dyn FnMut()) {
    // SAFETY: `call_on_stack` passes a pointer to a live closure reference.
    unsafe { (*f)() }
}

impl Cpu for X86Cpu {
    fn load_kernel_segments(&mut self) {
        // SAFETY: both selectors are valid ring 0 data descriptors.
        unsafe {
            core::arch::asm!(
                "mov ds, {ds:x}",
                "mov es, {ds:x}",
                "mov gs, {gs:x}",
                ds = in(reg) u32::from(KERNEL_DS),
                gs = in(reg) u32::from(KERNEL_GS),
                options(nostack, preserves_flags)
            );
        }
    }

    fn load_address_space(&mut self, cr3: Cr3) {
        // SAFETY: every address space identity maps the kernel, so the code
        // running here stays mapped.
        unsafe { cr3.store_unsafe() };
    }

    fn set_kernel_stack(&mut self, top: u32) {
        self.tss.esp0 = top;
    }

    fn save_fpu(&mut self, area: &mut FpuArea) {
        // SAFETY: `FpuArea` is 512 bytes and 16-byte aligned.
        unsafe { fxsave(area.as_mut_ptr()) };
    }

    fn restore_fpu(&mut self, area: &FpuArea) {
        // SAFETY: the area holds an `fxsave` image.
        unsafe { fxrstor(area.as_ptr()) };
    }

    fn load_tls(&mut self, entries: &[GdtEntry]) {
        self.gdt[TLS_START..TLS_START + entries.len()].copy_from_slice(entries);
        // Reload the cached descriptors of FS and GS.
        // SAFETY: reloading a selector with itself; a TLS slot in use is
        // present in the table just copied.
        unsafe {
            core::arch::asm!(
                "mov {tmp:x}, fs",
                "mov fs, {tmp:x}",
                "mov {tmp:x}, gs",
                "mov gs, {tmp:x}",
                tmp = out(reg) _,
                options(nostack, preserves_flags)
            );
        }
    }

    unsafe fn load_idt(&mut self, idt: &Idt) {
        let pointer = IdtPointer {
            limit: Idt::limit(),
            base: core::ptr::from_ref(idt) as u32,
        };
        // SAFETY: the caller keeps `idt` in place.
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) &raw const pointer, options(readonly, nostack, preserves_flags));
        }
    }

    fn fault_address(&self) -> VirtualAddress {
        // SAFETY: reading CR2 in ring 0.
        unsafe { Cr2::load_unsafe() }.fault_address()
    }

    fn wait_for_interrupt(&mut self) -> Option<TrapFrame> {
        // SAFETY: the IDT is loaded; the trap is dispatched by the entry stub.
        unsafe {
            core::arch::asm!("sti", "hlt", "cli", options(nomem, nostack));
        }
        None
    }

    unsafe fn call_on_stack(stack_top: u32, f: &mut dyn FnMut()) {
        let mut f = f;
        // SAFETY: the caller guarantees `stack_top` is a free, mapped stack.
        // The old stack pointer is kept on the new stack across the call.
        unsafe {
            core::arch::asm!(
                "mov {saved}, esp",
                "mov esp, {top}",
                "push {saved}",
                "push {arg}",
                "call {entry}",
                "add esp, 4",
                "pop esp",
                top = in(reg) stack_top,
                arg = in(reg) &raw mut f,
                saved = out(reg) _,
                entry = sym call_trampoline,
                clobber_abi("C"),
            );
        }
    }
}
