//! # IA-32 Interrupt Descriptor Table
//!
//! The hardware half of the trap table: 256 eight-byte gates, each pointing
//! at one of the low-level entry stubs. The stubs are laid out back to back,
//! so gate `n` points at `stubs.base + n * stubs.stride`.
//!
//! ```text
//! 63             48 47 46  45 44  43    40 39      32
//! +----------------+--+------+--+---------+---------+
//! | offset[31:16]  |P | DPL  |S |  type   |  zero   |
//! +----------------+--+------+--+---------+---------+
//! 31             16 15                             0
//! +----------------+--------------------------------+
//! |    selector    |          offset[15:0]          |
//! +----------------+--------------------------------+
//! ```
//!
//! All gates are interrupt gates (type 0xE), so IF is clear on entry.

use bitfield_struct::bitfield;
use core::ops::Index;

const _: () = assert!(size_of::<IdtEntry>() == 8);
const _: () = assert!(size_of::<Idt>() == 256 * 8);

/// Upper half of the second gate word: zero byte, type, S, DPL, P.
#[bitfield(u16)]
pub struct IdtGateAttr {
    /// Must be zero.
    #[bits(8)]
    __zero0: u8,

    /// **Type**: 0xE = 32-bit interrupt gate, 0xF = 32-bit trap gate.
    #[bits(4)]
    pub typ: u8,

    /// **S**: system bit, zero for gates.
    pub s: bool,

    /// **DPL**: lowest privilege allowed to raise the vector with `int n`.
    #[bits(2)]
    pub dpl: u8,

    /// **P**: present.
    pub present: bool,
}

impl IdtGateAttr {
    /// 32-bit interrupt gate (type 0xE, S=0).
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new().with_typ(0xE).with_s(false)
    }
}

/// Where the low-level entry stubs live.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IsrStubs {
    pub base: u32,
    pub stride: u32,
}

impl IsrStubs {
    #[must_use]
    pub const fn new(base: u32, stride: u32) -> Self {
        Self { base, stride }
    }

    /// Entry stub of `vector`.
    #[inline]
    #[must_use]
    pub const fn entry(&self, vector: u8) -> u32 {
        self.base.wrapping_add(vector as u32 * self.stride)
    }
}

/// One eight-byte gate descriptor.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    attr: u16,
    offset_hi: u16,
}

impl IdtEntry {
    /// A zeroed, non-present gate.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        attr: 0,
        offset_hi: 0,
    };

    /// A present interrupt gate to `offset` in segment `selector`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn interrupt_gate(offset: u32, selector: u16, dpl: u8) -> Self {
        Self {
            offset_lo: offset as u16,
            selector,
            attr: IdtGateAttr::interrupt_gate()
                .with_dpl(dpl)
                .with_present(true)
                .into_bits(),
            offset_hi: (offset >> 16) as u16,
        }
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u32 {
        ((self.offset_hi as u32) << 16) | self.offset_lo as u32
    }

    #[inline]
    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }

    #[inline]
    #[must_use]
    pub const fn attr(&self) -> IdtGateAttr {
        IdtGateAttr::from_bits(self.attr)
    }

    /// Re-target an existing gate at another selector and privilege level,
    /// keeping its stub.
    pub(crate) const fn retarget(&mut self, selector: u16, dpl: u8) {
        self.selector = selector;
        self.attr = IdtGateAttr::from_bits(self.attr)
            .with_dpl(dpl)
            .with_present(true)
            .into_bits();
    }
}

/// The 256-gate table.
#[repr(C, align(8))]
#[derive(Clone, Debug)]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    /// A table with every gate non-present.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; 256],
        }
    }

    pub(crate) const fn set(&mut self, vector: u8, entry: IdtEntry) {
        self.entries[vector as usize] = entry;
    }

    pub(crate) const fn entry_mut(&mut self, vector: u8) -> &mut IdtEntry {
        &mut self.entries[vector as usize]
    }

    /// `lidt` limit: size of the table minus one.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn limit() -> u16 {
        (size_of::<Self>() - 1) as u16
    }
}

impl Index<u8> for Idt {
    type Output = IdtEntry;
    fn index(&self, vector: u8) -> &Self::Output {
        &self.entries[usize::from(vector)]
    }
}
