//! # Thread-Local Storage Descriptors
//!
//! Every thread owns a full GDT-sized table of descriptors. Slots from
//! [`TLS_START`] on are the thread's own and are copied into the live GDT
//! whenever the thread is switched in; the slots below are the kernel's.
//!
//! ## GDT entry layout (8 bytes)
//!
//! ```text
//!  63      56 55   52 51   48 47      40 39      32
//! ┌─────────┬───────┬───────┬──────────┬──────────┐
//! │base 31:24│ flags │lim19:16│  access  │base 23:16│
//! ├─────────┴───────┴───────┴──────────┴──────────┤
//! │        base 15:0         │     limit 15:0      │
//! └──────────────────────────┴─────────────────────┘
//!  31                      16 15                  0
//! ```

use bitfield_struct::bitfield;
use kernel_info::segments::{GDT_ENTRIES, TLS_START};
use kernel_vmem::user::UserPod;

/// Access byte of a segment descriptor.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct SegmentAccess {
    pub accessed: bool,
    /// Readable (code) or writable (data).
    pub read_write: bool,
    pub direction_conforming: bool,
    pub executable: bool,
    /// Code/data segment (as opposed to a system segment).
    pub normal: bool,
    #[bits(2)]
    pub dpl: u8,
    pub present: bool,
}

/// Flags nibble of a segment descriptor, together with limit bits 19:16.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct SegmentFlags {
    #[bits(4)]
    pub limit_high: u8,
    pub available: bool,
    pub long_mode: bool,
    /// 32-bit segment.
    pub big: bool,
    /// Limit counts 4 KiB pages instead of bytes.
    pub granularity_4k: bool,
}

/// One 8-byte segment descriptor.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    limit_high_flags: u8,
    base_high: u8,
}

const _: () = assert!(size_of::<GdtEntry>() == 8);

impl GdtEntry {
    pub const EMPTY: Self = Self {
        limit_low: 0,
        base_low: 0,
        base_mid: 0,
        access: 0,
        limit_high_flags: 0,
        base_high: 0,
    };

    /// Describe the segment `[base, base + limit]`. Only the low 20 bits of
    /// `limit` are representable.
    #[must_use]
    pub const fn new(base: u32, limit: u32, access: SegmentAccess, flags: SegmentFlags) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self {
            limit_low: limit as u16,
            base_low: base as u16,
            base_mid: (base >> 16) as u8,
            access: access.into_bits(),
            limit_high_flags: flags.with_limit_high(((limit >> 16) & 0xF) as u8).into_bits(),
            base_high: (base >> 24) as u8,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base_low as u32 | (self.base_mid as u32) << 16 | (self.base_high as u32) << 24
    }

    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit_low as u32 | (self.flags().limit_high() as u32) << 16
    }

    #[inline]
    #[must_use]
    pub const fn access(&self) -> SegmentAccess {
        SegmentAccess::from_bits(self.access)
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits(self.limit_high_flags)
    }

    #[inline]
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.access().present()
    }
}

/// `flags` word of a [`UserDesc`], as laid out by `set_thread_area(2)`.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct UserDescFlags {
    pub seg_32bit: bool,
    #[bits(2)]
    pub contents: u8,
    pub read_exec_only: bool,
    pub limit_in_pages: bool,
    pub seg_not_present: bool,
    pub useable: bool,
    #[bits(25)]
    __: u32,
}

impl UserDescFlags {
    /// The combination user space passes to release a slot.
    pub const EMPTY_SLOT: Self = Self::new()
        .with_read_exec_only(true)
        .with_seg_not_present(true);
}

/// The descriptor request user space passes to `set_thread_area`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UserDesc {
    /// Slot to fill; `u32::MAX` asks the kernel to pick one.
    pub entry_number: u32,
    pub base_addr: u32,
    pub limit: u32,
    pub flags: u32,
}

// SAFETY: four plain `u32`s, no padding.
unsafe impl UserPod for UserDesc {}

impl UserDesc {
    /// Sentinel `entry_number` requesting a free slot.
    pub const ANY_SLOT: u32 = u32::MAX;

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> UserDescFlags {
        UserDescFlags::from_bits(self.flags)
    }

    /// The descriptor this request installs, or `None` for a release request.
    #[must_use]
    pub const fn to_entry(&self) -> Option<GdtEntry> {
        let flags = self.flags();
        if flags.into_bits() == UserDescFlags::EMPTY_SLOT.into_bits() {
            return None;
        }
        let access = SegmentAccess::new()
            .with_dpl(3)
            .with_normal(true)
            .with_present(true)
            .with_executable(flags.read_exec_only())
            .with_read_write(!flags.read_exec_only());
        let seg_flags = SegmentFlags::new()
            .with_granularity_4k(flags.limit_in_pages())
            .with_big(true);
        Some(GdtEntry::new(self.base_addr, self.limit, access, seg_flags))
    }
}

/// A thread's private copy of the descriptor table.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TlsTable {
    entries: [GdtEntry; GDT_ENTRIES],
}

impl Default for TlsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [GdtEntry::EMPTY; GDT_ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[GdtEntry; GDT_ENTRIES] {
        &self.entries
    }

    /// The thread-owned slots, `TLS_START..`.
    #[inline]
    #[must_use]
    pub fn thread_slots(&self) -> &[GdtEntry] {
        &self.entries[TLS_START..]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&GdtEntry> {
        self.entries.get(index)
    }

    /// Apply a `set_thread_area` request to slot `index`.
    ///
    /// A release request clears the slot. Returns `false`, leaving the table
    /// untouched, if `index` is not a thread-owned slot.
    pub fn set_tls_segment(&mut self, index: u32, desc: &UserDesc) -> bool {
        let index = index as usize;
        if !(TLS_START..GDT_ENTRIES).contains(&index) {
            return false;
        }
        self.entries[index] = desc.to_entry().unwrap_or(GdtEntry::EMPTY);
        true
    }

    /// First thread-owned slot without a present descriptor.
    #[must_use]
    pub fn find_free_slot(&self) -> Option<u32> {
        #[allow(clippy::cast_possible_truncation)]
        (TLS_START..GDT_ENTRIES)
            .find(|&i| !self.entries[i].is_present())
            .map(|i| i as u32)
    }

    /// Copy the thread-owned slots of `other` (as a cloned thread inherits them).
    pub fn copy_thread_slots_from(&mut self, other: &Self) {
        self.entries[TLS_START..].copy_from_slice(&other.entries[TLS_START..]);
    }
}
