use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 32-bit page directory or page table entry in its raw bitfield form.
///
/// Both levels of IA-32 paging (without PAE) share this layout: the upper 20
/// bits hold a 4 KiB-aligned frame, the lower 12 bits hold flags.
///
/// ### Bit layout
///
/// | Bits   | Name / Mnemonic | Meaning |
/// |--------|-----------------|----------|
/// | 0      | `P`             | Valid entry if set |
/// | 1      | `RW`            | Writable if set |
/// | 2      | `US`            | User-mode accessible if set |
/// | 3      | `PWT`           | Write-through caching |
/// | 4      | `PCD`           | Disable caching |
/// | 5      | `A`             | Accessed |
/// | 6      | `D`             | Dirty (PTE only) |
/// | 7      | `PS` / `PAT`    | 4 MiB page in a PDE; PAT in a PTE. Always 0 here |
/// | 8      | `G`             | Global (PTE only) |
/// | 9–11   | OS avail        | Ignored by hardware |
/// | 12–31  | `frame`         | Physical frame bits [31:12] |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::user_rw();
/// e.set_physical_address(PhysicalAddress::new(0x0400_3000));
/// assert!(e.present() && e.writable() && e.user_access());
/// assert_eq!(u32::from(e), 0x0400_3007);
/// ```
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1). Clear for read-only.
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Clear restricts the page to ring 0.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on the first write through a PTE.
    pub dirty: bool,

    /// Page Size (PS, bit 7) in a PDE, PAT in a PTE. Only 4 KiB mappings are
    /// built, so this stays clear.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame bits [31:12].
    #[bits(20)]
    frame: u32,
}

impl PageEntryBits {
    /// Set the physical frame. `pa` must be 4 KiB-aligned.
    #[inline]
    pub fn set_physical_address(&mut self, pa: PhysicalAddress) {
        debug_assert_eq!(pa.as_u32() & 0xFFF, 0, "frame address must be 4K-aligned");
        self.set_frame(pa.as_u32() >> 12);
    }

    /// Builder form of [`set_physical_address`](Self::set_physical_address).
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, pa: PhysicalAddress) -> Self {
        self.with_frame(pa.as_u32() >> 12)
    }

    /// The physical frame this entry refers to.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.frame() << 12)
    }

    /// Kernel-only, read/write.
    #[inline]
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// Kernel-only, read-only.
    #[inline]
    #[must_use]
    pub const fn kernel_ro() -> Self {
        Self::new().with_present(true)
    }

    /// User-accessible, read/write.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::kernel_rw().with_user_access(true)
    }

    /// User-accessible, read-only.
    #[inline]
    #[must_use]
    pub const fn user_ro() -> Self {
        Self::kernel_ro().with_user_access(true)
    }

    /// Flags of a lazily created page directory entry. Kept permissive
    /// (writable + user) so the leaf entry alone decides the access rights.
    #[inline]
    #[must_use]
    pub const fn table_link() -> Self {
        Self::user_rw()
    }
}
