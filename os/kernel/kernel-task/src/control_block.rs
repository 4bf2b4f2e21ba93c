use crate::tls::TlsTable;
use kernel_info::memory::PAGE_SIZE;
use kernel_registers::fpu::{FXSAVE_ALIGN, FXSAVE_AREA_SIZE};

/// Target of `fxsave`/`fxrstor`.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct FpuArea {
    bytes: [u8; FXSAVE_AREA_SIZE],
}

const _: () = assert!(align_of::<FpuArea>() == FXSAVE_ALIGN);

impl FpuArea {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; FXSAVE_AREA_SIZE],
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    #[inline]
    #[must_use]
    pub const fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    /// Whether the area sits where `fxrstor` accepts it.
    #[inline]
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.as_ptr().addr() % FXSAVE_ALIGN == 0
    }

    #[inline]
    #[must_use]
    pub const fn bytes(&self) -> &[u8; FXSAVE_AREA_SIZE] {
        &self.bytes
    }
}

impl Default for FpuArea {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for FpuArea {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FpuArea").finish_non_exhaustive()
    }
}

/// The bulky per-thread state, one physical page per thread.
///
/// The page is mapped kernel read/write into the owning domain at its
/// physical address and reached by the kernel through its physical mapper.
/// A zeroed page is a valid, empty control block.
#[repr(C, align(4096))]
#[derive(Debug)]
pub struct ControlBlock {
    pub fpu: FpuArea,
    pub tls: TlsTable,
}

const _: () = assert!(size_of::<ControlBlock>() <= PAGE_SIZE as usize);

impl ControlBlock {
    /// Reset to the empty state.
    pub fn clear(&mut self) {
        self.fpu = FpuArea::new();
        self.tls = TlsTable::new();
    }
}
