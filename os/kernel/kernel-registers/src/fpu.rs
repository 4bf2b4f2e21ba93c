//! # FPU / SSE State Transfer
//!
//! `fxsave` and `fxrstor` move the 512-byte x87/SSE state between the CPU and
//! memory. The memory operand must be 16-byte aligned.

/// Size of the `fxsave` image.
pub const FXSAVE_AREA_SIZE: usize = 512;

/// Required alignment of the `fxsave` image.
pub const FXSAVE_ALIGN: usize = 16;

/// Store the FPU/SSE state into `area`.
///
/// # Safety
/// `area` must point to [`FXSAVE_AREA_SIZE`] writable bytes aligned to [`FXSAVE_ALIGN`].
#[cfg(all(feature = "asm", target_arch = "x86"))]
#[inline]
pub unsafe fn fxsave(area: *mut u8) {
    unsafe {
        core::arch::asm!("fxsave [{}]", in(reg) area, options(nostack, preserves_flags));
    }
}

/// Load the FPU/SSE state from `area`.
///
/// # Safety
/// `area` must point to a valid image previously written by [`fxsave`],
/// aligned to [`FXSAVE_ALIGN`].
#[cfg(all(feature = "asm", target_arch = "x86"))]
#[inline]
pub unsafe fn fxrstor(area: *const u8) {
    unsafe {
        core::arch::asm!("fxrstor [{}]", in(reg) area, options(nostack, preserves_flags));
    }
}
