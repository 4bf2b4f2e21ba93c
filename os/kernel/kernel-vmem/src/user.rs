//! # User-Space Access
//!
//! Copying between kernel buffers and a domain's user memory. Every byte goes
//! through the domain's own translation, so only present, user-accessible
//! pages can be read, and only writable ones written.

use crate::{AddressSpace, PhysMapper};
use core::mem::MaybeUninit;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};

/// Failure to reach user memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum UserAccessError {
    /// The page containing `address` is unmapped, kernel-only, or (for
    /// writes) read-only.
    #[error("user memory at {address} is not accessible")]
    Fault { address: VirtualAddress },
}

/// Plain-old-data values that may be built from arbitrary user bytes.
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`, and
/// the type must not contain padding that would leak kernel bytes on write.
pub unsafe trait UserPod: Copy {}

unsafe impl UserPod for u8 {}
unsafe impl UserPod for u16 {}
unsafe impl UserPod for u32 {}
unsafe impl UserPod for i32 {}
unsafe impl<const N: usize> UserPod for [u8; N] {}

/// Walk `[va, va + len)` page by page, yielding the physical address of each
/// piece and its length.
fn for_each_piece(
    va: VirtualAddress,
    len: usize,
    mut piece: impl FnMut(VirtualAddress, usize, usize) -> Result<(), UserAccessError>,
) -> Result<(), UserAccessError> {
    let mut done = 0usize;
    while done < len {
        let offset = u32::try_from(done).map_err(|_| UserAccessError::Fault { address: va })?;
        let at = va
            .checked_add(offset)
            .ok_or(UserAccessError::Fault { address: va })?;
        let in_page = at.offset::<Size4K>().as_u32() as usize;
        let chunk = (PAGE_SIZE as usize - in_page).min(len - done);
        piece(at, done, chunk)?;
        done += chunk;
    }
    Ok(())
}

fn user_bytes<'a, M: PhysMapper>(mem: &M, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
    // SAFETY: `pa` came from a present user mapping, which the kernel can
    // reach through the mapper; the piece never crosses the page end.
    unsafe { core::slice::from_raw_parts_mut(mem.phys_to_mut::<u8>(pa), len) }
}

/// Copy `buf.len()` bytes from user address `va`.
///
/// # Errors
/// [`UserAccessError::Fault`] naming the first inaccessible address; `buf`
/// may have been partially filled.
pub fn read_bytes<M: PhysMapper>(
    space: &AddressSpace,
    mem: &M,
    va: VirtualAddress,
    buf: &mut [u8],
) -> Result<(), UserAccessError> {
    for_each_piece(va, buf.len(), |at, done, chunk| {
        let pa = space
            .translate(mem, at)
            .ok_or(UserAccessError::Fault { address: at })?;
        buf[done..done + chunk].copy_from_slice(user_bytes(mem, pa, chunk));
        Ok(())
    })
}

/// Copy `buf` to user address `va`. Every touched page must be writable.
///
/// # Errors
/// [`UserAccessError::Fault`] naming the first inaccessible address. Pages
/// before it have already been written.
pub fn write_bytes<M: PhysMapper>(
    space: &AddressSpace,
    mem: &M,
    va: VirtualAddress,
    buf: &[u8],
) -> Result<(), UserAccessError> {
    for_each_piece(va, buf.len(), |at, done, chunk| {
        if !space.entry(mem, at).flags().writable() {
            return Err(UserAccessError::Fault { address: at });
        }
        let pa = space
            .translate(mem, at)
            .ok_or(UserAccessError::Fault { address: at })?;
        user_bytes(mem, pa, chunk).copy_from_slice(&buf[done..done + chunk]);
        Ok(())
    })
}

/// Read one `T` from user address `va`.
///
/// # Errors
/// [`UserAccessError::Fault`] if any byte of the value is inaccessible.
pub fn read_value<T: UserPod, M: PhysMapper>(
    space: &AddressSpace,
    mem: &M,
    va: VirtualAddress,
) -> Result<T, UserAccessError> {
    let mut value = MaybeUninit::<T>::zeroed();
    // SAFETY: `value` is zero-initialized and exactly `size_of::<T>()` bytes long.
    let bytes = unsafe {
        core::slice::from_raw_parts_mut(value.as_mut_ptr().cast::<u8>(), size_of::<T>())
    };
    read_bytes(space, mem, va, bytes)?;
    // SAFETY: `UserPod` types are valid for any bit pattern.
    Ok(unsafe { value.assume_init() })
}

/// Write one `T` to user address `va`.
///
/// # Errors
/// [`UserAccessError::Fault`] if any byte of the value is inaccessible or read-only.
pub fn write_value<T: UserPod, M: PhysMapper>(
    space: &AddressSpace,
    mem: &M,
    va: VirtualAddress,
    value: &T,
) -> Result<(), UserAccessError> {
    // SAFETY: `UserPod` types have no padding; their bytes are all initialized.
    let bytes =
        unsafe { core::slice::from_raw_parts((&raw const *value).cast::<u8>(), size_of::<T>()) };
    write_bytes(space, mem, va, bytes)
}

/// Byte-wise reader over user memory, e.g. for NUL-terminated strings.
///
/// Yields `Err` once at the first inaccessible byte and then stops.
pub struct UserBytes<'s, 'm, M: PhysMapper> {
    space: &'s AddressSpace,
    mem: &'m M,
    next: Option<VirtualAddress>,
}

impl<'s, 'm, M: PhysMapper> UserBytes<'s, 'm, M> {
    #[must_use]
    pub const fn new(space: &'s AddressSpace, mem: &'m M, start: VirtualAddress) -> Self {
        Self {
            space,
            mem,
            next: Some(start),
        }
    }
}

impl<M: PhysMapper> Iterator for UserBytes<'_, '_, M> {
    type Item = Result<u8, UserAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.next?;
        let Some(pa) = self.space.translate(self.mem, at) else {
            self.next = None;
            return Some(Err(UserAccessError::Fault { address: at }));
        };
        self.next = at.checked_add(1);
        Some(Ok(user_bytes(self.mem, pa, 1)[0]))
    }
}
