//! # Address Space (IA-32, page-directory rooted)
//!
//! One [`AddressSpace`] per domain plus one for the kernel itself. It owns its
//! page directory frame, every page table frame linked from it and every
//! frame mapped at or above the kernel-reserved boundary. Mappings inside the
//! kernel-reserved identity region refer to frames that never entered the
//! page allocator and are never freed.
//!
//! ## Watermarks
//!
//! - `vm_top`: one past the highest page mapped below [`VM_TOP_LIMIT`]; the
//!   default placement hint for anonymous mappings.
//! - `brk`: the program break, moved by the heap-growth syscall.
//!
//! ## Safety
//!
//! The address space is plain data; every operation takes the memory
//! ([`PhysMapper`] / [`PhysMemory`]) it walks through. Changing mappings of
//! the *active* space requires TLB maintenance by the caller (reloading CR3
//! on the next trap exit is sufficient).

use crate::page_table::{join_indices, split_indices};
use crate::{
    DirectoryIndex, PageEntryBits, PdEntry, PhysMapper, PhysMemory, PtEntry, TableIndex,
    directory_mut, table_mut,
};
use kernel_info::memory::{
    KERNEL_RESERVED, KERNEL_START, MAX_ALLOC, MIN_ALLOC, PAGE_SIZE, TABLE_SPAN, VM_TOP_LIMIT,
};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, Size4M, VirtualAddress};
use kernel_registers::cr3::Cr3;
use log::{trace, warn};

/// Handle to a single, concrete address space.
#[derive(Debug)]
pub struct AddressSpace {
    directory: PhysicalPage<Size4K>,
    vm_top: VirtualAddress,
    brk: VirtualAddress,
}

impl AddressSpace {
    /// Allocate and clear a page directory.
    pub fn new<M: PhysMemory>(mem: &mut M) -> Self {
        let directory = mem.alloc_zeroed();
        trace!("new address space, directory {directory}");
        Self {
            directory,
            vm_top: VirtualAddress::zero(),
            brk: VirtualAddress::zero(),
        }
    }

    /// A fresh space with `[KERNEL_START, KERNEL_RESERVED)` identity mapped
    /// kernel read/write, as every domain needs.
    pub fn with_kernel_identity<M: PhysMemory>(mem: &mut M) -> Self {
        let mut space = Self::new(mem);
        space.identity_map(
            mem,
            PhysicalAddress::new(KERNEL_START),
            PhysicalAddress::new(KERNEL_RESERVED),
            PageEntryBits::kernel_rw(),
        );
        space
    }

    /// Identity map every page in `[start, end)` with `flags`.
    ///
    /// Pages already present are left as they are.
    pub fn identity_map<M: PhysMemory>(
        &mut self,
        mem: &mut M,
        start: PhysicalAddress,
        end: PhysicalAddress,
        flags: PageEntryBits,
    ) {
        let mut pa = start.align_down::<Size4K>().as_u32();
        while pa < end.as_u32() {
            let page = PhysicalPage::from_addr(PhysicalAddress::new(pa));
            self.try_map(mem, page, VirtualAddress::new(pa), flags);
            let Some(next) = pa.checked_add(PAGE_SIZE) else {
                break;
            };
            pa = next;
        }
    }

    /// Physical frame of the page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> PhysicalPage<Size4K> {
        self.directory
    }

    /// CR3 value that activates this space.
    #[inline]
    #[must_use]
    pub const fn cr3(&self) -> Cr3 {
        Cr3::from_directory(self.directory)
    }

    #[inline]
    #[must_use]
    pub const fn vm_top(&self) -> VirtualAddress {
        self.vm_top
    }

    #[inline]
    #[must_use]
    pub const fn brk(&self) -> VirtualAddress {
        self.brk
    }

    #[inline]
    pub const fn set_brk(&mut self, brk: VirtualAddress) {
        self.brk = brk;
    }

    /// The leaf entry for `va`. An absent page table reads as a non-present
    /// entry; nothing is allocated.
    #[must_use]
    pub fn entry<M: PhysMapper>(&self, mem: &M, va: VirtualAddress) -> PtEntry {
        let (di, ti) = split_indices(va);
        // SAFETY: the directory frame is owned by this space.
        let pd = unsafe { directory_mut(mem, self.directory) };
        match pd.get(di).next_table() {
            // SAFETY: linked tables are owned by this space.
            Some(table) => unsafe { table_mut(mem, table) }.get(ti),
            None => PtEntry::zero(),
        }
    }

    /// Install `va → page` unless `va` is already mapped.
    ///
    /// The owning page table is allocated (zeroed) on first use. `present` is
    /// forced on. Returns `false`, leaving the space untouched, if the entry
    /// was already present.
    pub fn try_map<M: PhysMemory>(
        &mut self,
        mem: &mut M,
        page: PhysicalPage<Size4K>,
        va: VirtualAddress,
        flags: PageEntryBits,
    ) -> bool {
        debug_assert!(va.is_aligned::<Size4K>(), "unaligned virtual page {va}");
        let (di, ti) = split_indices(va);

        // SAFETY: the directory frame is owned by this space.
        let pd = unsafe { directory_mut(mem, self.directory) };
        let table = if let Some(table) = pd.get(di).next_table() {
            table
        } else {
            let table = mem.alloc_zeroed();
            pd.set(di, PdEntry::make_table(table, PageEntryBits::table_link()));
            table
        };

        // SAFETY: linked tables are owned by this space.
        let pt = unsafe { table_mut(mem, table) };
        if pt.get(ti).is_present() {
            return false;
        }
        pt.set(ti, PtEntry::make_4k(page, flags));

        if va >= self.vm_top && va.as_u32() < VM_TOP_LIMIT {
            self.vm_top = va + PAGE_SIZE;
        }
        true
    }

    /// Like [`try_map`](Self::try_map), but remapping a present page is fatal.
    ///
    /// # Panics
    /// If `va` is already mapped.
    pub fn map<M: PhysMemory>(
        &mut self,
        mem: &mut M,
        page: PhysicalPage<Size4K>,
        va: VirtualAddress,
        flags: PageEntryBits,
    ) {
        if !self.try_map(mem, page, va, flags) {
            let existing = self.entry(mem, va);
            log::error!(
                "tried to remap a page: {va} -> {page}, existing entry {:#010x}",
                existing.raw()
            );
            panic!("tried to remap a page at {va}");
        }
    }

    /// Allocate a zeroed frame and map it at `va`.
    ///
    /// # Panics
    /// If `va` is already mapped.
    pub fn map_zeroed<M: PhysMemory>(
        &mut self,
        mem: &mut M,
        va: VirtualAddress,
        flags: PageEntryBits,
    ) -> PhysicalPage<Size4K> {
        let frame = mem.alloc_zeroed();
        self.map(mem, frame, va, flags);
        frame
    }

    /// Remove the mapping at `va` and hand its frame back to the allocator.
    ///
    /// Unmapping an absent page is logged and otherwise ignored; no page
    /// table is allocated.
    pub fn unmap<M: PhysMemory>(&mut self, mem: &mut M, va: VirtualAddress) {
        let (di, ti) = split_indices(va);
        // SAFETY: the directory frame is owned by this space.
        let pd = unsafe { directory_mut(mem, self.directory) };
        let Some(table) = pd.get(di).next_table() else {
            warn!("unmapping {va} without a page table");
            return;
        };
        // SAFETY: linked tables are owned by this space.
        let pt = unsafe { table_mut(mem, table) };
        let entry = pt.get(ti);
        let Some((frame, _)) = entry.page_4k() else {
            warn!("unmapping {va} which is not mapped");
            return;
        };
        pt.set(ti, entry.cleared());
        mem.free_4k(frame.base());
    }

    /// Translate `va` for a user-mode access: only present **and**
    /// user-accessible pages translate.
    #[must_use]
    pub fn translate<M: PhysMapper>(&self, mem: &M, va: VirtualAddress) -> Option<PhysicalAddress> {
        let entry = self.entry(mem, va);
        if !entry.is_user_accessible() {
            return None;
        }
        let (frame, _) = entry.page_4k()?;
        Some(frame.join(va.offset::<Size4K>()))
    }

    /// Whether every page touched by `[va, va + len)` translates.
    ///
    /// Ranges running past the end of the 32-bit space are never accessible.
    #[must_use]
    pub fn is_range_accessible<M: PhysMapper>(&self, mem: &M, va: VirtualAddress, len: u32) -> bool {
        if len == 0 {
            return true;
        }
        let Some(last) = va.checked_add(len - 1) else {
            return false;
        };
        let mut page = va.align_down::<Size4K>();
        loop {
            if self.translate(mem, page).is_none() {
                return false;
            }
            if page >= last.align_down::<Size4K>() {
                return true;
            }
            page += PAGE_SIZE;
        }
    }

    /// First address at or above `max(start, MIN_ALLOC)` (page aligned) whose
    /// following `len` bytes are entirely unmapped, or `None` if such a range
    /// would extend past [`MAX_ALLOC`]. A zero `len` asks for one page.
    ///
    /// Absent page tables count as unmapped; nothing is allocated.
    #[must_use]
    pub fn find_free_range<M: PhysMapper>(
        &self,
        mem: &M,
        start: VirtualAddress,
        len: u32,
    ) -> Option<VirtualAddress> {
        let len = len.max(1).checked_next_multiple_of(PAGE_SIZE)?;
        let mut candidate = start
            .max(VirtualAddress::new(MIN_ALLOC))
            .checked_align_up::<Size4K>()?;

        loop {
            let end = candidate.checked_add(len)?;
            if end.as_u32() > MAX_ALLOC {
                return None;
            }
            match self.first_present(mem, candidate, end) {
                None => return Some(candidate),
                Some(busy) => candidate = busy + PAGE_SIZE,
            }
        }
    }

    /// First present page in `[from, to)`, skipping absent page tables a whole
    /// 4 MiB region at a time.
    fn first_present<M: PhysMapper>(
        &self,
        mem: &M,
        from: VirtualAddress,
        to: VirtualAddress,
    ) -> Option<VirtualAddress> {
        // SAFETY: the directory frame is owned by this space.
        let pd = unsafe { directory_mut(mem, self.directory) };
        let mut va = from;
        while va < to {
            let (di, ti) = split_indices(va);
            let region_end = va.page::<Size4M>().base().as_u32().checked_add(TABLE_SPAN);
            if let Some(table) = pd.get(di).next_table() {
                // SAFETY: linked tables are owned by this space.
                if unsafe { table_mut(mem, table) }.get(ti).is_present() {
                    return Some(va);
                }
                va = va.checked_add(PAGE_SIZE)?;
            } else {
                va = VirtualAddress::new(region_end?);
            }
        }
        None
    }

    /// Tear the space down: unmap (and free) every present page at or above
    /// the kernel-reserved boundary, then free every page table and the
    /// directory. Identity mappings of the reserved region are dropped
    /// without freeing their frames.
    pub fn destroy<M: PhysMemory>(self, mem: &mut M) {
        // SAFETY: the directory frame is owned by this space.
        let pd = unsafe { directory_mut(mem, self.directory) };
        let mut freed_pages = 0usize;
        let mut freed_tables = 0usize;

        for di in DirectoryIndex::all() {
            let Some(table) = pd.get(di).next_table() else {
                continue;
            };
            // SAFETY: linked tables are owned by this space.
            let pt = unsafe { table_mut(mem, table) };
            for ti in TableIndex::all() {
                let va = join_indices(di, ti);
                if va.as_u32() < KERNEL_RESERVED {
                    continue;
                }
                if let Some((frame, _)) = pt.get(ti).page_4k() {
                    pt.set(ti, PtEntry::zero());
                    mem.free_4k(frame.base());
                    freed_pages += 1;
                }
            }
            pd.set(di, PdEntry::zero());
            mem.free_4k(table.base());
            freed_tables += 1;
        }

        mem.free_4k(self.directory.base());
        trace!(
            "destroyed address space {}: {freed_pages} pages, {freed_tables} tables",
            self.directory
        );
    }
}
