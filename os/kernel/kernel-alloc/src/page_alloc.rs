use kernel_info::memory::{KERNEL_RESERVED, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{FrameAlloc, PhysMapper};
use log::{debug, error};

/// LIFO allocator of 4 KiB physical frames.
///
/// The free list is intrusive: the first word of every free frame holds the
/// physical address of the next free frame, 0 ending the list. Frames are
/// reached through the mapper `M`, so the list needs no storage of its own.
///
/// # Invariants
/// - Only frames at or above [`KERNEL_RESERVED`] ever enter the list.
/// - A frame is either on the list or owned by exactly one holder.
pub struct PageAllocator<M> {
    mapper: M,
    head: Option<PhysicalPage<Size4K>>,
    allocated: usize,
    free: usize,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// An allocator with an empty free list.
    pub const fn new(mapper: M) -> Self {
        Self {
            mapper,
            head: None,
            allocated: 0,
            free: 0,
        }
    }

    #[inline]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Frames currently handed out.
    #[inline]
    #[must_use]
    pub const fn allocated_pages(&self) -> usize {
        self.allocated
    }

    /// Frames currently on the free list.
    #[inline]
    #[must_use]
    pub const fn free_pages(&self) -> usize {
        self.free
    }

    /// Forget the allocations made so far (used once boot-time structures are in place).
    #[inline]
    pub const fn reset_counters(&mut self) {
        self.allocated = 0;
    }

    /// Seed the free list with every whole page of `[start, end)` at or above
    /// [`KERNEL_RESERVED`]. Does not count as freeing.
    pub fn add_region(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        let Some(first) = start.checked_align_up::<Size4K>() else {
            return;
        };
        let mut pa = first.as_u32().max(KERNEL_RESERVED);
        let mut added = 0usize;
        while end.as_u32().checked_sub(pa).is_some_and(|room| room >= PAGE_SIZE) {
            self.push(PhysicalAddress::new(pa));
            added += 1;
            pa += PAGE_SIZE;
        }
        debug!("added {added} pages from region {start}..{end}");
    }

    /// Take the most recently freed frame.
    ///
    /// # Panics
    /// If no frame is left.
    pub fn alloc(&mut self) -> PhysicalPage<Size4K> {
        let Some(page) = self.head else {
            error!("out of pages, {} allocated", self.allocated);
            panic!("out of pages");
        };
        // SAFETY: frames on the free list are reachable and hold the link word.
        let next = unsafe { *self.mapper.phys_to_mut::<u32>(page.base()) };
        self.head = (next != 0).then(|| PhysicalPage::from_addr(PhysicalAddress::new(next)));
        self.allocated += 1;
        self.free -= 1;
        page
    }

    /// Put a frame back on the free list.
    ///
    /// Only an immediate repeat (freeing the current list head again) is
    /// detected as a double free.
    ///
    /// # Panics
    /// If `addr` is not page aligned or equals the free-list head.
    pub fn free(&mut self, addr: PhysicalAddress) {
        if !addr.is_aligned::<Size4K>() {
            error!("freeing unaligned page address {addr}");
            panic!("freeing unaligned page address {addr}");
        }
        if self.head.is_some_and(|head| head.base() == addr) {
            error!("double free of page {addr}");
            panic!("double free of page {addr}");
        }
        self.push(addr);
        self.allocated = self.allocated.saturating_sub(1);
    }

    fn push(&mut self, addr: PhysicalAddress) {
        let next = self.head.map_or(0, |head| head.base().as_u32());
        // SAFETY: the frame is being handed to the allocator and is reachable
        // through the mapper.
        unsafe { *self.mapper.phys_to_mut::<u32>(addr) = next };
        self.head = Some(PhysicalPage::from_addr(addr));
        self.free += 1;
    }
}

impl<M: PhysMapper> FrameAlloc for PageAllocator<M> {
    #[inline]
    fn alloc_4k(&mut self) -> PhysicalPage<Size4K> {
        self.alloc()
    }

    #[inline]
    fn free_4k(&mut self, frame: PhysicalAddress) {
        self.free(frame);
    }
}

impl<M: PhysMapper> PhysMapper for PageAllocator<M> {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { self.mapper.phys_to_mut(pa) }
    }
}
