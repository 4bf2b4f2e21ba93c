use crate::arena::Handle;
use crate::domain::DomainId;
use crate::frame::{SavedContext, StackBounds};
use crate::ring::{Links, RingMember};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

pub type ThreadId = Handle<Thread>;

/// Scheduling state of one thread.
///
/// The thread's FPU area and TLS table live in its control-block page
/// (`control_block`), not here.
#[derive(Debug)]
pub struct Thread {
    links: Links<Thread>,
    pub(crate) domain: DomainId,
    pub(crate) tid: u32,
    pub user_stack: StackBounds,
    pub kernel_stack: StackBounds,
    pub(crate) blocked: bool,
    /// Futex word this thread sleeps on, as a physical address.
    pub wait_address: Option<PhysicalAddress>,
    pub context: SavedContext,
    pub control_block: PhysicalPage<Size4K>,
    /// `fpu` in the control block holds a saved image.
    pub fpu_saved: bool,
}

impl Thread {
    /// A thread not yet attached to a domain.
    #[must_use]
    pub fn new(
        domain: DomainId,
        control_block: PhysicalPage<Size4K>,
        kernel_stack: StackBounds,
    ) -> Self {
        Self {
            links: Links::new(),
            domain,
            tid: 0,
            user_stack: StackBounds::default(),
            kernel_stack,
            blocked: false,
            wait_address: None,
            context: SavedContext::default(),
            control_block,
            fpu_saved: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn domain(&self) -> DomainId {
        self.domain
    }

    /// Thread id within the domain, assigned when the thread joins it.
    #[inline]
    #[must_use]
    pub const fn tid(&self) -> u32 {
        self.tid
    }

    #[inline]
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether the thread is currently threaded onto a ring.
    #[inline]
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.links.is_linked()
    }
}

impl RingMember for Thread {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}
